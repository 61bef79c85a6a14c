/*!
 * Logging Module
 * Tracing initialization and named logger handles for workers
 */

mod logger;
mod tracer;
mod types;

pub use logger::Logger;
pub use tracer::{generate_run_id, init_tracing};
pub use types::{LoggingConfig, LoggingError, LoggingResult};
