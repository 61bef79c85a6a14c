/*!
 * Worker Module
 * Validated worker descriptions and the context handed to each replica
 */

mod spec;
mod types;

pub use spec::{WorkerSpec, WorkerSpecBuilder};
pub use types::{SpecError, SpecResult, WorkerContext, WorkerFn};
