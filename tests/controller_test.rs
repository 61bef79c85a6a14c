/*!
 * Execution Controller Tests
 * Pause/resume and exit visibility across worker threads
 */

use flight_pipeline::ExecutionController;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn spawn_counting_worker(
    controller: &ExecutionController,
    writes: &Arc<AtomicUsize>,
) -> thread::JoinHandle<()> {
    let controller = controller.clone();
    let writes = Arc::clone(writes);
    thread::spawn(move || {
        while !controller.is_exit_requested() {
            controller.check_pause();
            if controller.is_exit_requested() {
                break;
            }
            writes.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(1));
        }
    })
}

#[test]
fn test_pause_stops_side_effects_and_resume_continues() {
    let controller = ExecutionController::with_poll_interval(Duration::from_millis(5));
    let writes = Arc::new(AtomicUsize::new(0));
    let worker = spawn_counting_worker(&controller, &writes);

    thread::sleep(Duration::from_millis(30));
    assert!(writes.load(Ordering::SeqCst) > 0);

    controller.pause();
    // One loop iteration may already be past its pause check
    thread::sleep(Duration::from_millis(20));
    let paused_at = writes.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(60));
    assert_eq!(writes.load(Ordering::SeqCst), paused_at);

    controller.resume();
    thread::sleep(Duration::from_millis(30));
    assert!(writes.load(Ordering::SeqCst) > paused_at);

    controller.request_exit();
    worker.join().unwrap();
}

#[test]
fn test_exit_releases_paused_workers_promptly() {
    let controller = ExecutionController::new();
    let writes = Arc::new(AtomicUsize::new(0));
    controller.pause();

    let workers: Vec<_> = (0..4)
        .map(|_| spawn_counting_worker(&controller, &writes))
        .collect();
    thread::sleep(Duration::from_millis(20));

    let start = Instant::now();
    controller.request_exit();
    for worker in workers {
        worker.join().unwrap();
    }

    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(writes.load(Ordering::SeqCst), 0);
    assert!(controller.is_paused());
}

#[test]
fn test_clones_observe_the_same_flags() {
    let controller = ExecutionController::new();
    let clone = controller.clone();

    clone.request_exit();
    assert!(controller.is_exit_requested());
    clone.request_exit();
    assert!(controller.is_exit_requested());

    controller.clear_exit();
    assert!(!clone.is_exit_requested());
    assert_eq!(clone.snapshot().generation, 1);
    assert!(clone.same_as(&controller));
    assert!(!clone.same_as(&ExecutionController::new()));
}

#[test]
fn test_check_pause_is_free_when_running() {
    let controller = ExecutionController::new();
    let start = Instant::now();
    for _ in 0..10_000 {
        controller.check_pause();
    }
    assert!(start.elapsed() < Duration::from_secs(1));
}
