//! Deadlock watchdog for the coordinator's `parking_lot` locks.
//!
//! Only compiled with the `deadlock_detection` feature. A background thread
//! checks for lock cycles at a fixed interval and logs every thread of a
//! cycle with its backtrace.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{error, info, warn};

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Start the watchdog thread. Later calls are no-ops.
///
/// With `abort_on_deadlock` the watchdog aborts the process after logging
/// the first cycle, so a deadlocked test run fails instead of hanging.
pub fn install_deadlock_detector(interval: Duration, abort_on_deadlock: bool) {
    if INSTALLED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return;
    }
    let spawned = thread::Builder::new()
        .name("ybwc-deadlock-watch".to_string())
        .spawn(move || watch(interval, abort_on_deadlock));
    match spawned {
        Ok(_) => info!("Deadlock detector started (interval {interval:?})"),
        Err(e) => {
            INSTALLED.store(false, Ordering::SeqCst);
            warn!("Deadlock detector not started: {e}");
        }
    }
}

pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::SeqCst)
}

fn watch(interval: Duration, abort_on_deadlock: bool) {
    loop {
        thread::sleep(interval);
        let cycles = parking_lot::deadlock::check_deadlock();
        if cycles.is_empty() {
            continue;
        }
        error!("kind=deadlock_detected\tcycles={}", cycles.len());
        for (i, threads) in cycles.iter().enumerate() {
            for (j, t) in threads.iter().enumerate() {
                error!("kind=deadlock_thread\tcycle={i}\tthread={j}\tid={}", t.thread_id());
                let bt = format!("{:?}", t.backtrace());
                for (frame, line) in bt.lines().enumerate() {
                    warn!(
                        "kind=deadlock_backtrace\tcycle={i}\tthread={j}\tframe={frame}\t{}",
                        line.trim()
                    );
                }
            }
        }
        if abort_on_deadlock {
            error!("Aborting: deadlock among search threads");
            log::logger().flush();
            std::process::abort();
        }
    }
}
