//! Test-and-test-and-set spinlock for very short critical sections.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_utils::Backoff;
use lock_api::{GuardSend, RawMutex};

pub struct RawSpinLock {
    locked: AtomicBool,
}

// SAFETY: `locked` is only set by a successful acquire CAS and only cleared
// by `unlock`, which the caller guarantees runs in the owning context.
unsafe impl RawMutex for RawSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self {
        locked: AtomicBool::new(false),
    };

    type GuardMarker = GuardSend;

    fn lock(&self) {
        let backoff = Backoff::new();
        while !self.try_lock() {
            while self.locked.load(Ordering::Relaxed) {
                backoff.snooze();
            }
        }
    }

    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

pub type SpinLock<T> = lock_api::Mutex<RawSpinLock, T>;
