use crate::{RawLock, RawUnlock};
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

/// Busy-waiting lock for short, non-suspending critical sections.
///
/// Waiters poll with plain loads and only retry the exchange once the lock
/// reads free, so a contended line is not bounced between cores on every
/// iteration.
#[derive(Default)]
pub struct RawSpin {
    held: AtomicBool,
}

impl RawSpin {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    #[inline]
    fn grab(&self) -> bool {
        self.held
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

impl RawLock for RawSpin {
    fn raw_lock(&self) {
        while !self.grab() {
            while self.held.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
    }

    fn raw_try_lock(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn raw_is_locked(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }
}

impl RawUnlock for RawSpin {
    unsafe fn raw_unlock(&self) {
        debug_assert!(self.raw_is_locked(), "unlocking a free spin lock");
        self.held.store(false, Ordering::Release);
    }
}
