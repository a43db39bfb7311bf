use crate::{Park, RawLock, RawUnlock};
use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, Ordering};

/// Exclusive lock whose waiters suspend instead of spinning.
///
/// A holder may keep a `RawSleep` across disk I/O. Contending callers park on
/// the lock's address through `P` and re-check after every wake-up, so a
/// spurious or early wake is harmless.
pub struct RawSleep<P> {
    held: AtomicBool,
    _park: PhantomData<fn() -> P>,
}

impl<P> Default for RawSleep<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> RawSleep<P> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
            _park: PhantomData,
        }
    }

    #[inline]
    pub fn try_lock(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }

    /// Wait channel: the lock's own address.
    #[inline]
    fn channel(&self) -> usize {
        core::ptr::from_ref(self).addr()
    }
}

impl<P: Park> RawSleep<P> {
    pub fn lock(&self) {
        while !self.try_lock() {
            P::park(self.channel());
        }
    }

    /// # Safety
    /// The caller must hold the lock.
    pub unsafe fn unlock(&self) {
        self.held.store(false, Ordering::Release);
        P::unpark_all(self.channel());
    }
}

impl<P: Park> RawLock for RawSleep<P> {
    fn raw_lock(&self) {
        self.lock();
    }

    fn raw_try_lock(&self) -> bool {
        self.try_lock()
    }

    fn raw_is_locked(&self) -> bool {
        self.is_locked()
    }
}

impl<P: Park> RawUnlock for RawSleep<P> {
    unsafe fn raw_unlock(&self) {
        unsafe { self.unlock() }
    }
}
