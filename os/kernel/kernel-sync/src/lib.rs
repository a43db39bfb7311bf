//! # Kernel synchronization primitives
//!
//! Two kinds of mutual exclusion, sharing one [`Mutex`] front end:
//!
//! * [`SpinMutex`]: short, non-suspending critical sections guarding
//!   structural state (hash buckets, free lists). Never hold one across I/O.
//! * [`SleepMutex`]: exclusive ownership that may be held for a long time
//!   (across disk I/O); waiters suspend through a [`Park`] strategy.
//!
//! Per-core state is entered through a [`PreemptGuard`], which pins the
//! caller to its current core for the guard's scope.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(target_arch = "x86_64")]
pub mod irq;
mod mutex;
mod park;
mod preempt;
mod raw_sleep;
mod raw_spin;
mod sync_once_cell;

#[cfg(target_arch = "x86_64")]
pub use irq::{IrqCpu, IrqGuard};
pub use mutex::{Mutex, MutexGuard};
pub use park::{Park, SpinPark};
pub use preempt::{CpuLocal, PreemptGuard};
pub use raw_sleep::RawSleep;
pub use raw_spin::RawSpin;
pub use sync_once_cell::SyncOnceCell;

pub type SpinMutex<T> = Mutex<T, RawSpin>;
pub type SleepMutex<T, P = SpinPark> = Mutex<T, RawSleep<P>>;

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}

impl<T, P: Park> SleepMutex<T, P> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSleep::new(), value)
    }
}

pub trait RawLock {
    fn raw_lock(&self);
    fn raw_try_lock(&self) -> bool;

    /// Whether the lock is currently held by anyone.
    ///
    /// Only meaningful to a caller that knows it is (or is not) the holder.
    fn raw_is_locked(&self) -> bool;
}

pub trait RawUnlock {
    unsafe fn raw_unlock(&self);
}
