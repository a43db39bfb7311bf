use core::hint::spin_loop;

/// How a blocked [`RawSleep`](crate::RawSleep) waiter gives up the CPU.
///
/// The kernel scheduler implements this by sleeping the current task on
/// `channel` and waking every task on it. Implementations may return from
/// [`park`](Park::park) early; callers always re-check their condition.
pub trait Park {
    /// Suspends the caller until `channel` is unparked (or spuriously).
    fn park(channel: usize);

    /// Wakes every caller parked on `channel`.
    fn unpark_all(channel: usize);
}

/// Busy-waits instead of suspending.
///
/// Correct everywhere, useful before the scheduler is up.
pub struct SpinPark;

impl Park for SpinPark {
    #[inline]
    fn park(_channel: usize) {
        spin_loop();
    }

    #[inline]
    fn unpark_all(_channel: usize) {}
}
