use core::marker::PhantomData;

/// Access to the executing core's identity and preemption state.
///
/// `cpu_id` is only stable while preemption is off; read it through a
/// [`PreemptGuard`], not directly.
pub trait CpuLocal {
    /// Whatever [`pop_off`](CpuLocal::pop_off) needs to restore the previous state.
    type Token;

    /// Index of the executing core, in `0..NCPU`.
    fn cpu_id(&self) -> usize;

    /// Disables preemption on the executing core.
    fn push_off(&self) -> Self::Token;

    /// Restores the state saved by the matching [`push_off`](CpuLocal::push_off).
    fn pop_off(&self, token: Self::Token);
}

/// Scoped "pinned to the current core" token.
///
/// Preemption is disabled for the guard's lifetime, so [`cpu_id`](Self::cpu_id)
/// stays the caller's core until drop. The guard is `!Send`.
///
/// ```text
/// let pin = PreemptGuard::new(&cpus);
/// let list = &lists[pin.cpu_id()];
/// // ... touch per-core state ...
/// drop(pin); // preemption restored
/// ```
pub struct PreemptGuard<'a, C: CpuLocal + ?Sized> {
    cpus: &'a C,
    id: usize,
    token: Option<C::Token>,
    _not_send: PhantomData<*mut ()>,
}

impl<'a, C: CpuLocal + ?Sized> PreemptGuard<'a, C> {
    #[inline]
    #[must_use]
    pub fn new(cpus: &'a C) -> Self {
        let token = cpus.push_off();
        let id = cpus.cpu_id();
        Self {
            cpus,
            id,
            token: Some(token),
            _not_send: PhantomData,
        }
    }

    /// The core this guard pinned the caller to.
    #[inline]
    #[must_use]
    pub const fn cpu_id(&self) -> usize {
        self.id
    }
}

impl<C: CpuLocal + ?Sized> Drop for PreemptGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.cpus.pop_off(token);
        }
    }
}
