//! Preemption control on `x86_64` through the interrupt flag.
//!
//! The scheduler only switches tasks from the timer interrupt, so a core
//! with interrupts masked keeps running the current task.

use crate::CpuLocal;
use core::arch::asm;

/// `RFLAGS.IF`
const INTERRUPT_FLAG: u64 = 1 << 9;

#[inline]
fn interrupts_enabled() -> bool {
    let rflags: u64;
    unsafe { asm!("pushfq", "pop {}", out(reg) rflags, options(nomem, preserves_flags)) };
    rflags & INTERRUPT_FLAG != 0
}

/// Masks interrupts for its lifetime; restores them only if they were on.
///
/// Guards nest: an inner guard created with interrupts already masked
/// leaves them masked when dropped.
#[must_use = "interrupts are re-enabled as soon as the guard drops"]
pub struct IrqGuard {
    restore: bool,
}

impl IrqGuard {
    /// Ring 0 only; `cli` faults anywhere else.
    #[inline]
    pub fn new() -> Self {
        let restore = interrupts_enabled();
        if restore {
            unsafe { asm!("cli", options(nomem, nostack)) };
        }
        Self { restore }
    }
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.restore {
            unsafe { asm!("sti", options(nomem, nostack)) };
        }
    }
}

/// [`CpuLocal`] for the running kernel.
///
/// `read_id` returns the executing core's index, typically from the
/// per-CPU block behind `GS`.
pub struct IrqCpu {
    read_id: fn() -> usize,
}

impl IrqCpu {
    #[must_use]
    pub const fn new(read_id: fn() -> usize) -> Self {
        Self { read_id }
    }
}

impl CpuLocal for IrqCpu {
    type Token = IrqGuard;

    #[inline]
    fn cpu_id(&self) -> usize {
        (self.read_id)()
    }

    #[inline]
    fn push_off(&self) -> IrqGuard {
        IrqGuard::new()
    }

    #[inline]
    fn pop_off(&self, token: IrqGuard) {
        drop(token);
    }
}
