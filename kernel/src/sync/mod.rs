// Synchronization primitives for the scheduling core
// Provides SpinLock with interrupt nesting, and the wait channels used by sleep/wakeup
//
// SMP-safe implementation; the interrupt state lives in the per-CPU records
// reached through an `IrqScope`.

mod channel;
mod spinlock;

pub use channel::Channel;
pub use spinlock::{RawSpinLock, SpinLock, SpinLockGuard};

// ============================================================================
// Interrupt control for SMP safety
// ============================================================================

/// Per-CPU interrupt nesting used by every lock acquisition
///
/// `push_off`/`pop_off` are matched like `intr_off`/`intr_on`, except that
/// they nest: two `push_off`s need two `pop_off`s, and interrupts come back
/// on only if they were on at the outermost `push_off`.
pub trait IrqScope {
    /// CPU the caller runs on; only stable while interrupts are off
    fn cpu_id(&self) -> usize;

    fn push_off(&self);

    fn pop_off(&self);
}
