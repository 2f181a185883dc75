//! Per-CPU state

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use sched_api::Context;

use crate::sched::SchedulerStats;

const NO_PROC: usize = usize::MAX;

/// State of one CPU
///
/// Only the thread of execution currently running on this CPU touches these
/// fields, always with interrupts off; the atomics exist so that the record
/// can live inside a `Sync` kernel value.
pub struct Cpu {
    /// Table slot of the process running here, if any
    proc: AtomicUsize,
    /// Saved context of this CPU's scheduler loop
    scheduler: UnsafeCell<Context>,
    /// Depth of `push_off` nesting
    ncli: AtomicU32,
    /// Were interrupts enabled before the outermost `push_off`?
    intena: AtomicBool,
    stats: SchedulerStats,
}

unsafe impl Sync for Cpu {}

impl Cpu {
    pub const fn new() -> Self {
        Self {
            proc: AtomicUsize::new(NO_PROC),
            scheduler: UnsafeCell::new(Context {
                ra: 0,
                sp: 0,
                s: [0; 12],
            }),
            ncli: AtomicU32::new(0),
            intena: AtomicBool::new(false),
            stats: SchedulerStats::new(),
        }
    }

    /// Slot of the process bound to this CPU
    pub fn proc_slot(&self) -> Option<usize> {
        match self.proc.load(Ordering::Relaxed) {
            NO_PROC => None,
            slot => Some(slot),
        }
    }

    pub(crate) fn set_proc(&self, slot: Option<usize>) {
        self.proc.store(slot.unwrap_or(NO_PROC), Ordering::Relaxed);
    }

    pub(crate) fn scheduler_context(&self) -> *mut Context {
        self.scheduler.get()
    }

    pub fn ncli(&self) -> u32 {
        self.ncli.load(Ordering::Relaxed)
    }

    pub(crate) fn intena(&self) -> bool {
        self.intena.load(Ordering::Relaxed)
    }

    pub(crate) fn set_intena(&self, enabled: bool) {
        self.intena.store(enabled, Ordering::Relaxed);
    }

    /// Enter one more level of interrupt-off nesting
    ///
    /// `was_enabled` is the interrupt state just before the caller turned
    /// interrupts off.
    pub(crate) fn push(&self, was_enabled: bool) {
        if self.ncli.load(Ordering::Relaxed) == 0 {
            self.intena.store(was_enabled, Ordering::Relaxed);
        }
        self.ncli.fetch_add(1, Ordering::Relaxed);
    }

    /// Leave one level; returns true when interrupts should come back on
    pub(crate) fn pop(&self) -> bool {
        let depth = self.ncli.load(Ordering::Relaxed);
        if depth == 0 {
            panic!("pop_off");
        }
        self.ncli.store(depth - 1, Ordering::Relaxed);
        depth == 1 && self.intena.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
