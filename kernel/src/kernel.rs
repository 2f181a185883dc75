//! A kernel instance: CPUs, the process table, and the clock

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use sched_api::{Platform, Result, Ticks};

use crate::config::KernelConfig;
use crate::cpu::Cpu;
use crate::process::ProcTable;
use crate::sched::StatsSnapshot;
use crate::sync::{IrqScope, SpinLock, SpinLockGuard};

/// One kernel: its platform, CPU records, process table and tick counter
///
/// Nothing here is global, so tests can run several kernels side by side.
/// Methods are spread over the modules that own each concern:
/// lifecycle in [`crate::process`], the scheduler loop in [`crate::sched`],
/// accounting in [`crate::metrics`].
pub struct Kernel<P: Platform> {
    platform: P,
    config: KernelConfig,
    cpus: Vec<Cpu>,
    pub(crate) ptable: SpinLock<ProcTable<P>>,
    /// Serializes tick sleepers against the clock
    pub(crate) tickslock: SpinLock<()>,
    ticks: AtomicU64,
}

impl<P: Platform> Kernel<P> {
    pub fn new(platform: P, config: KernelConfig) -> Result<Self> {
        config.validate()?;
        let cpus = (0..config.ncpu).map(|_| Cpu::new()).collect();
        log::info!(
            "kernel: {} cpu(s), policy {}, seed {}",
            config.ncpu,
            config.initial_policy,
            config.random_seed
        );
        Ok(Self {
            platform,
            config,
            cpus,
            ptable: SpinLock::new(
                "ptable",
                ProcTable::new(config.initial_policy, config.random_seed),
            ),
            tickslock: SpinLock::new("time", ()),
            ticks: AtomicU64::new(0),
        })
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn ncpu(&self) -> usize {
        self.cpus.len()
    }

    pub fn cpu(&self, id: usize) -> Option<&Cpu> {
        self.cpus.get(id)
    }

    /// Scheduler counters of CPU `id`
    pub fn cpu_stats(&self, id: usize) -> Option<StatsSnapshot> {
        self.cpus.get(id).map(|cpu| cpu.stats().snapshot())
    }

    /// Record of the CPU the caller runs on; call with interrupts off
    pub(crate) fn mycpu(&self) -> &Cpu {
        let id = self.platform.cpu_id();
        match self.cpus.get(id) {
            Some(cpu) => cpu,
            None => panic!("mycpu: cpu {} out of range", id),
        }
    }

    /// Ticks since boot
    pub fn now(&self) -> Ticks {
        self.ticks.load(Ordering::Acquire)
    }

    pub(crate) fn advance_ticks(&self) -> Ticks {
        self.ticks.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Acquire `lock` on the calling CPU
    pub fn acquire<'a, T>(&'a self, lock: &'a SpinLock<T>) -> SpinLockGuard<'a, T> {
        lock.lock(self)
    }

    pub(crate) fn lock_table(&self) -> SpinLockGuard<'_, ProcTable<P>> {
        self.ptable.lock(self)
    }

    /// Table slot of the process running on this CPU
    pub(crate) fn current_slot(&self) -> Option<usize> {
        self.push_off();
        let slot = self.mycpu().proc_slot();
        self.pop_off();
        slot
    }
}

impl<P: Platform> IrqScope for Kernel<P> {
    fn cpu_id(&self) -> usize {
        self.platform.cpu_id()
    }

    fn push_off(&self) {
        let was_enabled = self.platform.intr_get();
        self.platform.intr_off();
        self.mycpu().push(was_enabled);
    }

    fn pop_off(&self) {
        if self.platform.intr_get() {
            panic!("pop_off - interruptible");
        }
        if self.mycpu().pop() {
            self.platform.intr_on();
        }
    }
}
