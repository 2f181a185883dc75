//! Tick accounting, per-process attributes and introspection queries

use alloc::vec::Vec;

use sched_api::{
    Error, Pid, Platform, ProcInfo, ProcTimes, Result, SchedPolicy, SyscallCounters, Ticks,
};

use crate::kernel::Kernel;
use crate::sync::Channel;

impl<P: Platform> Kernel<P> {
    // ========================================================================
    // Clock
    // ========================================================================

    /// Timer interrupt: advance the clock, wake tick sleepers, and charge the
    /// tick to every running process
    pub fn clock_tick(&self) {
        let _time = self.acquire(&self.tickslock);
        self.advance_ticks();
        let mut table = self.lock_table();
        table.wakeup(Channel::Ticks);
        table.charge_tick();
    }

    /// Ticks since boot
    pub fn uptime(&self) -> Ticks {
        let _time = self.acquire(&self.tickslock);
        self.now()
    }

    /// Sleep for `n` ticks; fails early if the caller is killed
    pub fn sleep_ticks(&self, n: Ticks) -> Result<()> {
        let mut time = self.acquire(&self.tickslock);
        let start = self.now();
        while self.now() - start < n {
            if self.is_killed()? {
                return Err(Error::Killed);
            }
            time = self.sleep(Channel::Ticks, time);
        }
        Ok(())
    }

    // ========================================================================
    // Scheduling attributes
    // ========================================================================

    pub fn active_policy(&self) -> SchedPolicy {
        self.lock_table().policy()
    }

    /// Switch every CPU to `policy` from its next selection on
    pub fn set_active_policy(&self, policy: SchedPolicy) {
        self.lock_table().set_policy(policy);
        log::info!("scheduler policy changed to {}", policy);
    }

    /// [`Kernel::set_active_policy`] from a raw identifier; an unknown value
    /// leaves the current policy in force
    pub fn set_active_policy_raw(&self, raw: i32) -> Result<()> {
        let policy = SchedPolicy::try_from(raw)?;
        self.set_active_policy(policy);
        Ok(())
    }

    /// Set the caller's priority; lower values run first under BJF
    pub fn set_priority(&self, priority: i32) -> Result<()> {
        let cur = self.current_slot().ok_or(Error::NoCurrentProcess)?;
        self.lock_table().get_mut(cur).priority = priority;
        Ok(())
    }

    /// Set the caller's burst estimate for SJF
    pub fn set_burst_estimate(&self, burst: i32) -> Result<()> {
        if burst < 0 {
            return Err(Error::InvalidArgument("negative burst estimate"));
        }
        let cur = self.current_slot().ok_or(Error::NoCurrentProcess)?;
        self.lock_table().get_mut(cur).estimated_burst = burst;
        Ok(())
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Every live process, in table order
    pub fn list_processes(&self) -> Vec<ProcInfo> {
        self.lock_table().list()
    }

    /// Ticks since `pid` was created
    pub fn lifetime(&self, pid: Pid) -> Result<Ticks> {
        let now = self.now();
        self.lock_table().lifetime(pid, now)
    }

    /// Number of siblings of `pid`'s parent
    pub fn uncle_count(&self, pid: Pid) -> Result<usize> {
        self.lock_table().uncle_count(pid)
    }

    pub fn proc_times(&self, pid: Pid) -> Result<ProcTimes> {
        self.lock_table()
            .find(pid)
            .map(|p| p.times())
            .ok_or(Error::NotFound(pid))
    }

    /// Syscall counters of the caller
    pub fn syscall_counters(&self) -> Result<SyscallCounters> {
        let cur = self.current_slot().ok_or(Error::NoCurrentProcess)?;
        Ok(self.lock_table().get(cur).syscalls())
    }

    /// Count a syscall entered by the caller, if it is a process
    pub fn record_syscall(&self) {
        if let Some(cur) = self.current_slot() {
            self.lock_table().get_mut(cur).syscalls.total += 1;
        }
    }

    /// Count a syscall of the caller that succeeded
    pub fn record_good_syscall(&self) {
        if let Some(cur) = self.current_slot() {
            self.lock_table().get_mut(cur).syscalls.good += 1;
        }
    }
}
