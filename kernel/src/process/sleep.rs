//! Blocking, yielding, and the switch from a process into its CPU's scheduler

use sched_api::{Context, Error, Platform, ProcState, Result};

use crate::kernel::Kernel;
use crate::process::ProcTable;
use crate::sync::{Channel, SpinLock, SpinLockGuard};

impl<P: Platform> Kernel<P> {
    /// Atomically release `guard`'s lock and sleep on `chan`; the lock is
    /// held again when this returns
    ///
    /// The caller checks its wait condition under `guard`. Because the state
    /// change happens under the table lock, taken before `guard` is dropped,
    /// a waker that needs either lock cannot slip in between the check and
    /// the sleep.
    pub fn sleep<'a, T>(&'a self, chan: Channel, guard: SpinLockGuard<'a, T>) -> SpinLockGuard<'a, T> {
        let table = self.lock_table();
        let lock: &'a SpinLock<T> = SpinLock::unlock(guard);

        let table = self.sleep_locked(chan, table);

        drop(table);
        self.acquire(lock)
    }

    /// Sleep on `chan` while already holding the table lock
    pub(crate) fn sleep_locked<'a>(
        &'a self,
        chan: Channel,
        mut table: SpinLockGuard<'a, ProcTable<P>>,
    ) -> SpinLockGuard<'a, ProcTable<P>> {
        let Some(slot) = self.current_slot() else {
            panic!("sleep");
        };

        let start = self.now();
        let p = table.get_mut(slot);
        p.chan = Some(chan);
        p.state = ProcState::Sleeping;
        log::trace!("sleep: pid {} on {:?}", p.pid, chan);

        self.sched(&mut table);

        let slept = self.now().saturating_sub(start);
        let p = table.get_mut(slot);
        p.times.sleeptime += slept;
        p.chan = None;
        table
    }

    /// Wake every process sleeping on `chan`
    pub fn wakeup(&self, chan: Channel) {
        self.lock_table().wakeup(chan);
    }

    /// Give up the CPU for one scheduling round
    pub fn yield_now(&self) -> Result<()> {
        let slot = self.current_slot().ok_or(Error::NoCurrentProcess)?;
        let mut table = self.lock_table();
        table.get_mut(slot).state = ProcState::Runnable;
        self.sched(&mut table);
        Ok(())
    }

    /// Switch to this CPU's scheduler. The caller holds only the table lock
    /// and has already moved itself out of `Running`.
    pub(crate) fn sched(&self, table: &mut SpinLockGuard<'_, ProcTable<P>>) {
        let Some(slot) = self.current_slot() else {
            panic!("sched: no process");
        };
        if !self.ptable.holding(self) {
            panic!("sched ptable.lock");
        }
        let cpu = self.mycpu();
        if cpu.ncli() != 1 {
            panic!("sched locks");
        }
        if table.get(slot).state == ProcState::Running {
            panic!("sched running");
        }
        if self.platform().intr_get() {
            panic!("sched interruptible");
        }

        // intena belongs to this thread of execution, not to the CPU it
        // comes back on.
        let intena = cpu.intena();
        let ctx: *mut Context = &mut table.get_mut(slot).context;
        unsafe { self.platform().swtch(ctx, cpu.scheduler_context()) };
        self.mycpu().set_intena(intena);
    }
}
