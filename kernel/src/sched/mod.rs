//! CPU scheduler
//!
//! Every CPU runs [`Kernel::scheduler`]: take the table lock, let the active
//! policy pick a runnable process, switch to it, and take the CPU back when
//! the process yields, sleeps, or exits. The lock stays held across the
//! switch; the process releases it on its side and takes it again before
//! switching back.

mod policy;
mod rand;
mod stats;

pub use policy::{Candidate, Select};
pub use self::rand::Lcg;
pub use stats::{SchedulerStats, StatsSnapshot};

use sched_api::{Context, Platform, ProcState};

use crate::kernel::Kernel;
use crate::param::NPROC;
use crate::process::ProcTable;
use crate::sync::SpinLockGuard;

impl<P: Platform> Kernel<P> {
    /// Per-CPU scheduler loop; each CPU calls this after setting itself up
    pub fn scheduler(&self) -> ! {
        self.mycpu().set_proc(None);
        loop {
            self.scheduler_pass();
        }
    }

    /// One iteration of the scheduler loop on the calling CPU
    ///
    /// Returns how many processes ran: at most one for a picking policy,
    /// every process found runnable during the sweep for round robin.
    pub fn scheduler_pass(&self) -> usize {
        // Let pending interrupts in between passes.
        self.platform().intr_on();

        let mut table = self.lock_table();
        let mut handoffs = 0;

        if table.policy().is_sweep() {
            let mut slot = 0;
            // The policy can change while a process runs; stop sweeping then.
            while slot < NPROC && table.policy().is_sweep() {
                if table.get(slot).state() == ProcState::Runnable {
                    self.run(&mut table, slot);
                    handoffs += 1;
                }
                slot += 1;
            }
        } else if let Some(slot) = table.select() {
            self.run(&mut table, slot);
            handoffs = 1;
        }

        self.mycpu().stats().record_pass(handoffs);
        drop(table);

        if handoffs == 0 {
            self.platform().idle();
        }
        handoffs
    }

    /// Bind `slot` to this CPU and switch to it until it gives the CPU back
    fn run(&self, table: &mut SpinLockGuard<'_, ProcTable<P>>, slot: usize) {
        let cpu = self.mycpu();
        cpu.set_proc(Some(slot));

        let p = table.get_mut(slot);
        if let Some(space) = p.space.as_ref() {
            self.platform().switch_user(space, p.kstack_top);
        }
        p.state = ProcState::Running;
        log::trace!("cpu {}: run pid {}", self.platform().cpu_id(), p.pid);

        let ctx: *const Context = &p.context;
        unsafe { self.platform().swtch(cpu.scheduler_context(), ctx) };

        // Back from the process, which has left `Running` on its own.
        self.platform().switch_kernel();
        cpu.set_proc(None);
    }
}
