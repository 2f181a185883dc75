//! System call tests
//! Dispatch, argument passing, and the per-process syscall counters

mod common;

use std::sync::{Arc, Mutex};

use sched_kernel::syscalls::{self, SysNum, SyscallArgs};
use sched_kernel::{Error, Result, SchedPolicy};

/// Minimal register file for calling the dispatcher directly
#[derive(Default)]
struct Regs {
    args: [i32; 2],
    out: [Option<i32>; 2],
}

impl SyscallArgs for Regs {
    fn arg_int(&self, n: usize) -> Result<i32> {
        self.args.get(n).copied().ok_or(Error::BadAddress)
    }

    fn put_int(&mut self, n: usize, value: i32) -> Result<()> {
        let slot = self.out.get_mut(n).ok_or(Error::BadAddress)?;
        *slot = Some(value);
        Ok(())
    }
}

#[cfg(test)]
mod counter_tests {
    use super::*;

    /// Every call counts; only non-negative results count as good
    #[test]
    fn test_counters_track_outcomes() {
        let machine = common::machine(1, SchedPolicy::Fcfs);
        machine
            .run(|sys| {
                assert_eq!(sys.getpid(), Ok(1));
                assert!(sys.set_burst_estimate(-1).is_err());
                assert!(sys.set_policy_raw(9).is_err());
                assert!(sys.uptime().is_ok());

                let counters = sys.syscall_counters().expect("counters");
                assert_eq!(counters.total, 4);
                assert_eq!(counters.good, 2);

                // The query counts itself before it runs...
                assert_eq!(sys.num_syscalls(), Ok(5));
                // ...but is only good once it has returned.
                assert_eq!(sys.num_good_syscalls(), Ok(3));
            })
            .expect("Failed to run machine");
    }

    /// A new process starts with zeroed counters
    #[test]
    fn test_child_counters_start_at_zero() {
        let machine = common::machine(1, SchedPolicy::Fcfs);
        let seen = Arc::new(Mutex::new(None));
        let out = Arc::clone(&seen);
        machine
            .run(move |sys| {
                for _ in 0..10 {
                    sys.getpid().expect("getpid");
                }
                sys.fork(move |sys| {
                    *out.lock().unwrap() = Some(sys.num_syscalls());
                })
                .expect("Failed to fork");
                sys.wait().expect("Failed to wait");
            })
            .expect("Failed to run machine");
        assert_eq!(*seen.lock().unwrap(), Some(Ok(1)));
    }

    #[test]
    fn test_unknown_number() {
        let machine = common::machine(1, SchedPolicy::Fcfs);
        machine
            .run(|sys| {
                let mut regs = Regs::default();
                assert_eq!(syscalls::dispatch(sys.kernel(), 99, &mut regs), -1);
                // Listing and the RR demo are not kernel calls.
                assert_eq!(syscalls::dispatch(sys.kernel(), 30, &mut regs), -1);
                assert_eq!(syscalls::dispatch(sys.kernel(), 31, &mut regs), -1);

                let counters = sys.syscall_counters().expect("counters");
                assert_eq!(counters.total, 3);
                assert_eq!(counters.good, 0);
            })
            .expect("Failed to run machine");
    }
}

#[cfg(test)]
mod dispatch_tests {
    use super::*;

    /// waitx stores both times through its pointer arguments
    #[test]
    fn test_waitx_out_arguments() {
        let machine = common::machine(1, SchedPolicy::Fcfs);
        machine
            .run(|sys| {
                let child = sys
                    .fork(|sys| sys.advance_clock(2))
                    .expect("Failed to fork");
                sys.advance_clock(1);

                let mut regs = Regs::default();
                let ret = syscalls::dispatch(sys.kernel(), SysNum::Waitx as usize, &mut regs);
                assert_eq!(ret, child as isize);
                assert_eq!(regs.out, [Some(1), Some(2)]);
            })
            .expect("Failed to run machine");
    }

    #[test]
    fn test_scheduling_attributes() {
        let machine = common::machine(1, SchedPolicy::Fcfs);
        machine
            .run(|sys| {
                let mut regs = Regs {
                    args: [17, 0],
                    ..Regs::default()
                };
                let k = sys.kernel();
                assert_eq!(syscalls::dispatch(k, SysNum::SetPriority as usize, &mut regs), 0);
                assert_eq!(syscalls::dispatch(k, SysNum::SetBurstEstimate as usize, &mut regs), 0);
                regs.args[0] = 3;
                assert_eq!(syscalls::dispatch(k, SysNum::SetSchedPolicy as usize, &mut regs), 0);
                assert_eq!(k.active_policy(), SchedPolicy::Random);

                let me = sys
                    .processes()
                    .into_iter()
                    .find(|p| p.pid == sys.pid())
                    .expect("root not listed");
                assert_eq!(me.priority, 17);
                assert_eq!(me.estimated_burst, 17);
                // Any priority is accepted as given.
                assert_eq!(sys.set_priority(-5), Ok(()));
            })
            .expect("Failed to run machine");
    }

    #[test]
    fn test_yield_and_getpid() {
        let machine = common::machine(1, SchedPolicy::Fcfs);
        machine
            .run(|sys| {
                let mut regs = Regs::default();
                assert_eq!(syscalls::dispatch(sys.kernel(), SysNum::Yield as usize, &mut regs), 0);
                assert_eq!(syscalls::dispatch(sys.kernel(), SysNum::Getpid as usize, &mut regs), 1);
            })
            .expect("Failed to run machine");
    }
}
