//! System call numbers and dispatch for the process-related calls
//!
//! Decoding arguments out of user memory belongs to the trap layer; it hands
//! them over through [`SyscallArgs`]. Every call made by a process is counted
//! in its syscall counters before it runs.

use sched_api::{Error, Platform, Result};

use crate::kernel::Kernel;

// ============================================================================
// System call numbers (xv6-compatible)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum SysNum {
    Fork = 1,
    Exit = 2,
    Wait = 3,
    Kill = 6,
    Getpid = 11,
    Sbrk = 12,
    Sleep = 13,
    Uptime = 14,
    // Scheduling and accounting extensions
    GetUncleCount = 24,
    GetProcessLifetime = 25,
    GetNumSyscalls = 26,
    GetNumSyscallsGood = 27,
    Waitx = 28,
    SetPriority = 29,
    SetSchedPolicy = 32,
    SetBurstEstimate = 33,
    Yield = 34,
}

impl TryFrom<usize> for SysNum {
    type Error = Error;

    fn try_from(value: usize) -> Result<Self> {
        match value {
            1 => Ok(SysNum::Fork),
            2 => Ok(SysNum::Exit),
            3 => Ok(SysNum::Wait),
            6 => Ok(SysNum::Kill),
            11 => Ok(SysNum::Getpid),
            12 => Ok(SysNum::Sbrk),
            13 => Ok(SysNum::Sleep),
            14 => Ok(SysNum::Uptime),
            24 => Ok(SysNum::GetUncleCount),
            25 => Ok(SysNum::GetProcessLifetime),
            26 => Ok(SysNum::GetNumSyscalls),
            27 => Ok(SysNum::GetNumSyscallsGood),
            28 => Ok(SysNum::Waitx),
            29 => Ok(SysNum::SetPriority),
            32 => Ok(SysNum::SetSchedPolicy),
            33 => Ok(SysNum::SetBurstEstimate),
            34 => Ok(SysNum::Yield),
            _ => Err(Error::InvalidArgument("unknown system call")),
        }
    }
}

/// Argument access for one system call
pub trait SyscallArgs {
    /// The `n`th argument as an integer
    fn arg_int(&self, n: usize) -> Result<i32>;

    /// Store `value` through the pointer passed as the `n`th argument
    fn put_int(&mut self, n: usize, value: i32) -> Result<()>;
}

fn to_int<T: TryInto<i32>>(value: T) -> Result<i32> {
    value
        .try_into()
        .map_err(|_| Error::InvalidArgument("value does not fit in an int"))
}

// ============================================================================
// Dispatch
// ============================================================================

/// Run system call `num` for the current process
///
/// The call is counted before it runs; it counts as good if it returns a
/// non-negative value. Unknown numbers count as entered but never as good.
pub fn invoke<P: Platform>(
    kernel: &Kernel<P>,
    num: usize,
    args: &mut dyn SyscallArgs,
) -> Result<isize> {
    kernel.record_syscall();
    let ret = match SysNum::try_from(num) {
        Ok(sysnum) => run(kernel, sysnum, args),
        Err(e) => {
            log::warn!("unknown syscall {}", num);
            Err(e)
        }
    };
    if matches!(ret, Ok(value) if value >= 0) {
        kernel.record_good_syscall();
    }
    ret
}

/// [`invoke`] with the raw return convention: -1 on any error
pub fn dispatch<P: Platform>(kernel: &Kernel<P>, num: usize, args: &mut dyn SyscallArgs) -> isize {
    match invoke(kernel, num, args) {
        Ok(value) => value,
        Err(e) => {
            log::debug!("syscall {} failed: {}", num, e);
            e.as_raw()
        }
    }
}

fn run<P: Platform>(kernel: &Kernel<P>, num: SysNum, args: &mut dyn SyscallArgs) -> Result<isize> {
    match num {
        // Process management
        SysNum::Fork => kernel.fork().map(|pid| pid as isize),
        SysNum::Exit => kernel.exit(),
        SysNum::Wait => kernel.wait().map(|pid| pid as isize),
        SysNum::Waitx => {
            let status = kernel.waitx()?;
            args.put_int(0, to_int(status.wait_time)?)?;
            args.put_int(1, to_int(status.run_time)?)?;
            Ok(status.pid as isize)
        }
        SysNum::Kill => kernel.kill(args.arg_int(0)?).map(|()| 0),
        SysNum::Getpid => kernel.current_pid().map(|pid| pid as isize),
        SysNum::Sbrk => {
            let delta = args.arg_int(0)? as isize;
            let old = kernel.grow(delta)?;
            isize::try_from(old).map_err(|_| Error::OutOfMemory)
        }
        SysNum::Yield => kernel.yield_now().map(|()| 0),

        // Time
        SysNum::Sleep => {
            let n = u64::try_from(args.arg_int(0)?)
                .map_err(|_| Error::InvalidArgument("negative sleep"))?;
            kernel.sleep_ticks(n).map(|()| 0)
        }
        SysNum::Uptime => Ok(to_int(kernel.uptime())? as isize),

        // Introspection
        SysNum::GetUncleCount => kernel.uncle_count(args.arg_int(0)?).map(|n| n as isize),
        SysNum::GetProcessLifetime => {
            let ticks = kernel.lifetime(args.arg_int(0)?)?;
            Ok(to_int(ticks)? as isize)
        }
        SysNum::GetNumSyscalls => kernel.syscall_counters().map(|c| c.total as isize),
        SysNum::GetNumSyscallsGood => kernel.syscall_counters().map(|c| c.good as isize),

        // Scheduling attributes
        SysNum::SetPriority => kernel.set_priority(args.arg_int(0)?).map(|()| 0),
        SysNum::SetSchedPolicy => kernel.set_active_policy_raw(args.arg_int(0)?).map(|()| 0),
        SysNum::SetBurstEstimate => kernel.set_burst_estimate(args.arg_int(0)?).map(|()| 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::process::testing::NullPlatform;
    use sched_api::SchedPolicy;

    /// Register file with room for the out-pointers of waitx
    #[derive(Default)]
    struct Regs {
        args: [i32; 2],
        out: [Option<i32>; 2],
    }

    impl Regs {
        fn with(arg: i32) -> Self {
            Self {
                args: [arg, 0],
                ..Self::default()
            }
        }
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

    fn kernel() -> Kernel<NullPlatform> {
        Kernel::new(NullPlatform, KernelConfig::default()).unwrap()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(SysNum::try_from(1), Ok(SysNum::Fork));
        assert_eq!(SysNum::try_from(28), Ok(SysNum::Waitx));
        assert_eq!(SysNum::try_from(34), Ok(SysNum::Yield));
        assert_eq!(SysNum::Yield as usize, 34);
        // Listing and the RR demo live outside the kernel.
        assert!(SysNum::try_from(30).is_err());
        assert!(SysNum::try_from(31).is_err());
        assert!(SysNum::try_from(0).is_err());
    }

    #[test]
    fn test_unknown_syscall_is_minus_one() {
        let k = kernel();
        assert_eq!(dispatch(&k, 99, &mut Regs::default()), -1);
    }

    #[test]
    fn test_uptime() {
        let k = kernel();
        k.clock_tick();
        k.clock_tick();
        k.clock_tick();
        assert_eq!(dispatch(&k, SysNum::Uptime as usize, &mut Regs::default()), 3);
    }

    #[test]
    fn test_setschedpolicy() {
        let k = kernel();
        let set = SysNum::SetSchedPolicy as usize;
        assert_eq!(dispatch(&k, set, &mut Regs::with(4)), 0);
        assert_eq!(k.active_policy(), SchedPolicy::RoundRobin);
        assert_eq!(dispatch(&k, set, &mut Regs::with(7)), -1);
        assert_eq!(k.active_policy(), SchedPolicy::RoundRobin);
    }

    #[test]
    fn test_calls_needing_a_process_fail() {
        let k = kernel();
        let mut regs = Regs::default();
        assert_eq!(invoke(&k, SysNum::Getpid as usize, &mut regs), Err(Error::NoCurrentProcess));
        assert_eq!(invoke(&k, SysNum::Fork as usize, &mut regs), Err(Error::NoCurrentProcess));
        assert_eq!(dispatch(&k, SysNum::Wait as usize, &mut regs), -1);
    }

    #[test]
    fn test_kill_unknown_pid() {
        let k = kernel();
        let mut regs = Regs::with(77);
        assert_eq!(invoke(&k, SysNum::Kill as usize, &mut regs), Err(Error::NotFound(77)));
    }

    #[test]
    fn test_uncle_count_and_lifetime_of_root() {
        let k = kernel();
        let root = k.userinit().unwrap();
        k.clock_tick();
        k.clock_tick();
        let mut regs = Regs::with(root);
        assert_eq!(dispatch(&k, SysNum::GetUncleCount as usize, &mut regs), 0);
        assert_eq!(dispatch(&k, SysNum::GetProcessLifetime as usize, &mut regs), 2);
    }
}
