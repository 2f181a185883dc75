//! A hosted machine: CPU threads, a root program, and the system call
//! surface programs use

use std::any::Any;
use std::boxed::Box;
use std::collections::BTreeMap;
use std::format;
use std::panic::{self, AssertUnwindSafe};
use std::string::{String, ToString};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak, mpsc};
use std::thread;
use std::time::Duration;
use std::vec::Vec;

use sched_api::{
    Error, Pid, ProcInfo, Result, SchedPolicy, SyscallCounters, Ticks, WaitxStatus,
};

use super::logger;
use super::platform::{HostedFile, HostedPlatform, PlatformStats};
use crate::config::KernelConfig;
use crate::kernel::Kernel;
use crate::param::NCPU;
use crate::sched::StatsSnapshot;
use crate::sync::{Channel, SpinLock, SpinLockGuard};
use crate::syscalls::{self, SysNum, SyscallArgs};

/// Kernel type a [`Machine`] runs
pub type HostedKernel = Kernel<HostedPlatform>;

type Program = Box<dyn FnOnce(&Sys) + Send>;

/// Wall-clock bound on a whole run unless configured otherwise
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        String::from("non-string panic")
    }
}

// ============================================================================
// Runtime shared by every thread of a machine
// ============================================================================

struct Runtime {
    /// Program bodies not yet started, keyed by the entry written to the
    /// trap frame of the process that will run them
    programs: Mutex<BTreeMap<usize, Program>>,
    next_program: AtomicUsize,
    /// A timer interrupt is pending
    tick_pending: AtomicBool,
    stop: AtomicBool,
    failures: Mutex<Vec<String>>,
}

impl Runtime {
    fn new() -> Self {
        Self {
            programs: Mutex::new(BTreeMap::new()),
            // Entry 0 is the root program.
            next_program: AtomicUsize::new(1),
            tick_pending: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            failures: Mutex::new(Vec::new()),
        }
    }

    fn register(&self, program: Program) -> usize {
        let id = self.next_program.fetch_add(1, Ordering::SeqCst);
        lock(&self.programs).insert(id, program);
        id
    }

    fn take(&self, id: usize) -> Option<Program> {
        lock(&self.programs).remove(&id)
    }

    /// Run the timer interrupt if one is pending; true if it ran
    fn deliver_tick(&self, kernel: &HostedKernel) -> bool {
        if self.tick_pending.swap(false, Ordering::SeqCst) {
            kernel.clock_tick();
            true
        } else {
            false
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// First code of every process thread
fn process_entry(kernel: &Weak<HostedKernel>, runtime: &Arc<Runtime>) {
    let Some(kernel) = kernel.upgrade() else {
        panic!("process started on a machine that is gone");
    };
    kernel.fork_return();

    let pid = match kernel.current_pid() {
        Ok(pid) => pid,
        Err(e) => panic!("process entry: {}", e),
    };
    let entry = match kernel.with_trapframe(|tf| tf.epc) {
        Ok(entry) => entry,
        Err(e) => panic!("process entry: {}", e),
    };
    let sys = Sys {
        kernel: Arc::clone(&kernel),
        runtime: Arc::clone(runtime),
        pid,
    };
    if let Some(program) = runtime.take(entry) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| program(&sys))) {
            let msg = format!("pid {}: {}", pid, panic_message(payload.as_ref()));
            log::error!("{}", msg);
            lock(&runtime.failures).push(msg);
        }
    }
    sys.exit()
}

// ============================================================================
// Machine
// ============================================================================

/// Builder for a [`Machine`]
#[derive(Debug, Clone)]
pub struct MachineBuilder {
    cpus: usize,
    policy: SchedPolicy,
    seed: u32,
    tick_interval: Option<Duration>,
    timeout: Duration,
}

impl Default for MachineBuilder {
    fn default() -> Self {
        let config = KernelConfig::default();
        Self {
            cpus: config.ncpu,
            policy: config.initial_policy,
            seed: config.random_seed,
            tick_interval: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl MachineBuilder {
    /// Number of scheduler CPUs, at most `NCPU - 1`
    pub fn cpus(mut self, cpus: usize) -> Self {
        self.cpus = cpus;
        self
    }

    pub fn policy(mut self, policy: SchedPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Raise a timer interrupt every `interval` of wall-clock time; without
    /// one the clock only moves through [`Sys::advance_clock`]
    pub fn tick_interval(mut self, interval: Option<Duration>) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Machine> {
        logger::init();
        if self.cpus == 0 || self.cpus >= NCPU {
            return Err(Error::InvalidArgument("hosted machines run 1..NCPU cpus"));
        }
        // One extra CPU record for threads outside the machine.
        let config = KernelConfig::default()
            .with_ncpu(self.cpus + 1)
            .with_policy(self.policy)
            .with_random_seed(self.seed);
        let kernel = Arc::new(Kernel::new(HostedPlatform::new(self.cpus), config)?);
        let runtime = Arc::new(Runtime::new());

        let weak = Arc::downgrade(&kernel);
        let rt = Arc::clone(&runtime);
        kernel
            .platform()
            .set_entry(Box::new(move || process_entry(&weak, &rt)));

        Ok(Machine {
            kernel,
            runtime,
            monitor: Mutex::new(()),
            cpus: self.cpus,
            tick_interval: self.tick_interval,
            timeout: self.timeout,
        })
    }
}

/// A kernel running on host threads
///
/// [`Machine::run`] boots the CPUs and runs a root program; the machine can
/// still be inspected from the calling thread afterwards.
pub struct Machine {
    kernel: Arc<HostedKernel>,
    runtime: Arc<Runtime>,
    /// Serializes use of the monitor CPU by outside threads
    monitor: Mutex<()>,
    cpus: usize,
    tick_interval: Option<Duration>,
    timeout: Duration,
}

impl Machine {
    pub fn builder() -> MachineBuilder {
        MachineBuilder::default()
    }

    pub fn cpus(&self) -> usize {
        self.cpus
    }

    /// Boot the machine and run `body` as the root process; returns what
    /// `body` returns
    ///
    /// Panics if `body` panics, if any other process panicked, or if the run
    /// exceeds the configured timeout.
    pub fn run<R, F>(&self, body: F) -> Result<R>
    where
        F: FnOnce(&Sys) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let root: Program = Box::new(move |sys: &Sys| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| body(sys)));
            let _ = tx.send(result);
            sys.reap_forever()
        });
        lock(&self.runtime.programs).insert(0, root);
        {
            let _monitor = lock(&self.monitor);
            self.kernel.userinit()?;
        }

        for cpu in 0..self.cpus {
            self.start_cpu(cpu)?;
        }
        if let Some(interval) = self.tick_interval {
            self.start_timer(interval)?;
        }

        let outcome = rx.recv_timeout(self.timeout);
        self.runtime.stop.store(true, Ordering::SeqCst);
        let result = match outcome {
            Ok(Ok(value)) => value,
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => panic!("machine: root program did not finish within {:?}", self.timeout),
        };

        let failures = lock(&self.runtime.failures);
        if !failures.is_empty() {
            panic!("machine: {} process(es) panicked: {:?}", failures.len(), *failures);
        }
        Ok(result)
    }

    fn start_cpu(&self, cpu: usize) -> Result<()> {
        let kernel = Arc::clone(&self.kernel);
        let runtime = Arc::clone(&self.runtime);
        thread::Builder::new()
            .name(format!("cpu{}", cpu))
            .spawn(move || {
                kernel.platform().bind_cpu(cpu);
                while !runtime.stopped() {
                    runtime.deliver_tick(&kernel);
                    kernel.scheduler_pass();
                }
                log::debug!("cpu {} stopped", cpu);
            })
            .map(drop)
            .map_err(|_| Error::OutOfMemory)
    }

    fn start_timer(&self, interval: Duration) -> Result<()> {
        let runtime = Arc::clone(&self.runtime);
        thread::Builder::new()
            .name(String::from("timer"))
            .spawn(move || {
                while !runtime.stopped() {
                    thread::sleep(interval);
                    runtime.tick_pending.store(true, Ordering::SeqCst);
                }
            })
            .map(drop)
            .map_err(|_| Error::OutOfMemory)
    }

    /// The kernel; calls from outside the machine should go through
    /// [`Machine::processes`] and friends, which serialize on the monitor CPU
    pub fn kernel(&self) -> &HostedKernel {
        &self.kernel
    }

    pub fn processes(&self) -> Vec<ProcInfo> {
        let _monitor = lock(&self.monitor);
        self.kernel.list_processes()
    }

    pub fn uptime(&self) -> Ticks {
        let _monitor = lock(&self.monitor);
        self.kernel.uptime()
    }

    pub fn cpu_stats(&self, cpu: usize) -> Option<StatsSnapshot> {
        if cpu >= self.cpus {
            return None;
        }
        self.kernel.cpu_stats(cpu)
    }

    pub fn platform_stats(&self) -> PlatformStats {
        self.kernel.platform().stats()
    }

    pub fn fail_next_kstack(&self) {
        self.kernel.platform().fail_next_kstack();
    }

    pub fn fail_next_duplicate(&self) {
        self.kernel.platform().fail_next_duplicate();
    }
}

// ============================================================================
// System call surface
// ============================================================================

/// Argument registers of one call, plus what the kernel stored through
/// pointer arguments
#[derive(Debug, Default)]
struct RegArgs {
    args: [i32; 6],
    out: [Option<i32>; 6],
}

impl RegArgs {
    fn with(arg: i32) -> Self {
        let mut regs = Self::default();
        regs.args[0] = arg;
        regs
    }
}

impl SyscallArgs for RegArgs {
    fn arg_int(&self, n: usize) -> Result<i32> {
        self.args.get(n).copied().ok_or(Error::BadAddress)
    }

    fn put_int(&mut self, n: usize, value: i32) -> Result<()> {
        let slot = self.out.get_mut(n).ok_or(Error::BadAddress)?;
        *slot = Some(value);
        Ok(())
    }
}

/// Handle through which a program talks to the kernel
///
/// Every method that corresponds to a system call goes through the syscall
/// dispatcher, so it shows up in the caller's counters.
pub struct Sys {
    kernel: Arc<HostedKernel>,
    runtime: Arc<Runtime>,
    pid: Pid,
}

impl Sys {
    fn syscall(&self, num: SysNum, regs: &mut RegArgs) -> Result<isize> {
        syscalls::invoke(&self.kernel, num as usize, regs)
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn kernel(&self) -> &HostedKernel {
        &self.kernel
    }

    // ------------------------------------------------------------------------
    // Process management
    // ------------------------------------------------------------------------

    /// Fork; the child runs `child` and then exits
    pub fn fork<F>(&self, child: F) -> Result<Pid>
    where
        F: FnOnce(&Sys) + Send + 'static,
    {
        let id = self.runtime.register(Box::new(child));
        self.kernel.with_trapframe(|tf| tf.epc = id)?;
        match self.syscall(SysNum::Fork, &mut RegArgs::default()) {
            Ok(pid) => Ok(pid as Pid),
            Err(e) => {
                drop(self.runtime.take(id));
                Err(e)
            }
        }
    }

    pub fn exit(&self) -> ! {
        let _ = self.syscall(SysNum::Exit, &mut RegArgs::default());
        unreachable!("exit returned");
    }

    pub fn wait(&self) -> Result<Pid> {
        self.syscall(SysNum::Wait, &mut RegArgs::default())
            .map(|pid| pid as Pid)
    }

    pub fn waitx(&self) -> Result<WaitxStatus> {
        let mut regs = RegArgs::default();
        let pid = self.syscall(SysNum::Waitx, &mut regs)?;
        let out = |n: usize| regs.out[n].map_or(0, |v| v as Ticks);
        Ok(WaitxStatus {
            pid: pid as Pid,
            wait_time: out(0),
            run_time: out(1),
        })
    }

    pub fn kill(&self, pid: Pid) -> Result<()> {
        self.syscall(SysNum::Kill, &mut RegArgs::with(pid)).map(drop)
    }

    pub fn getpid(&self) -> Result<Pid> {
        self.syscall(SysNum::Getpid, &mut RegArgs::default())
            .map(|pid| pid as Pid)
    }

    pub fn yield_now(&self) -> Result<()> {
        self.syscall(SysNum::Yield, &mut RegArgs::default()).map(drop)
    }

    /// Grow the address space by `delta` bytes; returns the previous size
    pub fn sbrk(&self, delta: i32) -> Result<usize> {
        self.syscall(SysNum::Sbrk, &mut RegArgs::with(delta))
            .map(|old| old as usize)
    }

    pub fn killed(&self) -> bool {
        self.kernel.is_killed().unwrap_or(false)
    }

    /// Return-to-user checkpoint: take a pending timer interrupt, giving up
    /// the CPU if one arrived, then report whether this process was killed
    pub fn checkpoint(&self) -> bool {
        if self.runtime.deliver_tick(&self.kernel) {
            self.kernel
                .yield_now()
                .expect("checkpoint: program runs outside a process");
        }
        self.killed()
    }

    // ------------------------------------------------------------------------
    // Time
    // ------------------------------------------------------------------------

    pub fn sleep(&self, ticks: i32) -> Result<()> {
        self.syscall(SysNum::Sleep, &mut RegArgs::with(ticks)).map(drop)
    }

    pub fn uptime(&self) -> Result<Ticks> {
        self.syscall(SysNum::Uptime, &mut RegArgs::default())
            .map(|t| t as Ticks)
    }

    /// Run `n` timer interrupts on this CPU, charging them to the caller
    pub fn advance_clock(&self, n: u64) {
        for _ in 0..n {
            self.kernel.clock_tick();
        }
    }

    // ------------------------------------------------------------------------
    // Scheduling attributes
    // ------------------------------------------------------------------------

    pub fn set_priority(&self, priority: i32) -> Result<()> {
        self.syscall(SysNum::SetPriority, &mut RegArgs::with(priority))
            .map(drop)
    }

    pub fn set_burst_estimate(&self, burst: i32) -> Result<()> {
        self.syscall(SysNum::SetBurstEstimate, &mut RegArgs::with(burst))
            .map(drop)
    }

    pub fn set_policy(&self, policy: SchedPolicy) -> Result<()> {
        self.set_policy_raw(policy.as_raw())
    }

    pub fn set_policy_raw(&self, raw: i32) -> Result<()> {
        self.syscall(SysNum::SetSchedPolicy, &mut RegArgs::with(raw))
            .map(drop)
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    pub fn uncle_count(&self, pid: Pid) -> Result<usize> {
        self.syscall(SysNum::GetUncleCount, &mut RegArgs::with(pid))
            .map(|n| n as usize)
    }

    pub fn lifetime(&self, pid: Pid) -> Result<Ticks> {
        self.syscall(SysNum::GetProcessLifetime, &mut RegArgs::with(pid))
            .map(|t| t as Ticks)
    }

    pub fn num_syscalls(&self) -> Result<u64> {
        self.syscall(SysNum::GetNumSyscalls, &mut RegArgs::default())
            .map(|n| n as u64)
    }

    pub fn num_good_syscalls(&self) -> Result<u64> {
        self.syscall(SysNum::GetNumSyscallsGood, &mut RegArgs::default())
            .map(|n| n as u64)
    }

    /// Counters read straight from the table, without counting the read
    pub fn syscall_counters(&self) -> Result<SyscallCounters> {
        self.kernel.syscall_counters()
    }

    pub fn processes(&self) -> Vec<ProcInfo> {
        self.kernel.list_processes()
    }

    // ------------------------------------------------------------------------
    // Blocking on program-defined conditions
    // ------------------------------------------------------------------------

    pub fn lock<'a, T>(&'a self, lock: &'a SpinLock<T>) -> SpinLockGuard<'a, T> {
        self.kernel.acquire(lock)
    }

    /// Release `guard`, sleep on `chan`, and re-acquire before returning
    pub fn sleep_on<'a, T>(&'a self, chan: Channel, guard: SpinLockGuard<'a, T>) -> SpinLockGuard<'a, T> {
        self.kernel.sleep(chan, guard)
    }

    pub fn wakeup(&self, chan: Channel) {
        self.kernel.wakeup(chan);
    }

    /// Open the console on the lowest free descriptor
    pub fn open_console(&self) -> Result<usize> {
        self.kernel.fdalloc(Arc::new(HostedFile::new("console")))
    }

    /// Reap children until none are left, then wait for orphans
    fn reap_forever(&self) -> ! {
        let idle = SpinLock::new("reaper", ());
        loop {
            if self.kernel.wait().is_err() {
                let guard = self.kernel.acquire(&idle);
                drop(self.kernel.sleep(Channel::Proc(self.pid), guard));
            }
        }
    }
}
