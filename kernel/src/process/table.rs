//! Process control blocks and the fixed-size table that owns them

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;

use hashbrown::HashMap;
use sched_api::{
    Context, Error, Pid, Platform, ProcInfo, ProcName, ProcState, ProcTimes, Result, SchedPolicy,
    SyscallCounters, Ticks, TrapFrame,
};

use crate::param::{DEFAULT_BURST, DEFAULT_PRIORITY, NOFILE, NPROC, ROOT_PID};
use crate::sched::{Candidate, Lcg, Select};
use crate::sync::Channel;

// ============================================================================
// Process control block
// ============================================================================

/// Process control block
pub struct Proc<P: Platform> {
    pub(crate) pid: Pid,
    pub(crate) state: ProcState,
    /// Parent by pid; a pid that no longer resolves means "no parent"
    pub(crate) parent: Option<Pid>,
    pub(crate) name: ProcName,
    /// Lower value = runs earlier under BJF
    pub(crate) priority: i32,
    /// Caller-supplied estimate of remaining CPU need; read only by SJF
    pub(crate) estimated_burst: i32,
    pub(crate) times: ProcTimes,
    pub(crate) syscalls: SyscallCounters,
    pub(crate) killed: bool,
    /// Set only while `Sleeping`
    pub(crate) chan: Option<Channel>,

    pub(crate) kstack: Option<P::KernelStack>,
    pub(crate) kstack_top: usize,
    pub(crate) context: Context,
    pub(crate) trapframe: TrapFrame,
    pub(crate) space: Option<P::AddressSpace>,
    /// Size of the address space in bytes
    pub(crate) size: usize,
    pub(crate) ofile: [Option<Arc<P::File>>; NOFILE],
    pub(crate) cwd: Option<Arc<P::Dir>>,
}

impl<P: Platform> Proc<P> {
    /// A free slot: every field at its pristine value
    pub fn new() -> Self {
        Self {
            pid: 0,
            state: ProcState::Unused,
            parent: None,
            name: ProcName::empty(),
            priority: 0,
            estimated_burst: 0,
            times: ProcTimes::default(),
            syscalls: SyscallCounters::default(),
            killed: false,
            chan: None,
            kstack: None,
            kstack_top: 0,
            context: Context::default(),
            trapframe: TrapFrame::default(),
            space: None,
            size: 0,
            ofile: core::array::from_fn(|_| None),
            cwd: None,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn state(&self) -> ProcState {
        self.state
    }

    pub fn parent(&self) -> Option<Pid> {
        self.parent
    }

    pub fn name(&self) -> &ProcName {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn estimated_burst(&self) -> i32 {
        self.estimated_burst
    }

    pub fn times(&self) -> ProcTimes {
        self.times
    }

    pub fn syscalls(&self) -> SyscallCounters {
        self.syscalls
    }

    pub fn killed(&self) -> bool {
        self.killed
    }

    pub fn chan(&self) -> Option<Channel> {
        self.chan
    }

    pub fn trapframe(&self) -> &TrapFrame {
        &self.trapframe
    }

    pub fn info(&self) -> ProcInfo {
        ProcInfo {
            pid: self.pid,
            state: self.state,
            priority: self.priority,
            runtime: self.times.runtime,
            estimated_burst: self.estimated_burst,
            name: self.name,
        }
    }

    fn candidate(&self, slot: usize) -> Candidate {
        Candidate {
            slot,
            pid: self.pid,
            createtime: self.times.createtime,
            priority: self.priority,
            estimated_burst: self.estimated_burst,
        }
    }
}

impl<P: Platform> Default for Proc<P> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Process table
// ============================================================================

/// Fixed-capacity process table
///
/// Slots are scanned linearly for every selection and allocation; the pid
/// index only speeds up lookups by pid.
pub struct ProcTable<P: Platform> {
    procs: [Proc<P>; NPROC],
    next_pid: Pid,
    pid_to_index: HashMap<Pid, usize>,
    policy: SchedPolicy,
    rng: Lcg,
    root: Option<Pid>,
}

impl<P: Platform> ProcTable<P> {
    pub fn new(policy: SchedPolicy, seed: u32) -> Self {
        Self {
            procs: core::array::from_fn(|_| Proc::new()),
            next_pid: ROOT_PID,
            pid_to_index: HashMap::with_capacity(NPROC),
            policy,
            rng: Lcg::new(seed),
            root: None,
        }
    }

    /// Number of live (non-`Unused`) slots
    pub fn len(&self) -> usize {
        self.pid_to_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pid_to_index.is_empty()
    }

    pub fn policy(&self) -> SchedPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: SchedPolicy) {
        self.policy = policy;
    }

    pub fn root(&self) -> Option<Pid> {
        self.root
    }

    pub(crate) fn set_root(&mut self, pid: Pid) {
        self.root = Some(pid);
    }

    /// Claim the first `Unused` slot as an `Embryo` with a fresh pid and
    /// default scheduling attributes
    pub fn allocate(&mut self, now: Ticks) -> Result<usize> {
        let slot = self
            .procs
            .iter()
            .position(|p| p.state == ProcState::Unused)
            .ok_or(Error::NoFreeSlot)?;

        let pid = self.next_pid;
        self.next_pid += 1;

        let p = &mut self.procs[slot];
        p.state = ProcState::Embryo;
        p.pid = pid;
        p.times = ProcTimes {
            createtime: now,
            ..ProcTimes::default()
        };
        p.syscalls = SyscallCounters::default();
        p.priority = DEFAULT_PRIORITY;
        p.estimated_burst = DEFAULT_BURST;

        self.pid_to_index.insert(pid, slot);
        Ok(slot)
    }

    /// Return `slot` to `Unused`, handing back the old contents so the
    /// caller can release what it owned
    pub fn reclaim(&mut self, slot: usize) -> Proc<P> {
        let old = core::mem::replace(&mut self.procs[slot], Proc::new());
        if old.state != ProcState::Unused {
            self.pid_to_index.remove(&old.pid);
        }
        old
    }

    pub fn slot_of(&self, pid: Pid) -> Option<usize> {
        self.pid_to_index.get(&pid).copied()
    }

    pub fn get(&self, slot: usize) -> &Proc<P> {
        &self.procs[slot]
    }

    pub fn get_mut(&mut self, slot: usize) -> &mut Proc<P> {
        &mut self.procs[slot]
    }

    pub fn find(&self, pid: Pid) -> Option<&Proc<P>> {
        self.slot_of(pid).map(|slot| &self.procs[slot])
    }

    pub fn find_mut(&mut self, pid: Pid) -> Option<&mut Proc<P>> {
        self.slot_of(pid).map(move |slot| &mut self.procs[slot])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Proc<P>> {
        self.procs.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Proc<P>> {
        self.procs.iter_mut()
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Ask the active policy for the next slot to run
    pub fn select(&mut self) -> Option<usize> {
        let candidates: heapless::Vec<Candidate, NPROC> = self
            .procs
            .iter()
            .enumerate()
            .filter(|(_, p)| p.state == ProcState::Runnable)
            .map(|(slot, p)| p.candidate(slot))
            .collect();
        self.policy
            .select(&candidates, &mut self.rng)
            .map(|c| c.slot)
    }

    // ========================================================================
    // Sleep / wakeup
    // ========================================================================

    /// Make every process sleeping on `chan` runnable; returns how many woke
    pub fn wakeup(&mut self, chan: Channel) -> usize {
        let mut woken = 0;
        for p in self.procs.iter_mut() {
            if p.state == ProcState::Sleeping && p.chan == Some(chan) {
                p.state = ProcState::Runnable;
                woken += 1;
            }
        }
        woken
    }

    /// Flag `pid` as killed, waking it if it sleeps
    pub fn kill(&mut self, pid: Pid) -> Result<()> {
        let p = self.find_mut(pid).ok_or(Error::NotFound(pid))?;
        p.killed = true;
        if p.state == ProcState::Sleeping {
            p.state = ProcState::Runnable;
        }
        Ok(())
    }

    // ========================================================================
    // Family
    // ========================================================================

    /// Hand every child of `from` to `to`; true if any of them is a zombie
    pub fn reparent(&mut self, from: Pid, to: Pid) -> bool {
        let mut zombie = false;
        for p in self.procs.iter_mut() {
            if p.state != ProcState::Unused && p.parent == Some(from) {
                p.parent = Some(to);
                zombie |= p.state == ProcState::Zombie;
            }
        }
        zombie
    }

    /// Scan for children of `parent`: whether any exist, and the first zombie
    pub fn zombie_child(&self, parent: Pid) -> (bool, Option<usize>) {
        let mut have_kids = false;
        for (slot, p) in self.procs.iter().enumerate() {
            if p.state == ProcState::Unused || p.parent != Some(parent) {
                continue;
            }
            have_kids = true;
            if p.state == ProcState::Zombie {
                return (true, Some(slot));
            }
        }
        (have_kids, None)
    }

    /// Live parent of `pid`, if it still resolves
    fn live_parent(&self, pid: Pid) -> Option<Pid> {
        self.find(pid)
            .and_then(|p| p.parent)
            .filter(|parent| self.find(*parent).is_some())
    }

    /// Number of the grandparent's other children
    pub fn uncle_count(&self, pid: Pid) -> Result<usize> {
        if self.find(pid).is_none() {
            return Err(Error::NotFound(pid));
        }
        let Some(parent) = self.live_parent(pid) else {
            return Ok(0);
        };
        let Some(grandparent) = self.live_parent(parent) else {
            return Ok(0);
        };
        Ok(self
            .procs
            .iter()
            .filter(|p| p.state != ProcState::Unused)
            .filter(|p| p.parent == Some(grandparent) && p.pid != parent)
            .count())
    }

    /// Ticks since `pid` was created
    pub fn lifetime(&self, pid: Pid, now: Ticks) -> Result<Ticks> {
        self.find(pid)
            .map(|p| now.saturating_sub(p.times.createtime))
            .ok_or(Error::NotFound(pid))
    }

    /// Accrue one tick of runtime to every running process
    pub fn charge_tick(&mut self) {
        for p in self.procs.iter_mut() {
            if p.state == ProcState::Running {
                p.times.runtime += 1;
            }
        }
    }

    pub fn list(&self) -> Vec<ProcInfo> {
        self.procs
            .iter()
            .filter(|p| p.state != ProcState::Unused)
            .map(Proc::info)
            .collect()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::process::testing::NullPlatform;
    use hashbrown::HashSet;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Allocate,
        Reclaim(usize),
        Kill(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => Just(Op::Allocate),
            2 => (0..NPROC).prop_map(Op::Reclaim),
            1 => (0..NPROC).prop_map(Op::Kill),
        ]
    }

    proptest! {
        /// No pid is ever handed out twice, and the live count never
        /// exceeds the table
        #[test]
        fn pids_unique_and_bounded(ops in proptest::collection::vec(op(), 0..300)) {
            let mut t: ProcTable<NullPlatform> = ProcTable::new(SchedPolicy::Fcfs, 1);
            let mut issued = HashSet::new();

            for op in ops {
                match op {
                    Op::Allocate => match t.allocate(0) {
                        Ok(slot) => prop_assert!(issued.insert(t.get(slot).pid())),
                        Err(e) => {
                            prop_assert_eq!(e, Error::NoFreeSlot);
                            prop_assert_eq!(t.len(), NPROC);
                        }
                    },
                    Op::Reclaim(slot) => {
                        let _ = t.reclaim(slot);
                    }
                    Op::Kill(slot) => {
                        if t.get(slot).state() != ProcState::Unused {
                            let pid = t.get(slot).pid();
                            prop_assert!(t.kill(pid).is_ok());
                            prop_assert!(t.get(slot).killed());
                        }
                    }
                }

                let live: Vec<Pid> = t
                    .iter()
                    .filter(|p| p.state() != ProcState::Unused)
                    .map(Proc::pid)
                    .collect();
                prop_assert!(live.len() <= NPROC);
                prop_assert_eq!(live.len(), t.len());
                let distinct: HashSet<Pid> = live.iter().copied().collect();
                prop_assert_eq!(distinct.len(), live.len());
                for pid in live {
                    prop_assert_eq!(t.find(pid).map(Proc::pid), Some(pid));
                }
            }
        }
    }
}
