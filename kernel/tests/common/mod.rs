//! Common helpers for the hosted-machine integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sched_kernel::hosted::{Machine, Sys};
use sched_kernel::{Channel, SchedPolicy, SpinLock};

/// Bound on a single test run
pub const TEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Machine with `cpus` CPUs and no timer: the clock only moves when a
/// program advances it
pub fn machine(cpus: usize, policy: SchedPolicy) -> Machine {
    Machine::builder()
        .cpus(cpus)
        .policy(policy)
        .timeout(TEST_TIMEOUT)
        .build()
        .expect("Failed to build machine")
}

#[derive(Debug, Default)]
struct GateState {
    arrived: usize,
    open: bool,
}

/// Rendezvous built on the kernel's own sleep/wakeup
///
/// Children announce themselves and block; the parent waits until all of
/// them are parked, then releases them together.
#[derive(Debug)]
pub struct Gate {
    state: SpinLock<GateState>,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: SpinLock::new("gate", GateState::default()),
        })
    }

    fn chan(&self) -> Channel {
        Channel::of(self)
    }

    /// Announce arrival and block until opened; false if killed meanwhile
    pub fn arrive_and_wait(&self, sys: &Sys) -> bool {
        let mut state = sys.lock(&self.state);
        state.arrived += 1;
        sys.wakeup(self.chan());
        while !state.open {
            if sys.killed() {
                return false;
            }
            state = sys.sleep_on(self.chan(), state);
        }
        true
    }

    /// Block until `n` processes have arrived
    pub fn wait_for(&self, sys: &Sys, n: usize) {
        let mut state = sys.lock(&self.state);
        while state.arrived < n {
            state = sys.sleep_on(self.chan(), state);
        }
    }

    pub fn open(&self, sys: &Sys) {
        let mut state = sys.lock(&self.state);
        state.open = true;
        sys.wakeup(self.chan());
    }
}

/// Order in which processes reached some point
#[derive(Debug, Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<char>>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, mark: char) {
        self.0.lock().expect("trace poisoned").push(mark);
    }

    pub fn collect(&self) -> String {
        self.0.lock().expect("trace poisoned").iter().collect()
    }
}

/// Reap children until none are left; returns how many were reaped
pub fn reap_all(sys: &Sys) -> usize {
    let mut reaped = 0;
    while sys.wait().is_ok() {
        reaped += 1;
    }
    reaped
}
