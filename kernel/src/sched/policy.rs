//! Selection policies
//!
//! Each policy is a pure function from the runnable processes, in table slot
//! order, to the one that runs next. The scheduler loop builds the snapshot
//! under the table lock and acts on the answer; nothing here touches the
//! table itself.

use sched_api::{Pid, SchedPolicy, Ticks};

use super::Lcg;

/// What a policy may look at for one runnable process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub slot: usize,
    pub pid: Pid,
    pub createtime: Ticks,
    pub priority: i32,
    pub estimated_burst: i32,
}

/// Selection behaviour of a [`SchedPolicy`]
pub trait Select {
    /// Pick from `candidates`, which are in ascending slot order
    fn select(&self, candidates: &[Candidate], rng: &mut Lcg) -> Option<Candidate>;

    /// Whether one scheduler pass runs every runnable process in slot order
    /// instead of a single pick
    fn is_sweep(&self) -> bool;
}

impl Select for SchedPolicy {
    fn select(&self, candidates: &[Candidate], rng: &mut Lcg) -> Option<Candidate> {
        // `min_by_key` keeps the first of several equal minima, which is the
        // lowest slot.
        match self {
            SchedPolicy::Fcfs => candidates.iter().min_by_key(|c| c.createtime).copied(),
            SchedPolicy::Sjf => candidates.iter().min_by_key(|c| c.estimated_burst).copied(),
            SchedPolicy::Bjf => candidates
                .iter()
                .min_by_key(|c| (c.priority, c.createtime))
                .copied(),
            SchedPolicy::Random => {
                if candidates.is_empty() {
                    None
                } else {
                    Some(candidates[rng.below(candidates.len())])
                }
            }
            SchedPolicy::RoundRobin => candidates.first().copied(),
        }
    }

    fn is_sweep(&self) -> bool {
        matches!(self, SchedPolicy::RoundRobin)
    }
}
