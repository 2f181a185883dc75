//! Scheduler tests
//! Run order under each selection policy, observed on hosted machines

mod common;

use std::sync::Arc;

use common::{Gate, Trace};
use sched_kernel::SchedPolicy;

/// Fork one child per `(mark, priority, burst)`, one tick apart, hold them
/// at a gate until all have set their attributes, then release them and
/// record the order in which they get the CPU
fn scheduled_order(policy: SchedPolicy, seed: u32, kids: &[(char, i32, i32)]) -> String {
    let machine = sched_kernel::hosted::Machine::builder()
        .cpus(1)
        .policy(policy)
        .seed(seed)
        .timeout(common::TEST_TIMEOUT)
        .build()
        .expect("Failed to build machine");
    let kids = kids.to_vec();
    machine
        .run(move |sys| {
            let gate = Gate::new();
            let trace = Trace::new();
            for &(mark, priority, burst) in &kids {
                sys.advance_clock(1);
                let gate = Arc::clone(&gate);
                let trace = trace.clone();
                sys.fork(move |sys| {
                    sys.set_priority(priority).expect("set_priority");
                    sys.set_burst_estimate(burst).expect("set_burst_estimate");
                    gate.arrive_and_wait(sys);
                    trace.push(mark);
                })
                .expect("Failed to fork");
            }
            gate.wait_for(sys, kids.len());
            gate.open(sys);
            assert_eq!(common::reap_all(sys), kids.len());
            trace.collect()
        })
        .expect("Failed to run machine")
}

#[cfg(test)]
mod policy_order_tests {
    use super::*;

    /// FCFS runs in creation order whatever the priorities and bursts say
    #[test]
    fn test_fcfs_creation_order() {
        let order = scheduled_order(
            SchedPolicy::Fcfs,
            1,
            &[('A', 90, 9), ('B', 50, 5), ('C', 1, 1)],
        );
        assert_eq!(order, "ABC");
    }

    /// SJF runs the smallest burst estimate first; ties go to the lower slot
    #[test]
    fn test_sjf_shortest_burst_first() {
        let order = scheduled_order(
            SchedPolicy::Sjf,
            1,
            &[('A', 60, 7), ('B', 60, 2), ('C', 60, 4), ('D', 60, 2)],
        );
        assert_eq!(order, "BDCA");
    }

    /// BJF orders by priority, then by creation time
    #[test]
    fn test_bjf_priority_then_age() {
        let order = scheduled_order(
            SchedPolicy::Bjf,
            1,
            &[('A', 20, 5), ('B', 10, 5), ('C', 20, 5), ('D', 10, 5)],
        );
        assert_eq!(order, "BDAC");
    }

    /// The random policy replays identically for the same seed
    #[test]
    fn test_random_is_reproducible() {
        let kids = [('A', 60, 5), ('B', 60, 5), ('C', 60, 5), ('D', 60, 5)];
        let first = scheduled_order(SchedPolicy::Random, 7, &kids);
        let second = scheduled_order(SchedPolicy::Random, 7, &kids);
        assert_eq!(first, second);

        let mut marks: Vec<char> = first.chars().collect();
        marks.sort_unstable();
        assert_eq!(marks, ['A', 'B', 'C', 'D']);
    }
}

#[cfg(test)]
mod round_robin_tests {
    use super::*;

    /// Three children that yield after every step
    fn interleaving(policy: SchedPolicy) -> String {
        let machine = common::machine(1, policy);
        machine
            .run(|sys| {
                let gate = Gate::new();
                let trace = Trace::new();
                for mark in ['A', 'B', 'C'] {
                    sys.advance_clock(1);
                    let gate = Arc::clone(&gate);
                    let trace = trace.clone();
                    sys.fork(move |sys| {
                        gate.arrive_and_wait(sys);
                        for _ in 0..3 {
                            trace.push(mark);
                            sys.yield_now().expect("yield");
                        }
                    })
                    .expect("Failed to fork");
                }
                gate.wait_for(sys, 3);
                gate.open(sys);
                common::reap_all(sys);
                trace.collect()
            })
            .expect("Failed to run machine")
    }

    #[test]
    fn test_round_robin_interleaves() {
        assert_eq!(interleaving(SchedPolicy::RoundRobin), "ABCABCABC");
    }

    /// Yielding under FCFS hands the CPU straight back to the oldest process
    #[test]
    fn test_fcfs_yield_keeps_oldest() {
        assert_eq!(interleaving(SchedPolicy::Fcfs), "AAABBBCCC");
    }
}

#[cfg(test)]
mod multiprocessor_tests {
    use super::*;

    /// Many short-lived children on several CPUs all run and are reaped,
    /// leaving only the root's resources behind
    #[test]
    fn test_many_children_on_four_cpus() {
        const KIDS: usize = 16;
        let machine = common::machine(4, SchedPolicy::RoundRobin);
        let reaped = machine
            .run(|sys| {
                let trace = Trace::new();
                for _ in 0..KIDS {
                    let trace = trace.clone();
                    sys.fork(move |sys| {
                        for _ in 0..5 {
                            sys.yield_now().expect("yield");
                        }
                        trace.push('x');
                    })
                    .expect("Failed to fork");
                }
                let reaped = common::reap_all(sys);
                assert_eq!(trace.collect().len(), KIDS);
                assert_eq!(sys.processes().len(), 1);
                reaped
            })
            .expect("Failed to run machine");
        assert_eq!(reaped, KIDS);

        let stats = machine.platform_stats();
        assert_eq!(stats.live_kstacks, 1);
        assert_eq!(stats.live_spaces, 1);
        assert_eq!(stats.released_dirs, KIDS);
    }

    #[test]
    fn test_cpu_stats_count_handoffs() {
        let machine = common::machine(2, SchedPolicy::Fcfs);
        machine
            .run(|sys| {
                sys.fork(|_| {}).expect("Failed to fork");
                common::reap_all(sys);
            })
            .expect("Failed to run machine");

        let handoffs: u64 = (0..machine.cpus())
            .filter_map(|cpu| machine.cpu_stats(cpu))
            .map(|s| s.handoffs)
            .sum();
        // Root, child, and root again after the child's exit.
        assert!(handoffs >= 3);
        assert!(machine.cpu_stats(2).is_none());
    }

    /// Changing the policy takes effect for every CPU; bad ids change nothing
    #[test]
    fn test_policy_switch() {
        let machine = common::machine(2, SchedPolicy::Fcfs);
        machine
            .run(|sys| {
                sys.set_policy(SchedPolicy::Bjf).expect("set_policy");
                assert_eq!(sys.kernel().active_policy(), SchedPolicy::Bjf);
                assert!(sys.set_policy_raw(5).is_err());
                assert!(sys.set_policy_raw(-1).is_err());
                assert_eq!(sys.kernel().active_policy(), SchedPolicy::Bjf);
                sys.set_policy(SchedPolicy::RoundRobin).expect("set_policy");
            })
            .expect("Failed to run machine");
        assert_eq!(machine.kernel().active_policy(), SchedPolicy::RoundRobin);
    }
}
