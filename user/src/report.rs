//! Per-policy measurements and the comparison summary

use std::fmt::Write;

use sched_api::{SchedPolicy, Ticks};

/// What one policy's test child cost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub wait_time: Ticks,
    pub run_time: Ticks,
    /// Syscalls the parent made around the child's run
    pub syscalls: u64,
    pub good_syscalls: u64,
    /// Child lifetime sampled while it was running
    pub lifetime: Ticks,
    pub uncles: usize,
}

impl Measurement {
    pub fn total(&self) -> Ticks {
        self.wait_time + self.run_time
    }
}

/// A policy and, if its run completed, the measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyRun {
    pub policy: SchedPolicy,
    pub outcome: Option<Measurement>,
}

#[derive(Debug, Clone, Default)]
pub struct Summary {
    runs: Vec<PolicyRun>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, policy: SchedPolicy, outcome: Option<Measurement>) {
        self.runs.push(PolicyRun { policy, outcome });
    }

    pub fn runs(&self) -> &[PolicyRun] {
        &self.runs
    }

    /// Completed run with the least run time; the earliest wins ties
    pub fn best_by_run_time(&self) -> Option<(SchedPolicy, Ticks)> {
        self.best_by(|m| m.run_time)
    }

    /// Completed run with the least wait plus run time
    pub fn best_by_total(&self) -> Option<(SchedPolicy, Ticks)> {
        self.best_by(Measurement::total)
    }

    fn best_by(&self, key: impl Fn(&Measurement) -> Ticks) -> Option<(SchedPolicy, Ticks)> {
        self.runs
            .iter()
            .filter_map(|run| run.outcome.map(|m| (run.policy, key(&m))))
            .min_by_key(|&(_, value)| value)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "--- Comparison Summary ---");
        let _ = writeln!(
            out,
            "Scheduler | Wait Time | Run Time | Total | Syscalls | Lifetime | Uncles"
        );
        let _ = writeln!(
            out,
            "----------|-----------|----------|-------|----------|----------|-------"
        );
        for run in &self.runs {
            let name = run.policy.name();
            match run.outcome {
                Some(m) => {
                    let _ = writeln!(
                        out,
                        "{:<6} | {:<9} | {:<8} | {:<5} | {:<8} | {:<8} | {}",
                        name,
                        m.wait_time,
                        m.run_time,
                        m.total(),
                        format!("{}/{}", m.good_syscalls, m.syscalls),
                        m.lifetime,
                        m.uncles
                    );
                }
                None => {
                    let _ = writeln!(
                        out,
                        "{:<6} | ---       | ---      | ---   | ---      | ---      | ---",
                        name
                    );
                }
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "--- Suggestion ---");
        match self.best_by_run_time() {
            Some((policy, ticks)) => {
                let _ = writeln!(
                    out,
                    "Best scheduler based on Run Time: {} (Runtime: {})",
                    policy.name(),
                    ticks
                );
            }
            None => {
                let _ = writeln!(out, "Could not determine best scheduler based on runtime.");
            }
        }
        match self.best_by_total() {
            Some((policy, ticks)) => {
                let _ = writeln!(
                    out,
                    "Best scheduler based on Total Time: {} (Total Time: {})",
                    policy.name(),
                    ticks
                );
            }
            None => {
                let _ = writeln!(out, "Could not determine best scheduler based on total time.");
            }
        }
        out
    }
}
