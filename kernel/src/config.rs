//! Runtime configuration of a kernel instance

use sched_api::{Error, Result, SchedPolicy};

use crate::param::NCPU;

/// Seed of the random-policy generator when none is configured
pub const DEFAULT_RANDOM_SEED: u32 = 1;

/// Settings fixed when a [`crate::Kernel`] is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Number of CPU records, `1..=NCPU`
    pub ncpu: usize,
    /// Policy in force until a process changes it
    pub initial_policy: SchedPolicy,
    /// Seed of the random-policy generator
    pub random_seed: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            ncpu: 1,
            initial_policy: SchedPolicy::Fcfs,
            random_seed: DEFAULT_RANDOM_SEED,
        }
    }
}

impl KernelConfig {
    pub fn with_ncpu(mut self, ncpu: usize) -> Self {
        self.ncpu = ncpu;
        self
    }

    pub fn with_policy(mut self, policy: SchedPolicy) -> Self {
        self.initial_policy = policy;
        self
    }

    pub fn with_random_seed(mut self, seed: u32) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.ncpu == 0 {
            return Err(Error::InvalidArgument("at least one CPU required"));
        }
        if self.ncpu > NCPU {
            return Err(Error::InvalidArgument("more CPUs than NCPU"));
        }
        Ok(())
    }
}
