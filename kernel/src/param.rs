//! Compile-time kernel parameters

/// Maximum number of processes
pub const NPROC: usize = 64;

/// Maximum number of CPUs a kernel instance can drive
pub const NCPU: usize = 8;

/// Open files per process
pub const NOFILE: usize = 16;

/// Priority given to every new process; lower values run first under BJF
pub const DEFAULT_PRIORITY: i32 = 60;

/// Burst estimate given to every new process; consumed only by SJF
pub const DEFAULT_BURST: i32 = 5;

/// Pid of the first process
pub const ROOT_PID: sched_api::Pid = 1;

/// Name of the first process
pub const ROOT_NAME: &str = "initcode";

static_assertions::const_assert!(NPROC > 1);
static_assertions::const_assert!(NCPU >= 1);
static_assertions::const_assert!(DEFAULT_BURST >= 0);
static_assertions::const_assert!(ROOT_PID > 0);
