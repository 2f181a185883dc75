//! Core types shared by the scheduling core and its clients

use core::fmt;

use crate::error::Error;

/// Process ID type. Assigned from 1 upwards; 0 is never a live pid.
pub type Pid = i32;

/// Timer ticks since boot
pub type Ticks = u64;

/// Maximum stored length of a process name, in bytes
pub const PROC_NAME_LEN: usize = 16;

// ============================================================================
// Process state
// ============================================================================

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcState {
    #[default]
    Unused,
    Embryo,
    Sleeping,
    Runnable,
    Running,
    Zombie,
}

impl ProcState {
    /// Upper-case label used by process listings
    pub const fn label(&self) -> &'static str {
        match self {
            ProcState::Unused => "UNUSED",
            ProcState::Embryo => "EMBRYO",
            ProcState::Sleeping => "SLEEPING",
            ProcState::Runnable => "RUNNABLE",
            ProcState::Running => "RUNNING",
            ProcState::Zombie => "ZOMBIE",
        }
    }

    /// Whether the slot holds a process (anything but `Unused`)
    pub const fn is_live(&self) -> bool {
        !matches!(self, ProcState::Unused)
    }
}

impl fmt::Display for ProcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Scheduling policy
// ============================================================================

/// Process selection policy used by every CPU's scheduler loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SchedPolicy {
    /// First come, first served: earliest creation tick wins
    #[default]
    Fcfs,
    /// Shortest job first: smallest burst estimate wins
    Sjf,
    /// Best job first: smallest priority value, then earliest creation tick
    Bjf,
    /// Uniform pick among runnable processes
    Random,
    /// Every runnable process gets one turn per table sweep
    RoundRobin,
}

impl SchedPolicy {
    /// All policies, in identifier order
    pub const ALL: [SchedPolicy; 5] = [
        SchedPolicy::Fcfs,
        SchedPolicy::Sjf,
        SchedPolicy::Bjf,
        SchedPolicy::Random,
        SchedPolicy::RoundRobin,
    ];

    /// Identifier used across the syscall boundary
    pub const fn as_raw(&self) -> i32 {
        match self {
            SchedPolicy::Fcfs => 0,
            SchedPolicy::Sjf => 1,
            SchedPolicy::Bjf => 2,
            SchedPolicy::Random => 3,
            SchedPolicy::RoundRobin => 4,
        }
    }

    /// Short name
    pub const fn name(&self) -> &'static str {
        match self {
            SchedPolicy::Fcfs => "FCFS",
            SchedPolicy::Sjf => "SJF",
            SchedPolicy::Bjf => "BJF",
            SchedPolicy::Random => "RANDOM",
            SchedPolicy::RoundRobin => "RR",
        }
    }
}

impl TryFrom<i32> for SchedPolicy {
    type Error = Error;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(SchedPolicy::Fcfs),
            1 => Ok(SchedPolicy::Sjf),
            2 => Ok(SchedPolicy::Bjf),
            3 => Ok(SchedPolicy::Random),
            4 => Ok(SchedPolicy::RoundRobin),
            _ => Err(Error::InvalidPolicy(raw)),
        }
    }
}

impl fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Process name
// ============================================================================

/// Fixed-capacity process name; longer names are truncated on a char boundary
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProcName {
    bytes: [u8; PROC_NAME_LEN],
    len: u8,
}

impl ProcName {
    pub const fn empty() -> Self {
        Self {
            bytes: [0; PROC_NAME_LEN],
            len: 0,
        }
    }

    pub fn new(name: &str) -> Self {
        let mut end = name.len().min(PROC_NAME_LEN);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = [0; PROC_NAME_LEN];
        bytes[..end].copy_from_slice(&name.as_bytes()[..end]);
        Self {
            bytes,
            len: end as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        // Only ever filled from a `&str` cut at a char boundary.
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for ProcName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for ProcName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Register images
// ============================================================================

/// Callee-saved registers preserved across a context handoff
///
/// Only the context-swap primitive interprets the contents; the core treats
/// a context as an opaque slot it hands to that primitive.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    pub ra: usize,
    pub sp: usize,
    pub s: [usize; 12],
}

/// User registers saved on entry to the kernel
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapFrame {
    /// User program counter
    pub epc: usize,
    /// User stack pointer
    pub sp: usize,
    /// Return-value register
    pub ret: usize,
    /// Argument registers
    pub args: [usize; 6],
}

// ============================================================================
// Introspection records
// ============================================================================

/// One row of a process listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcInfo {
    pub pid: Pid,
    pub state: ProcState,
    pub priority: i32,
    pub runtime: Ticks,
    pub estimated_burst: i32,
    pub name: ProcName,
}

/// Timing data for a process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcTimes {
    pub createtime: Ticks,
    pub exittime: Ticks,
    pub runtime: Ticks,
    pub sleeptime: Ticks,
}

impl ProcTimes {
    /// Ticks spent neither running nor finished: `exittime - createtime - runtime`
    pub const fn wait_time(&self) -> Ticks {
        self.exittime
            .saturating_sub(self.createtime)
            .saturating_sub(self.runtime)
    }
}

/// Result of `waitx`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitxStatus {
    pub pid: Pid,
    pub wait_time: Ticks,
    pub run_time: Ticks,
}

/// Per-process syscall counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyscallCounters {
    /// Every syscall entered
    pub total: u64,
    /// Syscalls that returned a non-negative value
    pub good: u64,
}

static_assertions::const_assert!(PROC_NAME_LEN <= u8::MAX as usize);
static_assertions::assert_eq_size!(Context, [usize; 14]);
