//! Scheduling core of a small multiprocessor kernel
//!
//! This crate owns the process table and the per-CPU scheduler loop. It
//! implements process creation and teardown, five interchangeable selection
//! policies, and the sleep/wakeup primitives the rest of the kernel blocks on.
//!
//! # Architecture
//!
//! - **Synchronization** (`sync`): interrupt-aware spinlocks and wait channels
//! - **CPUs** (`cpu`): per-CPU scheduler context and interrupt nesting state
//! - **Process Management** (`process`): process table, fork/exit/wait, sleep/wakeup
//! - **Scheduling** (`sched`): the scheduler loop and the selection policies
//! - **Metrics** (`metrics`): tick accounting and introspection queries
//! - **System Calls** (`syscalls`): number table and dispatch
//! - **Hosted platform** (`hosted`): thread-backed simulation, feature `hosted`
//!
//! Everything below the core (page tables, files, register switching) comes in
//! through the [`sched_api::Platform`] traits, so several kernels can live in
//! one host process, one per [`Kernel`] value.
//!
//! # Features
//!
//! - `hosted` (default): enables `std` and the simulation platform

#![cfg_attr(not(test), no_std)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

extern crate alloc;

pub mod config;
pub mod cpu;
pub mod kernel;
pub mod metrics;
pub mod param;
pub mod process;
pub mod sched;
pub mod sync;
pub mod syscalls;

#[cfg(feature = "hosted")]
pub mod hosted;

pub use crate::config::KernelConfig;
pub use crate::kernel::Kernel;
pub use crate::sync::{Channel, SpinLock, SpinLockGuard};
pub use sched_api::{Error, Pid, ProcInfo, ProcState, Result, SchedPolicy, WaitxStatus};
