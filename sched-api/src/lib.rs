//! Scheduling core API - shared types and collaborator interfaces
//!
//! This crate holds everything the process-table/scheduler core and its
//! surrounding layers need to agree on without depending on each other:
//!
//! - **Error**: the crate-wide error enum and `Result` alias
//! - **Types**: pids, process states, selection policies, register images,
//!   and the plain-data records returned by introspection calls
//! - **Interfaces**: the capabilities the core consumes from the rest of the
//!   kernel (memory, files, architecture primitives)
//!
//! # Usage
//!
//! ```rust
//! use sched_api::{Error, SchedPolicy};
//!
//! let policy = SchedPolicy::try_from(2).unwrap();
//! assert_eq!(policy, SchedPolicy::Bjf);
//! assert_eq!(SchedPolicy::try_from(9), Err(Error::InvalidPolicy(9)));
//! ```

#![no_std]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod error;
pub mod interfaces;
pub mod types;

// Re-export commonly used types
pub use crate::error::{Error, Result};
pub use crate::interfaces::{Arch, Files, Memory, Platform};
pub use crate::types::*;
