//! User-space side of the hosted scheduler kernel
//!
//! Programs here run as processes of a [`sched_kernel::hosted::Machine`]
//! and talk to the kernel only through [`sched_kernel::hosted::Sys`].

pub mod ps;
pub mod report;
pub mod workload;

pub use ps::format_table;
pub use report::{PolicyRun, Summary};
