//! Process management
//!
//! - `table`: process control blocks and the fixed-capacity table
//! - `lifecycle`: creation, fork, exit, wait/waitx, kill
//! - `sleep`: blocking on channels, yielding, and the switch into the scheduler

mod lifecycle;
mod sleep;
pub mod table;

#[cfg(test)]
pub(crate) mod testing;

pub use table::{Proc, ProcTable};
