//! Error handling for the scheduling core

use core::fmt;

use crate::types::Pid;

/// Common error type used throughout the scheduling core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Every process slot is in use
    NoFreeSlot,
    /// Kernel stack or address space allocation failed
    OutOfMemory,
    /// No live process carries this pid
    NotFound(Pid),
    /// The caller has no children to wait for, or was killed while waiting
    NoChildren,
    /// Scheduling policy identifier outside the known set
    InvalidPolicy(i32),
    /// Invalid argument
    InvalidArgument(&'static str),
    /// The calling context is not bound to a process
    NoCurrentProcess,
    /// The caller was killed during an interruptible sleep
    Killed,
    /// A syscall argument could not be decoded or stored
    BadAddress,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoFreeSlot => write!(f, "Process table full"),
            Error::OutOfMemory => write!(f, "Out of memory"),
            Error::NotFound(pid) => write!(f, "No such process: {}", pid),
            Error::NoChildren => write!(f, "No children"),
            Error::InvalidPolicy(raw) => write!(f, "Invalid scheduling policy: {}", raw),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::NoCurrentProcess => write!(f, "No current process"),
            Error::Killed => write!(f, "Process killed"),
            Error::BadAddress => write!(f, "Bad address"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type for operations that can fail
pub type Result<T> = core::result::Result<T, Error>;

/// Create a not-found error for `pid`
pub fn not_found(pid: Pid) -> Error {
    Error::NotFound(pid)
}

/// Create an invalid argument error
pub fn invalid_argument(msg: &'static str) -> Error {
    Error::InvalidArgument(msg)
}

impl Error {
    /// Raw value returned across the syscall boundary
    pub const fn as_raw(&self) -> isize {
        -1
    }
}
