//! Hosted platform: runs the kernel on OS threads
//!
//! Used by the integration tests and the demo programs.

pub mod logger;
mod machine;
mod platform;

pub use machine::{DEFAULT_TIMEOUT, HostedKernel, Machine, MachineBuilder, Sys};
pub use platform::{
    HostedDir, HostedFile, HostedPlatform, HostedSpace, HostedStack, MAX_SPACE_SIZE,
    PlatformStats, ROOT_IMAGE_SIZE,
};
