//! Foundation crate for drsnap: the shared error type, console output macros
//! and the retrying external command executor every provider call goes through.

pub mod command;
pub mod error;
pub mod output_macros;

// When the `test-helpers` feature is enabled, include the scripted runner.
#[cfg(any(test, feature = "test-helpers"))]
pub mod scripted;

pub use command::{
    CommandExecutor, CommandResult, CommandRunner, CommandSpec, ProcessRunner, RetryPolicy,
    ABNORMAL_EXIT_CODE,
};
pub use error::{Result, SnapError};

/// Calculate a concurrency limit from the available CPU count, between 2 and 8.
pub fn optimal_concurrency() -> usize {
    num_cpus::get().clamp(2, 8)
}
