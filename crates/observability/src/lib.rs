//! Process-wide tracing setup shared by the binaries and tests.

pub mod subscriber;

pub use subscriber::{LogFormat, LogSettings};

/// Install the subscriber described by the environment.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    subscriber::install(&LogSettings::from_env());
}
