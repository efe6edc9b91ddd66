/*
 * error.rs
 *
 * Errors from setting the runtime up. Raised conditions are NOT errors here:
 * they travel as engine::Raised and either get caught or end the process.
 *
 * Exit status 1 for an unhandled condition is what the demo scripts and any
 * supervising process check. Don't change it.
 */

use thiserror::Error;

/// exit codes used when the runtime ends the process itself.
pub mod exit_codes {
    /// A raised condition reached the outermost scope unmatched
    pub const UNHANDLED: u8 = 1;
    /// raisetrace itself failed (bad config, sigaction refused)
    pub const INTERNAL_ERROR: u8 = 125;
}

/* everything init() and config parsing can report */
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid signal: {0}")]
    InvalidSignal(String),

    #[error("{0} cannot be intercepted")]
    UncatchableSignal(&'static str),

    #[error("failed to install handler for {signal}: errno {errno}")]
    SignalInstall { signal: &'static str, errno: i32 },

    #[error("exception runtime already initialized")]
    AlreadyInitialized,
}

impl Error {
    /* every setup failure is ours; none of them is a raised condition */
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidSignal(_)
            | Self::UncatchableSignal(_)
            | Self::SignalInstall { .. }
            | Self::AlreadyInitialized => exit_codes::INTERNAL_ERROR,
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
