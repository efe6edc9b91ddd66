/*
 * config.rs
 *
 * What init() installs. Defaults match the classic crash set; the
 * RAISETRACE_SIGNALS env var overrides it without a rebuild:
 *
 *   RAISETRACE_SIGNALS="INT,TERM,11"   intercept exactly these
 *   RAISETRACE_SIGNALS=""              intercept nothing
 *   (unset)                            DEFAULT_SIGNALS
 */

use crate::error::{Error, Result};
use crate::signal::{DEFAULT_SIGNALS, Signal, parse_signal_list, signal_name};

/// Environment variable read by [`Config::from_env`].
pub const SIGNALS_ENV: &str = "RAISETRACE_SIGNALS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Signals that produce a diagnostic dump and exit with their number.
    pub signals: Vec<Signal>,
    /// Clear both stacks from an atexit hook.
    pub teardown_at_exit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signals: DEFAULT_SIGNALS.to_vec(),
            teardown_at_exit: true,
        }
    }
}

impl Config {
    /// Defaults, then `RAISETRACE_SIGNALS` if it's set.
    pub fn from_env() -> Result<Self> {
        Self::from_env_value(std::env::var(SIGNALS_ENV).ok().as_deref())
    }

    /// Same as [`from_env`](Self::from_env) with the variable's value passed
    /// in, for callers that already read it (and for tests).
    pub fn from_env_value(value: Option<&str>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(list) = value {
            config.signals = parse_signal_list(list)?;
            log::debug!("{SIGNALS_ENV}={list:?} -> {} signal(s)", config.signals.len());
        }
        Ok(config)
    }

    /// Replace the signal set. KILL and STOP are refused.
    pub fn with_signals(mut self, signals: &[Signal]) -> Result<Self> {
        if let Some(&bad) = signals.iter().find(|s| !s.is_catchable()) {
            return Err(Error::UncatchableSignal(signal_name(bad)));
        }
        self.signals = signals.to_vec();
        Ok(self)
    }
}
