/*
 * lib.rs
 *
 * Named conditions, protected scopes, and a call-stack dump when nothing
 * catches them or a fatal signal arrives.
 *
 * Everything is per thread and single-threaded by construction: guards,
 * Raised and Runtime are !Send.
 */

//! # raisetrace
//!
//! Raise a named condition anywhere; the nearest enclosing protected scope
//! with a matching clause handles it. Anything that reaches the outermost
//! scope unmatched prints a diagnostic call stack and exits with status 1.
//! Fatal signals print the same stack and exit with the signal number.
//!
//! ## Quick Start
//!
//! ```rust
//! use raisetrace::{Handler, Raised, protect, raise, trace_scope};
//!
//! static DISK_FULL: Handler = Handler::new("DiskFull");
//! static BAD_INPUT: Handler = Handler::new("BadInput");
//!
//! fn save(bytes: usize) -> Result<(), Raised> {
//!     trace_scope!();
//!     if bytes > 1024 {
//!         raise!(DISK_FULL);
//!     }
//!     Ok(())
//! }
//!
//! let outcome = protect(|| save(4096).map(|()| "saved"))
//!     .except(&BAD_INPUT, |_| Ok("rejected"))
//!     .except(&DISK_FULL, |caught| {
//!         assert_eq!(caught.name(), "DiskFull");
//!         Ok("retry later")
//!     })
//!     .run()
//!     .unwrap();
//! assert_eq!(outcome, "retry later");
//! ```
//!
//! Install crash reporting once near the top of `main`:
//!
//! ```rust,no_run
//! let _runtime = raisetrace::init(&raisetrace::Config::from_env()?)?;
//! # Ok::<(), raisetrace::Error>(())
//! ```

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod intercept;
pub mod io;
pub mod report;
pub mod resume;
pub mod signal;
pub mod trace;

pub use codec::{Handler, HandlerId};
pub use config::Config;
pub use engine::{Caught, FailureContext, Origin, Protected, Raised, failure_context, protect};
pub use error::{Error, Result, exit_codes};
pub use intercept::{Runtime, init, teardown};
pub use signal::{Signal, parse_signal, signal_name};
pub use trace::DiagnosticFrame;
