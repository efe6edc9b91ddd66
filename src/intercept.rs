/*
 * intercept.rs
 *
 * Fatal signals -> "SIGSEGV received" + diagnostic stack + _exit(signo).
 *
 * Deliberately separate from raise/catch: a signal is never catchable by a
 * protected scope, it only ever ends the process. The exit status is the
 * signal number so a supervisor can tell what killed us.
 *
 * Handler rules: no allocation, no locks, no logging. Output goes through
 * io::StderrWriter (raw write(2)). The diagnostic stack is read with
 * try_borrow, so a signal landing mid-push reports "unavailable" instead of
 * reading a half-updated Vec. SA_RESETHAND: if dumping faults, the second
 * signal takes the default action and the process dies anyway.
 */

use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::io::{self, StderrWriter};
use crate::signal::{Signal, signal_name};
use crate::{engine, report, resume, trace};

/* one live Runtime per process */
static INSTALLED: AtomicBool = AtomicBool::new(false);
/* atexit can't be undone, register at most once */
static ATEXIT_REGISTERED: AtomicBool = AtomicBool::new(false);

/// Live signal interception. Dropping it restores default dispositions and,
/// unless a protected scope is still active, tears down the calling thread's
/// stacks.
#[must_use = "dropping the runtime uninstalls the signal handlers"]
#[derive(Debug)]
pub struct Runtime {
    signals: Vec<Signal>,
    _not_send: PhantomData<*const ()>,
}

impl Runtime {
    /// Signals currently intercepted.
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        for &sig in &self.signals {
            restore_default(sig);
        }
        /* live protected scopes still own their frames */
        if resume::depth() == 0 {
            teardown();
        } else {
            log::debug!(
                "runtime dropped inside {} protected scope(s), stacks left alone",
                resume::depth()
            );
        }
        INSTALLED.store(false, Ordering::SeqCst);
        log::debug!("raisetrace runtime torn down");
    }
}

/// Install fatal-signal interception and (optionally) stack teardown at
/// process exit.
///
/// Only one runtime can be live at a time; a second call fails with
/// [`Error::AlreadyInitialized`] until the first is dropped. If any
/// `sigaction` fails, the ones already installed are rolled back.
pub fn init(config: &Config) -> Result<Runtime> {
    if let Some(&bad) = config.signals.iter().find(|s| !s.is_catchable()) {
        return Err(Error::UncatchableSignal(signal_name(bad)));
    }

    if INSTALLED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(Error::AlreadyInitialized);
    }

    if config.teardown_at_exit && !ATEXIT_REGISTERED.swap(true, Ordering::SeqCst) {
        // SAFETY: teardown_at_exit is an extern "C" fn with no arguments that
        // never unwinds. atexit only records the pointer.
        if unsafe { libc::atexit(teardown_at_exit) } != 0 {
            log::warn!("atexit registration failed; stacks won't be torn down at exit");
            ATEXIT_REGISTERED.store(false, Ordering::SeqCst);
        }
    }

    let mut installed: Vec<Signal> = Vec::with_capacity(config.signals.len());
    for &sig in &config.signals {
        if let Err(errno) = install_handler(sig) {
            for &done in &installed {
                restore_default(done);
            }
            INSTALLED.store(false, Ordering::SeqCst);
            return Err(Error::SignalInstall {
                signal: signal_name(sig),
                errno,
            });
        }
        installed.push(sig);
    }

    log::debug!(
        "raisetrace runtime installed for {} signal(s)",
        installed.len()
    );
    Ok(Runtime {
        signals: installed,
        _not_send: PhantomData,
    })
}

/// Drop everything on the calling thread's diagnostic and resumption stacks
/// and forget the failure context.
pub fn teardown() {
    trace::clear();
    resume::clear();
    engine::clear_context();
}

extern "C" fn teardown_at_exit() {
    teardown();
}

fn install_handler(sig: Signal) -> core::result::Result<(), i32> {
    // SAFETY: sigaction struct is zeroed then properly initialized.
    // fatal_signal_handler is an extern "C" fn with the sa_handler signature.
    // sigemptyset and sigaction are standard POSIX calls with valid args.
    // All ops share the invariant of installing one handler atomically.
    #[allow(clippy::multiple_unsafe_ops_per_block)]
    let rc = unsafe {
        let mut sa: libc::sigaction = core::mem::zeroed();
        sa.sa_sigaction = fatal_signal_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESETHAND;
        libc::sigemptyset(&raw mut sa.sa_mask);
        libc::sigaction(sig.as_raw(), &sa, core::ptr::null_mut())
    };
    if rc == 0 { Ok(()) } else { Err(io::last_errno()) }
}

fn restore_default(sig: Signal) {
    // SAFETY: SIG_DFL is the standard default handler, sigaction is safe with valid args.
    #[allow(clippy::multiple_unsafe_ops_per_block)]
    unsafe {
        let mut sa: libc::sigaction = core::mem::zeroed();
        sa.sa_sigaction = libc::SIG_DFL;
        sa.sa_flags = 0;
        libc::sigemptyset(&raw mut sa.sa_mask);
        libc::sigaction(sig.as_raw(), &sa, core::ptr::null_mut());
    }
}

extern "C" fn fatal_signal_handler(sig: libc::c_int) {
    let name = Signal::try_from_raw(sig).map_or("Unknown signal", signal_name);
    crate::sig_eprintln!("{name} received");

    let dumped = trace::with_frames_signal_safe(|frames| {
        let _ = report::write_trace(&mut StderrWriter, frames.iter().rev());
    });
    if !dumped {
        io::eprint_str("(diagnostic stack unavailable)\n\n");
    }

    // SAFETY: _exit is async-signal-safe and never returns. atexit handlers
    // are skipped on purpose: they'd touch the stacks we may be inside of.
    unsafe { libc::_exit(sig) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Handler;
    use crate::engine::protect;

    static SCOPED: Handler = Handler::new("scoped");

    /*
     * init() is process-wide, so everything that installs lives in one test
     * to keep the harness's parallel threads from racing on INSTALLED.
     */
    #[test]
    fn test_init_lifecycle() {
        let config = Config {
            signals: vec![Signal::SIGUSR1, Signal::SIGUSR2],
            teardown_at_exit: false,
        };
        let runtime = init(&config).expect("first init succeeds");
        assert_eq!(runtime.signals(), &[Signal::SIGUSR1, Signal::SIGUSR2]);

        assert_eq!(init(&config).unwrap_err(), Error::AlreadyInitialized);

        drop(runtime);
        let again = init(&config).expect("init works again after drop");
        drop(again);

        /* created and dropped inside a scope: the scope's frame survives */
        let out = protect(|| {
            crate::trace_scope!();
            let runtime = init(&config).expect("init inside a scope");
            drop(runtime);
            assert_eq!(resume::depth(), 1);
            assert_eq!(trace::depth(), 1);
            Ok(())
        })
        .except(&SCOPED, |_| Ok(()))
        .run();
        assert!(out.is_ok());
        assert_eq!(resume::depth(), 0);
        assert_eq!(trace::depth(), 0);
    }

    #[test]
    fn test_init_rejects_uncatchable_before_installing() {
        let config = Config {
            signals: vec![Signal::SIGKILL],
            teardown_at_exit: false,
        };
        assert_eq!(
            init(&config).unwrap_err(),
            Error::UncatchableSignal("SIGKILL")
        );
    }

    #[test]
    fn test_teardown_empties_stacks() {
        trace::enter_frame("t.rs", "t", 1);
        teardown();
        assert_eq!(trace::depth(), 0);
        assert!(engine::failure_context().is_none());
    }
}
