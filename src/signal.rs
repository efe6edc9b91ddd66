/*
 * signal.rs
 *
 * Which signals count as fatal, and how to name them.
 *
 * Parse "SEGV", "SIGSEGV", "segv", "11". Reject "SIGFOO", "999". "IOT" is
 * an alias for ABRT. KILL and STOP parse fine but can't be intercepted, so
 * the list parser refuses them instead of letting sigaction fail later.
 *
 * Only the signals whose default action terminates the process are here.
 * Job control and SIGCHLD/SIGWINCH are not crashes.
 */

use crate::error::{Error, Result};

/* POSIX signals as i32 values from libc. */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Signal {
    SIGHUP = libc::SIGHUP,
    SIGINT = libc::SIGINT,
    SIGQUIT = libc::SIGQUIT,
    SIGILL = libc::SIGILL,
    SIGTRAP = libc::SIGTRAP,
    SIGABRT = libc::SIGABRT,
    SIGBUS = libc::SIGBUS,
    SIGFPE = libc::SIGFPE,
    SIGKILL = libc::SIGKILL,
    SIGUSR1 = libc::SIGUSR1,
    SIGSEGV = libc::SIGSEGV,
    SIGUSR2 = libc::SIGUSR2,
    SIGPIPE = libc::SIGPIPE,
    SIGALRM = libc::SIGALRM,
    SIGTERM = libc::SIGTERM,
    SIGSTOP = libc::SIGSTOP,
    SIGXCPU = libc::SIGXCPU,
    SIGXFSZ = libc::SIGXFSZ,
    SIGSYS = libc::SIGSYS,
}

/* name without the SIG prefix, used for parsing */
const TABLE: [(Signal, &str); 19] = [
    (Signal::SIGHUP, "HUP"),
    (Signal::SIGINT, "INT"),
    (Signal::SIGQUIT, "QUIT"),
    (Signal::SIGILL, "ILL"),
    (Signal::SIGTRAP, "TRAP"),
    (Signal::SIGABRT, "ABRT"),
    (Signal::SIGBUS, "BUS"),
    (Signal::SIGFPE, "FPE"),
    (Signal::SIGKILL, "KILL"),
    (Signal::SIGUSR1, "USR1"),
    (Signal::SIGSEGV, "SEGV"),
    (Signal::SIGUSR2, "USR2"),
    (Signal::SIGPIPE, "PIPE"),
    (Signal::SIGALRM, "ALRM"),
    (Signal::SIGTERM, "TERM"),
    (Signal::SIGSTOP, "STOP"),
    (Signal::SIGXCPU, "XCPU"),
    (Signal::SIGXFSZ, "XFSZ"),
    (Signal::SIGSYS, "SYS"),
];

/// The set intercepted when nothing else is configured: hang-up, interrupt,
/// quit, illegal instruction, trap, abort and segmentation fault.
pub const DEFAULT_SIGNALS: [Signal; 7] = [
    Signal::SIGHUP,
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGILL,
    Signal::SIGTRAP,
    Signal::SIGABRT,
    Signal::SIGSEGV,
];

impl Signal {
    /* convert from raw signal number */
    pub fn try_from_raw(num: i32) -> Option<Self> {
        TABLE
            .iter()
            .find(|(sig, _)| sig.as_raw() == num)
            .map(|(sig, _)| *sig)
    }

    /* get raw signal number */
    #[inline]
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// SIGKILL and SIGSTOP can never have a handler.
    #[inline]
    pub const fn is_catchable(self) -> bool {
        !matches!(self, Self::SIGKILL | Self::SIGSTOP)
    }
}

/// Parse "SEGV", "SIGINT", "11", "hup" - all the ways to name a signal.
///
/// # Examples
///
/// ```
/// use raisetrace::signal::{parse_signal, Signal};
///
/// assert_eq!(parse_signal("SEGV").unwrap(), Signal::SIGSEGV);
/// assert_eq!(parse_signal("sigint").unwrap(), Signal::SIGINT);
/// assert_eq!(parse_signal("IOT").unwrap(), Signal::SIGABRT);
/// assert_eq!(parse_signal("15").unwrap(), Signal::SIGTERM);
/// ```
pub fn parse_signal(input: &str) -> Result<Signal> {
    let input = input.trim();

    if let Ok(num) = input.parse::<i32>() {
        return Signal::try_from_raw(num)
            .ok_or_else(|| Error::InvalidSignal(format!("invalid signal number: {num}")));
    }

    /* optional SIG prefix, any case */
    let name = match input.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("SIG") => &input[3..],
        _ => input,
    };

    if name.eq_ignore_ascii_case("IOT") {
        return Ok(Signal::SIGABRT);
    }

    TABLE
        .iter()
        .find(|(_, short)| name.eq_ignore_ascii_case(short))
        .map(|(sig, _)| *sig)
        .ok_or_else(|| Error::InvalidSignal(format!("unknown signal: {input}")))
}

/// Parse a comma-separated list for interception, e.g. `"INT, TERM, 11"`.
///
/// Empty input means "intercept nothing". Duplicates collapse to the first
/// occurrence. KILL and STOP are rejected.
pub fn parse_signal_list(input: &str) -> Result<Vec<Signal>> {
    let mut out: Vec<Signal> = Vec::new();
    for part in input.split(',') {
        if part.trim().is_empty() {
            continue;
        }
        let sig = parse_signal(part)?;
        if !sig.is_catchable() {
            return Err(Error::UncatchableSignal(signal_name(sig)));
        }
        if !out.contains(&sig) {
            out.push(sig);
        }
    }
    Ok(out)
}

/* human-readable name for reports */
#[must_use]
pub const fn signal_name(signal: Signal) -> &'static str {
    match signal {
        Signal::SIGHUP => "SIGHUP",
        Signal::SIGINT => "SIGINT",
        Signal::SIGQUIT => "SIGQUIT",
        Signal::SIGILL => "SIGILL",
        Signal::SIGTRAP => "SIGTRAP",
        Signal::SIGABRT => "SIGABRT",
        Signal::SIGBUS => "SIGBUS",
        Signal::SIGFPE => "SIGFPE",
        Signal::SIGKILL => "SIGKILL",
        Signal::SIGUSR1 => "SIGUSR1",
        Signal::SIGSEGV => "SIGSEGV",
        Signal::SIGUSR2 => "SIGUSR2",
        Signal::SIGPIPE => "SIGPIPE",
        Signal::SIGALRM => "SIGALRM",
        Signal::SIGTERM => "SIGTERM",
        Signal::SIGSTOP => "SIGSTOP",
        Signal::SIGXCPU => "SIGXCPU",
        Signal::SIGXFSZ => "SIGXFSZ",
        Signal::SIGSYS => "SIGSYS",
    }
}
