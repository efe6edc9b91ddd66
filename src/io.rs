/*
 * io.rs
 *
 * Raw stderr for the reporting paths.
 * direct writes to fd 2 via libc::write - no buffering, no locks, no heap.
 *
 * The signal handler formats through StderrWriter, so everything here has
 * to stay async-signal-safe. core::fmt padding doesn't allocate, which is
 * the only reason write! is usable from a handler at all.
 */

use core::fmt::{self, Write};

const STDERR: i32 = 2;

/// Write bytes to stderr, retrying short writes.
///
/// Errors are dropped: by the time we're here the process is usually on its
/// way out and there's nobody to tell.
pub fn write_stderr(mut s: &[u8]) {
    while !s.is_empty() {
        // SAFETY: s is a valid byte slice for s.len() bytes, fd 2 is either
        // open or write() fails with EBADF, which we treat as "give up".
        let n = unsafe { libc::write(STDERR, s.as_ptr().cast(), s.len()) };
        if n <= 0 {
            if n < 0 && last_errno() == libc::EINTR {
                continue;
            }
            return;
        }
        #[allow(clippy::cast_sign_loss)]
        let written = n as usize;
        s = &s[written.min(s.len())..];
    }
}

/// Write a string to stderr
#[inline]
pub fn eprint_str(s: &str) {
    write_stderr(s.as_bytes());
}

/// A writer that outputs to stderr via direct syscall.
/// Implements core::fmt::Write for use with write!/writeln! macros.
pub struct StderrWriter;

impl Write for StderrWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        write_stderr(s.as_bytes());
        Ok(())
    }
}

/* errno of the last failed libc call. Os errors don't allocate. */
#[inline]
pub(crate) fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Print to stderr (no newline), signal-safe
#[macro_export]
macro_rules! sig_eprint {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let _ = write!($crate::io::StderrWriter, $($arg)*);
    }};
}

/// Print to stderr with newline, signal-safe
#[macro_export]
macro_rules! sig_eprintln {
    () => {{
        $crate::io::write_stderr(b"\n");
    }};
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let _ = write!($crate::io::StderrWriter, $($arg)*);
        $crate::io::write_stderr(b"\n");
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_stderr() {
        /* just verify it doesn't crash */
        write_stderr(b"test stderr write\n");
        write_stderr(b"");
    }

    #[test]
    fn test_writer_fmt() {
        let mut w = StderrWriter;
        assert!(write!(w, "{:>15}:{:<7}{}\n", "io.rs", 1, "test").is_ok());
    }
}
