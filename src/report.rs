/*
 * report.rs
 *
 * The end of the line. Unhandled conditions and broken engine bookkeeping
 * come here; neither returns.
 *
 * Formatting is split out over core::fmt::Write so the exact text can be
 * unit tested into a String and the signal path can reuse write_trace()
 * against the raw stderr writer without allocating.
 */

use core::fmt::{self, Write};

use crate::engine::FailureContext;
use crate::error::exit_codes;
use crate::io::StderrWriter;
use crate::trace::DiagnosticFrame;

const RULE: &str = "-----------------------------------";
const COLUMNS: &str = "      file name:line   func name";

/// Header and one line per frame, in the order given (callers pass
/// innermost first), then a blank line.
pub fn write_trace<'f, W, I>(w: &mut W, frames: I) -> fmt::Result
where
    W: Write,
    I: IntoIterator<Item = &'f DiagnosticFrame>,
{
    writeln!(w, "{RULE}")?;
    writeln!(w, "{COLUMNS}")?;
    writeln!(w, "{RULE}")?;
    for frame in frames {
        writeln!(w, "{:>15}:{:<7}{}", frame.file, frame.line, frame.func)?;
    }
    writeln!(w)
}

/// The full unhandled-condition report.
pub fn write_report<W: Write>(w: &mut W, context: &FailureContext) -> fmt::Result {
    match context.origin {
        Some(origin) => writeln!(
            w,
            "Unhandled Exception: \"{}\" from {}:{}",
            context.handler, origin.file, origin.line
        )?,
        None => writeln!(
            w,
            "Unhandled Exception: \"{}\" from <unknown>",
            context.handler
        )?,
    }
    write_trace(w, &context.trace)
}

/// Print the report for a condition nobody caught and exit with status 1.
///
/// `exit` (not `_exit`) so the atexit teardown registered by `init` runs.
pub(crate) fn unhandled(context: &FailureContext) -> ! {
    log::debug!("\"{}\" reached the outermost scope", context.handler);
    let _ = write_report(&mut StderrWriter, context);
    std::process::exit(i32::from(exit_codes::UNHANDLED))
}

/// The engine's own bookkeeping is wrong. Say what and abort on the spot:
/// nothing that relies on the stacks can be trusted any more.
#[cold]
pub(crate) fn contract_violation(what: &str) -> ! {
    crate::sig_eprintln!("internal error: {what}");
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Origin;

    fn frame(file: &'static str, func: &'static str, line: u32) -> DiagnosticFrame {
        DiagnosticFrame { file, func, line }
    }

    #[test]
    fn test_report_format() {
        let ctx = FailureContext {
            handler: "handler3",
            origin: Some(Origin::new("etest.rs", 33, "func4")),
            trace: vec![frame("etest.rs", "func4", 30), frame("etest.rs", "main", 101)],
        };
        let mut out = String::new();
        write_report(&mut out, &ctx).unwrap();

        let expected = "Unhandled Exception: \"handler3\" from etest.rs:33\n\
                        -----------------------------------\n      \
                        file name:line   func name\n\
                        -----------------------------------\n       \
                        etest.rs:30     func4\n       \
                        etest.rs:101    main\n\
                        \n";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_report_without_origin() {
        let ctx = FailureContext {
            handler: "Quiet",
            origin: None,
            trace: Vec::new(),
        };
        let mut out = String::new();
        write_report(&mut out, &ctx).unwrap();
        assert!(out.starts_with("Unhandled Exception: \"Quiet\" from <unknown>\n"));
        assert_eq!(out.lines().count(), 5);
    }

    #[test]
    fn test_long_file_names_not_truncated() {
        let frames = [frame("a/very/long/path/to/module.rs", "f", 1)];
        let mut out = String::new();
        write_trace(&mut out, &frames).unwrap();
        assert!(out.contains("a/very/long/path/to/module.rs:1      f\n"));
    }
}
