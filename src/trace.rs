/*
 * trace.rs
 *
 * The diagnostic call stack. Purely for reports: nothing in the engine
 * decides anything based on what's in here, except that a resumed scope
 * puts the depth back to where it was when the scope was entered.
 *
 * One stack per thread. The signal handler reads it too, which is why
 * frames are plain Copy data with 'static strings and why the handler
 * only ever try_borrow()s.
 */

use core::cell::{Cell, RefCell};
use core::marker::PhantomData;

use crate::report;

/// One traced activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticFrame {
    pub file: &'static str,
    pub func: &'static str,
    pub line: u32,
}

thread_local! {
    static STACK: RefCell<Vec<DiagnosticFrame>> = const { RefCell::new(Vec::new()) };
    /* tokens of live TraceGuards, oldest first */
    static GUARDS: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
    static NEXT_TOKEN: Cell<u64> = const { Cell::new(0) };
}

/// Push a frame. Must be paired with exactly one [`exit_frame`].
///
/// Prefer [`enter`] or [`trace_scope!`](crate::trace_scope), which pair
/// themselves on every exit path.
pub fn enter_frame(file: &'static str, func: &'static str, line: u32) {
    STACK.with(|s| s.borrow_mut().push(DiagnosticFrame { file, func, line }));
}

/// Pop the innermost frame. Popping an empty stack aborts.
pub fn exit_frame() {
    let popped = STACK.with(|s| s.borrow_mut().pop());
    if popped.is_none() {
        report::contract_violation("diagnostic stack underflow");
    }
}

/// Push a frame and get a guard that pops it when dropped.
pub fn enter(file: &'static str, func: &'static str, line: u32) -> TraceGuard {
    let depth = STACK.with(|s| {
        let mut s = s.borrow_mut();
        s.push(DiagnosticFrame { file, func, line });
        s.len()
    });
    let token = NEXT_TOKEN.with(|n| {
        let t = n.get();
        n.set(t.wrapping_add(1));
        t
    });
    GUARDS.with(|g| g.borrow_mut().push(token));
    TraceGuard {
        depth,
        token,
        _not_send: PhantomData,
    }
}

/// Pops its frame on drop, including when a raise propagates through.
#[must_use = "the frame is popped as soon as the guard is dropped"]
#[derive(Debug)]
pub struct TraceGuard {
    /* stack length right after our push */
    depth: usize,
    token: u64,
    _not_send: PhantomData<*const ()>,
}

impl Drop for TraceGuard {
    fn drop(&mut self) {
        let tracked = GUARDS.with(|g| {
            let mut g = g.borrow_mut();
            match g.iter().rposition(|&t| t == self.token) {
                Some(at) if at + 1 == g.len() => {
                    g.pop();
                    Ok(true)
                }
                Some(_) => Err(()),
                None => Ok(false),
            }
        });
        match tracked {
            Ok(true) => {}
            /* forgotten by clear(): the stack under it is someone else's now */
            Ok(false) => return,
            Err(()) => report::contract_violation("diagnostic frame released out of order"),
        }

        let len = depth();
        if len == self.depth {
            STACK.with(|s| s.borrow_mut().pop());
        } else if len > self.depth {
            /* raw enter_frame()s above us that a raise skipped past */
            let leaked = truncate(self.depth - 1) - 1;
            log::warn!(
                "released {leaked} unpaired trace frame(s) above depth {}",
                self.depth
            );
        } else {
            /* already cut off by a resumed scope restoring its depth */
            log::trace!("trace frame at depth {} already released", self.depth);
        }
    }
}

/// Snapshot of the stack, innermost first.
pub fn dump() -> Vec<DiagnosticFrame> {
    STACK.with(|s| s.borrow().iter().rev().copied().collect())
}

/// Number of frames currently on this thread's stack.
pub fn depth() -> usize {
    STACK.with(|s| s.borrow().len())
}

/* drop frames above `depth`, returning how many went */
pub(crate) fn truncate(depth: usize) -> usize {
    STACK.with(|s| {
        let mut s = s.borrow_mut();
        let removed = s.len().saturating_sub(depth);
        s.truncate(depth);
        removed
    })
}

/* atexit/teardown. tolerates the thread-local already being gone. */
pub(crate) fn clear() {
    let _ = STACK.try_with(|s| {
        if let Ok(mut s) = s.try_borrow_mut() {
            s.clear();
            s.shrink_to_fit();
        }
    });
    let _ = GUARDS.try_with(|g| {
        if let Ok(mut g) = g.try_borrow_mut() {
            g.clear();
        }
    });
}

/*
 * Signal-handler access. No allocation, no panics: if the stack is mid-
 * push/pop when the signal lands (or the thread-local is torn down), the
 * closure isn't called and we return false.
 */
pub(crate) fn with_frames_signal_safe(f: impl FnOnce(&[DiagnosticFrame])) -> bool {
    STACK
        .try_with(|s| match s.try_borrow() {
            Ok(frames) => {
                f(&frames);
                true
            }
            Err(_) => false,
        })
        .unwrap_or(false)
}

#[doc(hidden)]
pub fn short_function_name(full: &'static str) -> &'static str {
    let mut name = full.strip_suffix("::__here").unwrap_or(full);
    while let Some(outer) = name.strip_suffix("::{{closure}}") {
        name = outer;
    }
    name.rsplit("::").next().unwrap_or(name)
}

/// Name of the enclosing function, e.g. `"parse_header"`.
#[macro_export]
macro_rules! function_name {
    () => {{
        fn __here() {}
        $crate::trace::short_function_name(::core::any::type_name_of_val(&__here))
    }};
}

/// Trace the current block: pushes a frame with this file, line and
/// function, popped at end of block on every exit path.
///
/// ```
/// fn load() {
///     raisetrace::trace_scope!();
///     assert_eq!(raisetrace::trace::dump()[0].func, "load");
/// }
/// load();
/// assert_eq!(raisetrace::trace::depth(), 0);
/// ```
#[macro_export]
macro_rules! trace_scope {
    () => {
        let _raisetrace_frame =
            $crate::trace::enter(file!(), $crate::function_name!(), line!());
    };
    ($func:expr) => {
        let _raisetrace_frame = $crate::trace::enter(file!(), $func, line!());
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf() -> Vec<DiagnosticFrame> {
        crate::trace_scope!();
        dump()
    }

    fn middle() -> Vec<DiagnosticFrame> {
        crate::trace_scope!();
        leaf()
    }

    #[test]
    fn test_dump_innermost_first() {
        let frames = middle();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].func, "leaf");
        assert_eq!(frames[1].func, "middle");
        assert!(frames[0].file.ends_with("trace.rs"));
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_guard_pops_on_early_return() {
        fn bails(fail: bool) -> Result<(), ()> {
            crate::trace_scope!();
            if fail {
                return Err(());
            }
            Ok(())
        }
        assert!(bails(true).is_err());
        assert!(bails(false).is_ok());
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_raw_pairing() {
        enter_frame("a.rs", "a", 1);
        enter_frame("b.rs", "b", 2);
        assert_eq!(
            dump(),
            vec![
                DiagnosticFrame { file: "b.rs", func: "b", line: 2 },
                DiagnosticFrame { file: "a.rs", func: "a", line: 1 },
            ]
        );
        exit_frame();
        exit_frame();
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_truncate_then_guard_drop_is_noop() {
        let guard = enter("t.rs", "t", 1);
        assert_eq!(truncate(0), 1);
        drop(guard);
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_guard_releases_unpaired_raw_frames() {
        let guard = enter("g.rs", "guarded", 1);
        enter_frame("r.rs", "raw", 2);
        enter_frame("r.rs", "raw", 3);
        drop(guard);
        assert_eq!(depth(), 0);

        /* the next guard starts from a clean slate */
        let again = enter("g.rs", "guarded", 4);
        assert_eq!(depth(), 1);
        drop(again);
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_clear_forgets_live_guards() {
        let guard = enter("c.rs", "cleared", 1);
        clear();
        let fresh = enter("c.rs", "fresh", 2);
        drop(guard);
        assert_eq!(depth(), 1);
        drop(fresh);
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_dump_is_non_destructive() {
        let _g = enter("x.rs", "x", 9);
        assert_eq!(dump(), dump());
        assert_eq!(depth(), 1);
    }

    #[test]
    fn test_signal_safe_reader() {
        let _g = enter("s.rs", "s", 3);
        let mut seen = 0;
        assert!(with_frames_signal_safe(|f| seen = f.len()));
        assert_eq!(seen, 1);
    }

    #[test]
    fn test_short_function_name() {
        assert_eq!(short_function_name("krate::m::load::__here"), "load");
        assert_eq!(
            short_function_name("krate::run::{{closure}}::{{closure}}::__here"),
            "run"
        );
        assert_eq!(short_function_name("main"), "main");
    }

    #[test]
    fn test_function_name_in_closure() {
        let name = (|| crate::function_name!())();
        assert_eq!(name, "test_function_name_in_closure");
    }
}
