/*
 * resume.rs
 *
 * Stack of resumption points, one per protected scope that's currently
 * running, innermost on top. A raise always targets the top.
 *
 * There's no saved register context: the transfer itself is a Raised value
 * travelling up through `?`. What a frame does save is the diagnostic stack
 * depth at scope entry, so a resumed scope can put the trace back exactly
 * where it was even if something in between leaked a raw enter_frame().
 *
 * Frames are popped by dropping the handle, so fall-through, match and
 * re-raise all release them. Nothing outside the engine touches this.
 */

use core::cell::RefCell;
use core::marker::PhantomData;

use crate::{report, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResumptionFrame {
    trace_depth: usize,
}

thread_local! {
    static FRAMES: RefCell<Vec<ResumptionFrame>> = const { RefCell::new(Vec::new()) };
}

/// Live resumption frames on this thread, i.e. protected scopes entered and
/// not yet left.
pub fn depth() -> usize {
    FRAMES.with(|f| f.borrow().len())
}

/* push a frame above the current top */
pub(crate) fn push() -> FrameHandle {
    let frame = ResumptionFrame {
        trace_depth: trace::depth(),
    };
    let depth = FRAMES.with(|f| {
        let mut f = f.borrow_mut();
        f.push(frame);
        f.len()
    });
    FrameHandle {
        depth,
        frame,
        _not_send: PhantomData,
    }
}

/* what pop() found wrong, reported after the borrow is released */
enum PopFault {
    Underflow,
    NotTop,
}

fn pop(expected_depth: usize) {
    let fault = FRAMES.with(|f| {
        let mut f = f.borrow_mut();
        match f.len() {
            0 => Some(PopFault::Underflow),
            len if len != expected_depth => Some(PopFault::NotTop),
            _ => {
                f.pop();
                None
            }
        }
    });
    match fault {
        Some(PopFault::Underflow) => report::contract_violation("resumption stack underflow"),
        Some(PopFault::NotTop) => {
            report::contract_violation("resumption frame popped while not on top")
        }
        None => {}
    }
}

/// Owning handle to a pushed frame. Dropping it pops the frame.
#[derive(Debug)]
pub(crate) struct FrameHandle {
    depth: usize,
    frame: ResumptionFrame,
    _not_send: PhantomData<*const ()>,
}

impl FrameHandle {
    /// Restore the context saved at push time. Returns how many leaked
    /// diagnostic frames had to be cut off.
    pub(crate) fn resume(&self) -> usize {
        let cut = trace::truncate(self.frame.trace_depth);
        if cut > 0 {
            log::warn!(
                "resumed scope at depth {} dropped {cut} unpaired trace frame(s)",
                self.depth
            );
        }
        cut
    }

    #[inline]
    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    /// Pop now. Same as dropping, but reads better at the call site.
    #[inline]
    pub(crate) fn pop(self) {}
}

impl Drop for FrameHandle {
    fn drop(&mut self) {
        pop(self.depth);
    }
}

pub(crate) fn clear() {
    let _ = FRAMES.try_with(|f| {
        if let Ok(mut f) = f.try_borrow_mut() {
            f.clear();
            f.shrink_to_fit();
        }
    });
}
