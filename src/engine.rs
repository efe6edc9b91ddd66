/*
 * engine.rs
 *
 * raise / protected scope / dispatch / re-raise.
 *
 * A raise builds a Raised carrying the encoded handler id and the caller
 * returns it with `?` (the raise! macro does the `return Err(..)`). Every
 * activation between the raise and the nearest protected scope is left
 * through its ordinary return path, so drop glue runs and trace guards pop.
 *
 * Each protected scope is a dispatch boundary:
 *
 *   Entered --body Ok--------------------------> Completed (frame popped)
 *   Entered --body Err, clause matches---------> Matched   (frame popped, clause runs)
 *   Entered --body Err, nothing matches--------> Propagated (frame popped, re-raised)
 *
 * A raise or re-raise that finds no frame left is the only way out of the
 * engine: report and exit(1).
 *
 * Not thread-safe and doesn't need to be: all state is per thread and
 * Raised is !Send, so a condition can't leave the thread that raised it.
 */

use core::cell::RefCell;
use core::fmt;
use core::marker::PhantomData;

use crate::codec::{self, Handler, HandlerId};
use crate::trace::{self, DiagnosticFrame};
use crate::{report, resume};

/// Where a raise happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub file: &'static str,
    pub line: u32,
    pub func: &'static str,
}

impl Origin {
    #[must_use]
    pub const fn new(file: &'static str, line: u32, func: &'static str) -> Self {
        Self { file, line, func }
    }
}

/// The last raise that carried origin information on this thread.
///
/// Re-raises never touch it, so if a condition ends up unhandled the report
/// names the place it was first raised and shows the diagnostic stack as it
/// was at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureContext {
    pub handler: &'static str,
    pub origin: Option<Origin>,
    /// diagnostic stack at the raise site, innermost first
    pub trace: Vec<DiagnosticFrame>,
}

thread_local! {
    static CONTEXT: RefCell<Option<FailureContext>> = const { RefCell::new(None) };
}

/// Copy of the current failure context, if anything was raised yet.
pub fn failure_context() -> Option<FailureContext> {
    CONTEXT.with(|c| c.borrow().clone())
}

pub(crate) fn clear_context() {
    let _ = CONTEXT.try_with(|c| {
        if let Ok(mut c) = c.try_borrow_mut() {
            *c = None;
        }
    });
}

/// A condition on its way to the nearest protected scope.
///
/// Return it with `?` (or let [`raise!`](crate::raise) do it). Dropping one
/// silently swallows the condition, hence `must_use`.
#[must_use = "a raised condition must be returned to reach its handler"]
#[derive(Clone, PartialEq, Eq)]
pub struct Raised {
    id: HandlerId,
    _not_send: PhantomData<*const ()>,
}

impl Raised {
    /// Encoded identity carried by the transfer.
    #[inline]
    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Decode the payload back into the handler that was raised.
    pub fn handler(&self) -> &'static Handler {
        codec::decode(self.id.get())
            .unwrap_or_else(|| report::contract_violation("raised payload does not decode"))
    }

    /// Is this the given condition?
    pub fn is(&self, handler: &'static Handler) -> bool {
        self.id == handler.id()
    }
}

impl fmt::Debug for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raised")
            .field("id", &self.id)
            .field("handler", &self.handler().name())
            .finish()
    }
}

impl fmt::Display for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "condition \"{}\" raised", self.handler().name())
    }
}

impl std::error::Error for Raised {}

/// Raise `handler` towards the innermost protected scope.
///
/// With an origin, the failure context is overwritten with the handler's
/// name, the origin and a snapshot of the diagnostic stack. Without one the
/// context still names this handler, with the origin left unknown.
///
/// If no protected scope is active this does not return: the unhandled
/// report is printed and the process exits with status 1.
pub fn raise(handler: &'static Handler, origin: Option<Origin>) -> Raised {
    let id = handler.id();
    let context = FailureContext {
        handler: handler.name(),
        origin,
        trace: trace::dump(),
    };
    /* overwritten even without an origin, so a stale name is never reported */
    CONTEXT.with(|c| *c.borrow_mut() = Some(context));
    match origin {
        Some(o) => log::debug!("raise \"{}\" at {}:{} in {}", handler.name(), o.file, o.line, o.func),
        None => log::debug!("raise \"{}\"", handler.name()),
    }
    propagate(id)
}

/* internal re-raise: same identity, failure context left alone */
fn reraise(raised: Raised) -> Raised {
    propagate(raised.id)
}

fn propagate(id: HandlerId) -> Raised {
    if resume::depth() == 0 {
        let context = failure_context().unwrap_or_else(|| FailureContext {
            handler: codec::decode(id.get()).map_or("<unknown>", Handler::name),
            origin: None,
            trace: trace::dump(),
        });
        report::unhandled(&context);
    }
    Raised {
        id,
        _not_send: PhantomData,
    }
}

/// What a matching clause gets to see.
#[derive(Debug, Clone, Copy)]
pub struct Caught {
    pub handler: &'static Handler,
    /// origin of the original raise, if it had one
    pub origin: Option<Origin>,
}

impl Caught {
    #[inline]
    pub fn name(&self) -> &'static str {
        self.handler.name()
    }
}

type Body<'a, T> = Box<dyn FnOnce() -> Result<T, Raised> + 'a>;
type ClauseBody<'a, T> = Box<dyn FnOnce(Caught) -> Result<T, Raised> + 'a>;

struct Clause<'a, T> {
    handler: &'static Handler,
    body: ClauseBody<'a, T>,
}

/// A protected scope under construction. See [`protect`].
#[must_use = "a protected scope does nothing until run() is called"]
pub struct Protected<'a, T> {
    body: Body<'a, T>,
    clauses: Vec<Clause<'a, T>>,
}

/// Start a protected scope around `body`.
///
/// Clauses are tried in the order they're added; the first one whose
/// handler matches the raised condition runs. Anything unmatched goes on to
/// the next enclosing scope unchanged.
///
/// ```
/// use raisetrace::{Handler, protect, raise};
///
/// static NOT_FOUND: Handler = Handler::new("NotFound");
///
/// fn lookup(key: &str) -> Result<u32, raisetrace::Raised> {
///     if key != "answer" {
///         raise!(NOT_FOUND);
///     }
///     Ok(42)
/// }
///
/// let value = protect(|| lookup("question"))
///     .except(&NOT_FOUND, |_| Ok(0))
///     .run()
///     .unwrap();
/// assert_eq!(value, 0);
/// ```
pub fn protect<'a, T>(body: impl FnOnce() -> Result<T, Raised> + 'a) -> Protected<'a, T> {
    Protected {
        body: Box::new(body),
        clauses: Vec::new(),
    }
}

impl<'a, T> Protected<'a, T> {
    /// Add a clause for `handler`.
    ///
    /// The same handler twice in one scope is a mistake; it's logged and the
    /// first clause keeps winning.
    pub fn except(
        mut self,
        handler: &'static Handler,
        clause: impl FnOnce(Caught) -> Result<T, Raised> + 'a,
    ) -> Self {
        if self.clauses.iter().any(|c| c.handler == handler) {
            log::warn!(
                "handler \"{}\" listed twice in one protected scope; later clause is unreachable",
                handler.name()
            );
        }
        self.clauses.push(Clause {
            handler,
            body: Box::new(clause),
        });
        self
    }

    /// Enter the scope: run the body, dispatch anything it raises.
    pub fn run(self) -> Result<T, Raised> {
        let Self { body, clauses } = self;

        let frame = resume::push();
        let depth = frame.depth();
        log::trace!("protected scope entered at depth {depth}");

        let raised = match body() {
            Ok(value) => {
                frame.pop();
                log::trace!("protected scope at depth {depth} completed");
                return Ok(value);
            }
            Err(raised) => raised,
        };

        frame.resume();
        let handler = raised.handler();
        let id = raised.id();

        match clauses.into_iter().find(|c| c.handler.id() == id) {
            Some(clause) => {
                frame.pop();
                log::debug!("\"{}\" caught at depth {depth}", handler.name());
                if let Some(action) = handler.action() {
                    action();
                }
                let origin = failure_context().and_then(|c| c.origin);
                (clause.body)(Caught { handler, origin })
            }
            None => {
                frame.pop();
                log::debug!("\"{}\" not handled at depth {depth}, propagating", handler.name());
                Err(reraise(raised))
            }
        }
    }
}

/// Origin of the macro call site: file, line, enclosing function.
#[macro_export]
macro_rules! origin {
    () => {
        $crate::engine::Origin::new(file!(), line!(), $crate::function_name!())
    };
}

/// Raise a handler static from here and return from the enclosing function.
///
/// The function must return `Result<_, E>` with `E: From<Raised>`.
#[macro_export]
macro_rules! raise {
    ($handler:expr) => {
        return ::core::result::Result::Err(::core::convert::From::from(
            $crate::engine::raise(&$handler, ::core::option::Option::Some($crate::origin!())),
        ))
    };
}
