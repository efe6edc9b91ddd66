/*
 * codec.rs
 *
 * Handler identity <-> small integer.
 *
 * A raise only carries a u32 across the transfer, so every handler gets a
 * number the first time anybody asks for it. Numbers are handed out
 * sequentially from 1 by a process-wide registry; 0 stays reserved for
 * "nothing was raised". Identity is the static, not the name: two handlers
 * called "Overflow" are two different conditions.
 */

use core::fmt;
use core::num::NonZeroU32;
use std::sync::{Mutex, OnceLock, PoisonError};

use crate::report;

/// A named condition that protected scopes can catch.
///
/// Declare handlers as statics; their address-free identity is assigned
/// lazily and stays fixed for the life of the process.
///
/// ```
/// use raisetrace::Handler;
///
/// static OUT_OF_RANGE: Handler = Handler::new("OutOfRange");
///
/// assert_eq!(OUT_OF_RANGE.name(), "OutOfRange");
/// assert_eq!(raisetrace::codec::decode(OUT_OF_RANGE.id().get()), Some(&OUT_OF_RANGE));
/// ```
pub struct Handler {
    name: &'static str,
    action: Option<fn()>,
    id: OnceLock<HandlerId>,
}

impl Handler {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            action: None,
            id: OnceLock::new(),
        }
    }

    /// A handler that also runs `action` whenever a clause catches it,
    /// before the clause body.
    #[must_use]
    pub const fn with_action(name: &'static str, action: fn()) -> Self {
        Self {
            name,
            action: Some(action),
            id: OnceLock::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub(crate) fn action(&self) -> Option<fn()> {
        self.action
    }

    /// This handler's identity, registering it on first use.
    pub fn id(&'static self) -> HandlerId {
        *self.id.get_or_init(|| register(self))
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self, other)
    }
}

impl Eq for Handler {}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("id", &self.id.get())
            .finish()
    }
}

/// Encoded handler identity. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(NonZeroU32);

impl HandlerId {
    #[inline]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/* index i holds the handler with id i + 1 */
static REGISTRY: Mutex<Vec<&'static Handler>> = Mutex::new(Vec::new());

fn register(handler: &'static Handler) -> HandlerId {
    let mut table = REGISTRY.lock().unwrap_or_else(PoisonError::into_inner);
    let next = u32::try_from(table.len() + 1)
        .ok()
        .and_then(NonZeroU32::new)
        .unwrap_or_else(|| report::contract_violation("handler registry exhausted"));
    table.push(handler);
    log::trace!("registered handler \"{}\" as #{next}", handler.name);
    HandlerId(next)
}

/// Handler -> payload. Injective, never 0.
#[inline]
pub fn encode(handler: &'static Handler) -> u32 {
    handler.id().get()
}

/// Payload -> handler. `decode(0)` and numbers nobody was given are `None`.
pub fn decode(value: u32) -> Option<&'static Handler> {
    let index = usize::try_from(value).ok()?.checked_sub(1)?;
    let table = REGISTRY.lock().unwrap_or_else(PoisonError::into_inner);
    table.get(index).copied()
}

/// Number of handlers registered so far in this process.
pub fn registered() -> usize {
    REGISTRY
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .len()
}
