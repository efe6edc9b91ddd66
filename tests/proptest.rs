/*
 * proptest.rs
 *
 * property-based tests for the engine and the parsers.
 * random nesting shapes, random clause sets, random raise points.
 */

use proptest::prelude::*;
use std::cell::Cell;
use std::collections::BTreeSet;

use raisetrace::codec::{decode, encode};
use raisetrace::engine::{Origin, raise};
use raisetrace::signal::{Signal, parse_signal, signal_name};
use raisetrace::{Handler, Raised, failure_context, protect, resume, trace};

static POOL: [Handler; 6] = [
    Handler::new("P0"),
    Handler::new("P1"),
    Handler::new("P2"),
    Handler::new("P3"),
    Handler::new("P4"),
    Handler::new("P5"),
];

const RAISE_ORIGIN: Origin = Origin::new("proptest.rs", 7, "nest");

/* sentinel for "only the catch-all outermost scope saw it" */
const OUTERMOST: usize = usize::MAX;

/*
 * levels[0] is the outermost scope, levels.last() the innermost. The raise
 * happens inside the innermost scope's body.
 */
fn nest(
    levels: &[BTreeSet<usize>],
    level: usize,
    raised: usize,
    caught_at: &Cell<Option<usize>>,
) -> Result<(), Raised> {
    if level == levels.len() {
        trace::enter_frame("proptest.rs", "leaf", 1);
        let r = raise(&POOL[raised], Some(RAISE_ORIGIN));
        /* deliberately left unpaired: the catching scope restores depth */
        return Err(r);
    }

    let mut scope = protect(move || nest(levels, level + 1, raised, caught_at));
    for &h in &levels[level] {
        scope = scope.except(&POOL[h], move |_| {
            caught_at.set(Some(level));
            Ok(())
        });
    }
    scope.run()
}

fn run_nested(levels: &[BTreeSet<usize>], raised: usize) -> Option<usize> {
    let caught_at = Cell::new(None);
    let mut outer = protect(|| nest(levels, 0, raised, &caught_at));
    for h in &POOL {
        outer = outer.except(h, |_| {
            caught_at.set(Some(OUTERMOST));
            Ok(())
        });
    }
    outer.run().expect("catch-all scope handles everything");
    caught_at.get()
}

fn clause_sets() -> impl Strategy<Value = Vec<BTreeSet<usize>>> {
    prop::collection::vec(prop::collection::btree_set(0usize..POOL.len(), 0..4), 1..10)
}

/* ============================================================================
 * Propagation Properties
 * ============================================================================ */

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /* caught by exactly the nearest enclosing scope that lists it */
    #[test]
    fn nearest_matching_scope_catches(levels in clause_sets(), raised in 0usize..POOL.len()) {
        let expected = levels
            .iter()
            .rposition(|set| set.contains(&raised))
            .unwrap_or(OUTERMOST);
        prop_assert_eq!(run_nested(&levels, raised), Some(expected));
    }

    /* whatever happened, both stacks are back to empty */
    #[test]
    fn stacks_balance_after_dispatch(levels in clause_sets(), raised in 0usize..POOL.len()) {
        let _ = run_nested(&levels, raised);
        prop_assert_eq!(resume::depth(), 0);
        prop_assert_eq!(trace::depth(), 0);
    }

    /* re-raises through any number of scopes never rewrite the origin */
    #[test]
    fn reraise_preserves_origin(levels in clause_sets(), raised in 0usize..POOL.len()) {
        let _ = run_nested(&levels, raised);
        let ctx = failure_context().expect("raise recorded context");
        prop_assert_eq!(ctx.handler, POOL[raised].name());
        prop_assert_eq!(ctx.origin, Some(RAISE_ORIGIN));
        prop_assert_eq!(ctx.trace.len(), 1);
    }

    /* scopes that never raise leave nothing behind */
    #[test]
    fn completed_scopes_release_frames(depth in 1usize..50) {
        fn down(n: usize) -> Result<usize, Raised> {
            if n == 0 {
                return Ok(0);
            }
            protect(move || down(n - 1).map(|d| d + 1))
                .except(&POOL[0], |_| Ok(usize::MAX))
                .run()
        }
        prop_assert_eq!(down(depth).unwrap(), depth);
        prop_assert_eq!(resume::depth(), 0);
    }
}

/* ============================================================================
 * Codec Properties
 * ============================================================================ */

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn codec_roundtrip(i in 0usize..POOL.len()) {
        let code = encode(&POOL[i]);
        prop_assert_ne!(code, 0);
        prop_assert!(std::ptr::eq(decode(code).unwrap(), &POOL[i]));
    }

    #[test]
    fn codec_injective(i in 0usize..POOL.len(), j in 0usize..POOL.len()) {
        prop_assert_eq!(encode(&POOL[i]) == encode(&POOL[j]), i == j);
    }

    /* anything nobody was handed decodes to None, never panics */
    #[test]
    fn codec_decode_total(value in any::<u32>()) {
        if let Some(h) = decode(value) {
            prop_assert_eq!(encode(h), value);
        }
    }
}

/* ============================================================================
 * Diagnostic Stack Properties
 * ============================================================================ */

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /* dump is innermost-first and mirrors exactly what's entered */
    #[test]
    fn dump_mirrors_entered_frames(lines in prop::collection::vec(1u32..10_000, 0..40)) {
        let guards: Vec<_> = lines
            .iter()
            .map(|&line| trace::enter("proptest.rs", "frame", line))
            .collect();
        let dumped: Vec<u32> = trace::dump().iter().map(|f| f.line).collect();
        let expected: Vec<u32> = lines.iter().rev().copied().collect();
        prop_assert_eq!(dumped, expected);

        /* guards must go in LIFO order */
        for guard in guards.into_iter().rev() {
            drop(guard);
        }
        prop_assert_eq!(trace::depth(), 0);
    }
}

/* ============================================================================
 * Signal Parsing Properties
 * ============================================================================ */

const CATCHABLE: [Signal; 7] = [
    Signal::SIGHUP,
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGABRT,
    Signal::SIGSEGV,
    Signal::SIGTERM,
    Signal::SIGUSR1,
];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /* parse_signal never panics on arbitrary input */
    #[test]
    fn signal_parse_never_panics(s in ".*") {
        let _ = parse_signal(&s);
    }

    /* any case mix, with or without SIG, parses to the same signal */
    #[test]
    fn signal_name_case_insensitive(
        sig in prop::sample::select(CATCHABLE.to_vec()),
        upper in prop::collection::vec(any::<bool>(), 8),
        prefixed in any::<bool>(),
    ) {
        let full = signal_name(sig);
        let base = if prefixed { full } else { &full[3..] };
        let mixed: String = base
            .chars()
            .zip(upper.iter().cycle())
            .map(|(c, &up)| if up { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() })
            .collect();
        prop_assert_eq!(parse_signal(&mixed).unwrap(), sig);
    }

    /* numbers roundtrip */
    #[test]
    fn signal_number_roundtrip(sig in prop::sample::select(CATCHABLE.to_vec())) {
        prop_assert_eq!(parse_signal(&sig.as_raw().to_string()).unwrap(), sig);
    }
}
