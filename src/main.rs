/*
 * main.rs
 *
 * Demo scenarios. Each one is a small program showing one path through the
 * engine; the integration tests run them and check stderr and exit status.
 *
 * RUST_LOG=debug shows the engine's raise/catch/propagate decisions.
 */

use clap::{Parser, Subcommand};

use raisetrace::signal::{Signal, parse_signal};
use raisetrace::{Config, Handler, Raised, exit_codes, protect, raise, trace_scope};

fn announce_handler1() {
    eprintln!("in the handler1");
}

fn announce_handler2() {
    eprintln!("in the handler2");
}

fn announce_handler3() {
    eprintln!("in the handler3");
}

static HANDLER1: Handler = Handler::with_action("handler1", announce_handler1);
static HANDLER2: Handler = Handler::with_action("handler2", announce_handler2);
static HANDLER3: Handler = Handler::with_action("handler3", announce_handler3);

#[derive(Parser, Debug)]
#[command(
    name = "raisetrace-demo",
    version,
    about = "Walk through raise/catch/propagate and crash reporting",
    after_help = "Exit status:\n\
                  0 if the scenario handled everything it raised\n\
                  1 if a condition went unhandled\n\
                  N if fatal signal N arrived\n\
                  125 if the runtime could not be set up\n\n\
                  RAISETRACE_SIGNALS overrides the intercepted signals (e.g. \"INT,TERM\")."
)]
struct Cli {
    #[command(subcommand)]
    scenario: Scenario,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Scenario {
    /// Nested scopes, a re-raise, and a raise from inside a handler clause
    Nested,
    /// Outer scope catches what the inner scope doesn't list
    Propagate,
    /// Raise with no protected scope at all
    Unhandled,
    /// Raise that no enclosing scope matches
    Escape,
    /// Unhandled raise that carried no origin
    Anonymous,
    /// Deliver a fatal signal with two traced frames active
    Signal {
        /// Signal to deliver (name or number)
        #[arg(long, default_value = "INT", value_parser = parse_signal)]
        signal: Signal,
    },
    /// Pop an empty diagnostic stack (engine contract violation)
    Underflow,
}

/* keeps the compiler from proving the code after a raise dead */
fn should_raise() -> bool {
    std::hint::black_box(true)
}

/* ---------------------------------------------------------------- nested */

fn func4() -> Result<(), Raised> {
    trace_scope!();
    eprintln!("func4 before raise");
    if should_raise() {
        raise!(HANDLER3);
    }
    eprintln!("func4 after raise");
    Ok(())
}

fn func3() -> Result<(), Raised> {
    trace_scope!();
    eprintln!("func3 before raise");
    if should_raise() {
        raise!(HANDLER2);
    }
    eprintln!("func3 after raise");
    Ok(())
}

fn func2() -> Result<(), Raised> {
    trace_scope!();
    eprintln!("func2 before raise");
    eprintln!("func2 after raise");
    Ok(())
}

fn func1() -> Result<(), Raised> {
    trace_scope!();
    eprintln!("here is func1");

    protect(|| {
        func2()?;
        protect(func3)
            .except(&HANDLER3, |_| {
                eprintln!("handler3: func1");
                Ok(())
            })
            .run()
    })
    .except(&HANDLER2, |_| {
        eprintln!("handler2: func1");
        protect(func4)
            .except(&HANDLER3, |_| {
                eprintln!("caught 3 from handler 2");
                Ok(())
            })
            .run()
    })
    .run()
}

fn scenario_nested() -> Result<(), Raised> {
    trace_scope!();
    protect(func1)
        .except(&HANDLER1, |_| {
            eprintln!("handler1: main");
            Ok(())
        })
        .except(&HANDLER2, |_| {
            eprintln!("handler2: main");
            Ok(())
        })
        .run()?;
    eprintln!("finishing up");
    Ok(())
}

/* ------------------------------------------------------------- propagate */

fn scope_b() -> Result<(), Raised> {
    trace_scope!();
    protect(|| {
        eprintln!("B: raising handler2");
        if should_raise() {
            raise!(HANDLER2);
        }
        eprintln!("B: after raise");
        Ok(())
    })
    .except(&HANDLER3, |_| {
        eprintln!("B: caught handler3");
        Ok(())
    })
    .run()
}

fn scenario_propagate() -> Result<(), Raised> {
    trace_scope!();
    protect(scope_b)
        .except(&HANDLER2, |caught| {
            match caught.origin {
                Some(o) => eprintln!("A: caught {} from {}:{}", caught.name(), o.file, o.line),
                None => eprintln!("A: caught {}", caught.name()),
            }
            Ok(())
        })
        .run()
}

/* --------------------------------------------------- unhandled / escape */

fn open_settings() -> Result<(), Raised> {
    trace_scope!();
    raise!(HANDLER1);
}

fn scenario_unhandled() -> Result<(), Raised> {
    trace_scope!();
    open_settings()
}

fn escape_leaf() -> Result<(), Raised> {
    trace_scope!();
    raise!(HANDLER3);
}

fn escape_middle() -> Result<(), Raised> {
    trace_scope!();
    protect(escape_leaf)
        .except(&HANDLER2, |_| {
            eprintln!("escape: inner caught handler2");
            Ok(())
        })
        .run()
}

fn scenario_escape() -> Result<(), Raised> {
    trace_scope!();
    protect(escape_middle)
        .except(&HANDLER1, |_| {
            eprintln!("escape: outer caught handler1");
            Ok(())
        })
        .run()
}

fn scenario_anonymous() -> Result<(), Raised> {
    trace_scope!();
    Err(raisetrace::engine::raise(&HANDLER2, None))
}

/* --------------------------------------------------------------- signals */

fn signal_inner(signal: Signal) {
    trace_scope!();
    eprintln!("delivering {}", raisetrace::signal_name(signal));
    // SAFETY: raise() sends to the calling thread; our handler never returns.
    unsafe {
        libc::raise(signal.as_raw());
    }
}

fn signal_outer(signal: Signal) {
    trace_scope!();
    signal_inner(signal);
}

/* shared implementation */
fn run_main() -> u8 {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("raisetrace-demo: {e}");
            return e.exit_code();
        }
    };
    if let Scenario::Signal { signal } = cli.scenario {
        if !config.signals.contains(&signal) {
            config.signals.push(signal);
        }
    }

    let _runtime = match raisetrace::init(&config) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("raisetrace-demo: {e}");
            return e.exit_code();
        }
    };

    let outcome = match cli.scenario {
        Scenario::Nested => scenario_nested(),
        Scenario::Propagate => scenario_propagate(),
        Scenario::Unhandled => scenario_unhandled(),
        Scenario::Escape => scenario_escape(),
        Scenario::Anonymous => scenario_anonymous(),
        Scenario::Signal { signal } => {
            signal_outer(signal);
            eprintln!("signal {} did not terminate the process", signal.as_raw());
            return exit_codes::INTERNAL_ERROR;
        }
        Scenario::Underflow => {
            raisetrace::trace::exit_frame();
            return exit_codes::INTERNAL_ERROR;
        }
    };

    /* an escaped condition never gets here: the engine exits first */
    match outcome {
        Ok(()) => 0,
        Err(raised) => {
            eprintln!("raisetrace-demo: {raised} escaped the engine");
            exit_codes::INTERNAL_ERROR
        }
    }
}

fn main() {
    std::process::exit(i32::from(run_main()));
}
