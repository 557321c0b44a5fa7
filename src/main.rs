//! Quickfuture CLI
//!
//! Runs built-in future scenarios on a fresh event loop and prints how they
//! settled as JSON.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand, ValueEnum};
use quickfuture::{EventLoopConfig, Future, Runtime, Thenable, Value, VERSION};
use serde_json::json;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quickfuture")]
#[command(author, version, about = "Deferred values with thenable interop, driven by an embeddable event loop", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Event loop configuration file (JSON)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a built-in scenario and print its outcome
    Demo {
        /// The scenario to run
        #[arg(value_enum)]
        scenario: Scenario,
    },

    /// List the built-in scenarios
    Scenarios,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Scenario {
    /// resolve(1), then +1 twice
    Chain,
    /// A handler returning a future that resolves to a thenable
    Nested,
    /// all([1, resolve(2), 3])
    All,
    /// race between a 50ms and a 10ms delay
    Race,
    /// allSettled over a fulfilled and a rejected future
    AllSettled,
    /// A handler returning its own bridge future
    Cycle,
    /// A handler that throws
    Throw,
}

impl Scenario {
    const ALL: [Scenario; 7] = [
        Scenario::Chain,
        Scenario::Nested,
        Scenario::All,
        Scenario::Race,
        Scenario::AllSettled,
        Scenario::Cycle,
        Scenario::Throw,
    ];

    fn name(self) -> &'static str {
        match self {
            Scenario::Chain => "chain",
            Scenario::Nested => "nested",
            Scenario::All => "all",
            Scenario::Race => "race",
            Scenario::AllSettled => "all-settled",
            Scenario::Cycle => "cycle",
            Scenario::Throw => "throw",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Scenario::Chain => "resolve(1), then +1 twice",
            Scenario::Nested => "a handler returning a future that resolves to a thenable",
            Scenario::All => "all([1, resolve(2), 3])",
            Scenario::Race => "race between a 50ms and a 10ms delay",
            Scenario::AllSettled => "allSettled over a fulfilled and a rejected future",
            Scenario::Cycle => "a handler returning its own bridge future",
            Scenario::Throw => "a handler that throws",
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Demo { scenario } => run_demo(scenario, cli.config.as_deref()),
        Commands::Scenarios => {
            println!("quickfuture {}", VERSION);
            for scenario in Scenario::ALL {
                println!("  {:<12} {}", scenario.name(), scenario.description());
            }
            Ok(())
        }
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// quickfuture errors hold `Rc` payloads, so they cross into anyhow as text
fn lift<T>(result: quickfuture::Result<T>) -> anyhow::Result<T> {
    result.map_err(|e| anyhow!("{}", e))
}

fn run_demo(scenario: Scenario, config: Option<&Path>) -> anyhow::Result<()> {
    let runtime = match config {
        Some(path) => {
            let config = lift(EventLoopConfig::load(path))
                .with_context(|| format!("failed to load config '{}'", path.display()))?;
            lift(Runtime::with_config(config))?
        }
        None => Runtime::new(),
    };

    let future = build_scenario(&runtime, scenario);
    let run = lift(runtime.run()).context("event loop did not finish")?;

    let mut outcome = json!({
        "scenario": scenario.name(),
        "state": future.state().as_str(),
        "tasks": run.tasks_processed,
        "timers": run.timers_fired,
        "final_time": run.final_time,
    });
    if let Some(value) = future.value() {
        outcome["value"] = value.to_json();
    }
    if let Some(reason) = future.reason() {
        outcome["reason"] = reason.to_json();
    }

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn add_one() -> Value {
    Value::function(|v| Ok(Value::from(v.as_number().unwrap_or(0.0) + 1.0)))
}

/// Fulfills synchronously from inside its own `then`
struct Immediate(Value);

impl Thenable for Immediate {
    fn then(&self, on_fulfilled: Value, _: Value) -> quickfuture::Result<()> {
        on_fulfilled.call(&[self.0.clone()])?;
        Ok(())
    }
}

fn build_scenario(runtime: &Runtime, scenario: Scenario) -> Future {
    match scenario {
        Scenario::Chain => runtime
            .resolve(1)
            .then(add_one(), Value::Undefined)
            .then(add_one(), Value::Undefined),
        Scenario::Nested => {
            let scheduler = runtime.scheduler().clone();
            runtime.resolve(Value::Undefined).then(
                Value::function(move |_| {
                    let thenable = Value::new_thenable(Rc::new(Immediate(Value::from(42))));
                    Ok(Future::resolve(&scheduler, thenable).into())
                }),
                Value::Undefined,
            )
        }
        Scenario::All => runtime.all(vec![
            Value::from(1),
            Value::from(runtime.resolve(2)),
            Value::from(3),
        ]),
        Scenario::Race => runtime.race(vec![
            Value::from(runtime.delay(50, "a")),
            Value::from(runtime.delay(10, "b")),
        ]),
        Scenario::AllSettled => runtime.all_settled(vec![
            Value::from(runtime.resolve(1)),
            Value::from(runtime.reject("e")),
        ]),
        Scenario::Cycle => {
            let own_bridge: Rc<RefCell<Option<Future>>> = Rc::new(RefCell::new(None));
            let slot = own_bridge.clone();
            let bridge = runtime.resolve(1).then(
                Value::function(move |_| {
                    Ok(slot.borrow().as_ref().map(Value::from).unwrap_or_default())
                }),
                Value::Undefined,
            );
            *own_bridge.borrow_mut() = Some(bridge.clone());
            bridge
        }
        Scenario::Throw => runtime.resolve(1).then(
            Value::function(|_| Err(quickfuture::Error::thrown(Value::new_error(
                quickfuture::ErrorKind::GenericError,
                "handler failed",
            )))),
            Value::Undefined,
        ),
    }
}
