// Runs the built-in demonstration suites and reports the results.
// Usage: cargo run --bin mcp-harness-selftest -- [--filter NAME] [--json]

use std::cell::Cell;
use std::process;
use std::rc::Rc;

use clap::{ArgAction, Parser, ValueEnum};
use miette::Diagnostic;
use tracing::Level;

use mcp_harness::{
    after_each, before_each, describe, expect, expect_fn, expect_future, expect_mock, it,
    mock_fn, mock_server, mock_tool, print_report, run_all_with, spy_on, summarize, test,
    test_skip, HarnessError, Handlers, Implementation, MockBehavior, ReportConfig, Result,
    RunConfig, ServerConfig, Value,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Parser)]
#[command(
    name = "mcp-harness-selftest",
    version,
    about = "Runs the harness's demonstration suites against itself."
)]
struct Args {
    /// When to color the report.
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    color: ColorMode,
    /// Only run tests whose name contains this text.
    #[arg(long)]
    filter: Option<String>,
    /// Print results as JSON instead of the report.
    #[arg(long)]
    json: bool,
    /// Also register a suite that fails on purpose.
    #[arg(long)]
    include_failing: bool,
    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();
    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let code = match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {}", err);
            if let Some(code) = err.code() {
                eprintln!("  code: {}", code);
            }
            if let Some(help) = err.help() {
                eprintln!("  help: {}", help);
            }
            2
        }
    };
    process::exit(code);
}

fn run(args: &Args) -> Result<i32> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| HarnessError::from_error(&e))?;

    register_demo_suites()?;
    if args.include_failing {
        register_failing_suite()?;
    }

    let config = RunConfig {
        filter: args.filter.clone(),
    };
    let results = runtime.block_on(run_all_with(&config))?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&results).map_err(|e| HarnessError::from_error(&e))?;
        println!("{}", json);
    } else {
        let report = ReportConfig {
            use_colors: match args.color {
                ColorMode::Auto => ReportConfig::default().use_colors,
                ColorMode::Always => true,
                ColorMode::Never => false,
            },
            ..ReportConfig::default()
        };
        print_report(&results, &report).map_err(|e| HarnessError::from_error(&e))?;
    }

    Ok(if summarize(&results).is_success() { 0 } else { 1 })
}

// ============================================================================
// DEMONSTRATION SUITES
// ============================================================================

fn register_demo_suites() -> Result<()> {
    describe("Math", || {
        test("adds", || async { expect(2 + 2).to_be(4) })?;
        test("compares", || async {
            expect(10).to_be_greater_than(3.0)?;
            expect(f64::NAN).to_be(f64::NAN)
        })?;
        test_skip("divides by zero", || async { expect(1.0 / 0.0).to_be(0) })
    })?;

    describe("Matchers", || {
        test("deep equality", || async {
            let a = Value::map([("id", Value::from(1)), ("tags", Value::list(["x", "y"]))]);
            let b = Value::map([("id", Value::from(1)), ("tags", Value::list(["x", "y"]))]);
            expect(&a).to_equal(&b)?;
            expect(&a).not().to_be(&b)
        })?;
        test("strings and lists", || async {
            expect("hello world").to_contain("world")?;
            expect("hello world").to_match(r"^hello\s")?;
            expect(vec![1, 2, 3]).to_have_length(3)?;
            expect(vec![1, 2, 3]).not().to_contain(4)
        })?;
        test("raised failures", || async {
            expect_fn(|| -> Result<Value> { Err(HarnessError::typed("TypeError", "bad input")) })
                .to_throw_matching("bad input")?;
            expect_future(async { Ok::<_, HarnessError>(7) })
                .resolves()
                .await?
                .to_be(7)?;
            expect_future(async { Err::<Value, _>(HarnessError::msg("offline")) })
                .rejects_with("offline")
                .await
        })
    })?;

    describe("Mocks", || {
        test("records calls", || async {
            let search = mock_tool("search", MockBehavior::return_value("hit"));
            search.invoke(vec![Value::from("rust")]).await?;
            expect_mock(&search).to_have_been_called_times(1)?;
            expect_mock(&search).to_have_been_called_with(["rust"])
        })?;
        test("once values run ahead of the default", || async {
            let next = mock_fn("next", MockBehavior::None);
            next.mock_return_value(0).mock_return_value_once(1);
            expect(next.invoke(vec![]).await?).to_be(1)?;
            expect(next.invoke(vec![]).await?).to_be(0)
        })?;
        test("server mock routes by name", || async {
            let server = mock_server(
                ServerConfig::new()
                    .tool("echo", MockBehavior::implementation(|args| {
                        Ok(args.first().cloned().unwrap_or_default())
                    }))
                    .resource("config", MockBehavior::throw_error("missing")),
            );
            expect(server.call("echo", vec![Value::from("ping")]).await?).to_be("ping")?;
            expect_future(async move { server.call("config", vec![]).await })
                .rejects_with("missing")
                .await
        })?;
        it("spies keep the original behavior", || async {
            let handlers = Handlers::new();
            handlers.insert(
                "greet",
                Implementation::new(|args| {
                    let who = args.first().and_then(Value::as_str).unwrap_or("world");
                    Ok(Value::from(format!("hello {}", who)))
                }),
            );
            let spy = spy_on(&handlers, "greet")?;
            expect(handlers.call("greet", vec![Value::from("ada")]).await?).to_be("hello ada")?;
            expect_mock(spy.mock()).to_have_been_called()?;
            spy.restore();
            handlers.call("greet", vec![]).await?;
            expect_mock(spy.mock()).to_have_been_called_times(1)
        })
    })?;

    describe("Hooks", || {
        let counter = Rc::new(Cell::new(0));
        let resets = counter.clone();
        before_each(move || {
            resets.set(0);
            async { Ok(()) }
        })?;
        let checked = counter.clone();
        after_each(move || {
            let seen = checked.get();
            async move { expect(seen).to_be(1) }
        })?;
        for name in ["first sees a fresh counter", "second sees a fresh counter"] {
            let counter = counter.clone();
            test(name, move || {
                counter.set(counter.get() + 1);
                let seen = counter.get();
                async move { expect(seen).to_be(1) }
            })?;
        }
        Ok(())
    })
}

fn register_failing_suite() -> Result<()> {
    describe("Regressions", || {
        test("fails on purpose", || async { expect(0.1 + 0.2).to_be(0.3) })?;
        test("still passes", || async { expect(true).to_be_truthy() })
    })
}
