//! Quick Check Runner CLI
//!
//! Usage:
//!   qc-run run [--cases N] [--seed S] [--output FORMAT] [--include-failing]
//!   qc-run list
//!   qc-run report <json-file> [--output FORMAT]
//!
//! Examples:
//!   qc-run run                          # Time-derived seed, 100 cases per check
//!   TEST_SEED=1234 qc-run run           # Replay a previous run
//!   qc-run run --output junit           # JUnit XML (for CI)
//!   qc-run run --include-failing        # Show counterexample reporting
//!   qc-run report results.json          # Re-generate report from JSON

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use qc_harness::prelude::*;
use qc_harness::reports::CheckReport;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "qc-run", about = "Seeded quick-check runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the self-check suite
    Run(RunArgs),
    /// List available checks
    List,
    /// Generate report from JSON results
    Report {
        /// JSON file written by `run --output json`
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = Output::Text)]
        output: Output,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Passing cases required per check
    #[arg(long, default_value_t = 100)]
    cases: u32,

    /// Seed override; takes precedence over TEST_SEED
    #[arg(long, allow_hyphen_values = true)]
    seed: Option<String>,

    #[arg(long, value_enum, default_value_t = Output::Text)]
    output: Output,

    /// Add a check that is expected to be falsified
    #[arg(long)]
    include_failing: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Output {
    Text,
    Json,
    Junit,
    Markdown,
}

const CHECKS: &[(&str, &str)] = &[
    ("add_commutes", "i64 addition is commutative within [-1e9, 1e9]"),
    ("reverse_involution", "reversing a byte vector twice is the identity"),
    ("sort_idempotent", "sorting an already sorted byte vector changes nothing"),
    ("ascii_len", "printable ASCII strings have one byte per char"),
    ("bounded_u64", "u64_below(1000) never reaches its bound"),
];

const FAILING_CHECK: (&str, &str) = ("all_u32_small", "every u32 is below 1000 (expected to fail)");

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "qc_harness=debug,info" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Run(args) => run_checks(args),
        Command::List => {
            list_checks();
            Ok(ExitCode::SUCCESS)
        }
        Command::Report { file, output } => generate_report(&file, output),
    }
}

fn run_checks(args: RunArgs) -> Result<ExitCode> {
    let mut config = CheckConfig::from_env().cases(args.cases);
    if let Some(seed) = args.seed {
        config = config.seed_override(seed);
    }

    // Fail fast on a malformed override before any check runs.
    if let Err(err) = config.seed_resolver().try_resolve() {
        eprintln!("error: {err}");
        return Ok(ExitCode::from(2));
    }

    info!(cases = config.cases, seed = ?config.seed_override, "starting quick-check suite");

    let mut ctx = TestContext::new("self-check", config);
    run_suite(&mut ctx, args.include_failing);

    // The exit code carries failures, so the context must not panic on drop.
    let report = CheckReport::new(ctx.take_results());
    emit(&report, args.output);

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn run_suite(ctx: &mut TestContext, include_failing: bool) {
    ctx.set_default_generators(vec![Generator::i64_range(-1_000_000_000, 1_000_000_000)]);

    announce(CHECKS[0]);
    ctx.quick_check(|a: i64, b: i64| a + b == b + a);

    announce(CHECKS[1]);
    ctx.quick_check_with(vec![Generator::bytes(64)], |v: Vec<u8>| {
        let mut twice = v.clone();
        twice.reverse();
        twice.reverse();
        twice == v
    });

    announce(CHECKS[2]);
    ctx.quick_check_with(vec![Generator::bytes(64)], |mut v: Vec<u8>| {
        v.sort_unstable();
        let mut again = v.clone();
        again.sort_unstable();
        again == v
    });

    announce(CHECKS[3]);
    ctx.quick_check_with(vec![Generator::ascii_string(64)], |s: String| {
        s.len() == s.chars().count()
    });

    announce(CHECKS[4]);
    ctx.quick_check_with(vec![Generator::u64_below(1000)], |x: u64| x < 1000);

    if include_failing {
        announce(FAILING_CHECK);
        ctx.quick_check(|x: u32| x < 1000);
    }
}

fn announce((name, description): (&str, &str)) {
    info!(check = name, "{}", description);
}

fn list_checks() {
    println!("Available checks:");
    println!();
    for (name, description) in CHECKS.iter().chain(std::iter::once(&FAILING_CHECK)) {
        println!("  {:<20} {}", name, description);
    }
    println!();
    println!("Run with: qc-run run [--cases N] [--seed S]");
}

fn generate_report(file: &Path, output: Output) -> Result<ExitCode> {
    let json = fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;

    let results = match serde_json::from_str::<CheckReport>(&json) {
        Ok(report) => report.results,
        Err(_) => serde_json::from_str::<Vec<CheckResult>>(&json)
            .with_context(|| format!("failed to parse {}", file.display()))?,
    };

    emit(&CheckReport::new(results), output);
    Ok(ExitCode::SUCCESS)
}

fn emit(report: &CheckReport, output: Output) {
    match output {
        Output::Json => println!("{}", report.to_json()),
        Output::Junit => println!("{}", report.to_junit_xml()),
        Output::Markdown => println!("{}", report.to_markdown()),
        Output::Text => report.print(),
    }
}
