#![warn(missing_docs)]

//! Skillbox — grade an untrusted candidate function against a test battery.
//!
//! ```text
//! skillbox --candidate add.js --tests tests.json --timeout-ms 500
//! ```
//!
//! The candidate file holds one JavaScript function expression; the tests
//! file holds a JSON array of `{"args": ..., "expected": ...}` objects.
//! The report is printed to stdout as JSON. Exit status: 0 when every
//! test passed, 1 when at least one failed, 2 when the candidate was
//! rejected or the run could not proceed.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use skillbox_config::SkillboxConfig;
use skillbox_sandbox::{SandboxConfig, SandboxError, SkillHarness, TestCase};
use tracing_subscriber::EnvFilter;

/// Parsed command-line options.
struct CliOptions {
    candidate: PathBuf,
    tests: PathBuf,
    timeout_ms: Option<u64>,
    mem_limit_mb: Option<u64>,
    cpu_limit_s: Option<u64>,
    config: Option<PathBuf>,
    pretty: bool,
}

fn print_usage() {
    eprintln!(
        "usage: skillbox --candidate <file.js> --tests <file.json> --timeout-ms <N>\n\
         \n\
         options:\n\
         \x20 --candidate <path>     candidate function expression source file\n\
         \x20 --tests <path>         JSON array of {{\"args\", \"expected\"}} test cases\n\
         \x20 --timeout-ms <N>       per-test wall-clock timeout in milliseconds\n\
         \x20 --mem-limit-mb <N>     address-space ceiling per test (default 256)\n\
         \x20 --cpu-limit-s <N>      CPU-time ceiling per test (default 1)\n\
         \x20 --config <path>        TOML config file (default: $SKILLBOX_CONFIG or ./skillbox.toml)\n\
         \x20 --pretty               pretty-print the report\n\
         \x20 --version, -V          print version"
    );
}

fn parse_args(args: &[String]) -> Result<CliOptions> {
    let mut candidate = None;
    let mut tests = None;
    let mut timeout_ms = None;
    let mut mem_limit_mb = None;
    let mut cpu_limit_s = None;
    let mut config = None;
    let mut pretty = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| -> Result<String> {
            iter.next()
                .cloned()
                .with_context(|| format!("{flag} requires a value"))
        };
        match arg.as_str() {
            "--candidate" => candidate = Some(PathBuf::from(value("--candidate")?)),
            "--tests" => tests = Some(PathBuf::from(value("--tests")?)),
            "--timeout-ms" => {
                timeout_ms = Some(
                    value("--timeout-ms")?
                        .parse()
                        .context("--timeout-ms must be an integer")?,
                )
            }
            "--mem-limit-mb" => {
                mem_limit_mb = Some(
                    value("--mem-limit-mb")?
                        .parse()
                        .context("--mem-limit-mb must be an integer")?,
                )
            }
            "--cpu-limit-s" => {
                cpu_limit_s = Some(
                    value("--cpu-limit-s")?
                        .parse()
                        .context("--cpu-limit-s must be an integer")?,
                )
            }
            "--config" => config = Some(PathBuf::from(value("--config")?)),
            "--pretty" => pretty = true,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    Ok(CliOptions {
        candidate: candidate.context("--candidate is required")?,
        tests: tests.context("--tests is required")?,
        timeout_ms,
        mem_limit_mb,
        cpu_limit_s,
        config,
        pretty,
    })
}

/// Locate the config file.
///
/// Search order: `--config` flag, `SKILLBOX_CONFIG` env var,
/// `./skillbox.toml`.
fn find_config_file(flag: &Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = flag {
        return Some(path.clone());
    }
    if let Ok(path) = std::env::var("SKILLBOX_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from("skillbox.toml");
    if local.exists() {
        return Some(local);
    }
    None
}

/// Build the sandbox config from file overrides plus CLI flags.
///
/// Flags win over the config file; the file wins over defaults. The
/// per-test timeout must come from one of the two.
fn build_sandbox_config(opts: &CliOptions, file: &SkillboxConfig) -> Result<SandboxConfig> {
    let mut config = SandboxConfig::default();

    let overrides = &file.sandbox;
    if let Some(ms) = overrides.timeout_ms {
        config.timeout = Duration::from_millis(ms);
    }
    if let Some(mb) = overrides.mem_limit_mb {
        config.limits.mem_limit_mb = mb;
    }
    if let Some(s) = overrides.cpu_limit_s {
        config.limits.cpu_limit_s = s;
    }
    if let Some(mb) = overrides.max_heap_mb {
        config.max_heap_size = mb * 1024 * 1024;
    }
    if let Some(kb) = overrides.max_code_size_kb {
        config.max_code_size = kb * 1024;
    }
    if let Some(kb) = overrides.max_output_size_kb {
        config.max_output_size = kb * 1024;
    }
    if let Some(mb) = overrides.max_ipc_message_size_mb {
        config.max_ipc_message_size = mb * 1024 * 1024;
    }

    if let Some(ms) = opts.timeout_ms {
        config.timeout = Duration::from_millis(ms);
    } else if overrides.timeout_ms.is_none() {
        anyhow::bail!("--timeout-ms is required (or set timeout_ms in the config file)");
    }
    if let Some(mb) = opts.mem_limit_mb {
        config.limits.mem_limit_mb = mb;
    }
    if let Some(s) = opts.cpu_limit_s {
        config.limits.cpu_limit_s = s;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("skillbox {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if args.is_empty() {
        print_usage();
        std::process::exit(2);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let opts = match parse_args(&args) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("error: {e}");
            print_usage();
            std::process::exit(2);
        }
    };

    let file_config = match find_config_file(&opts.config) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            SkillboxConfig::from_file_with_env(&path)
                .with_context(|| format!("failed to load config from {}", path.display()))?
        }
        None => SkillboxConfig::default(),
    };

    let sandbox_config = build_sandbox_config(&opts, &file_config)?;

    let source = std::fs::read_to_string(&opts.candidate).with_context(|| {
        format!(
            "failed to read candidate source from {}",
            opts.candidate.display()
        )
    })?;
    // A candidate file is one function expression; tolerate a trailing
    // semicolon so the parenthesized invocation wrapper stays valid.
    let source = source.trim().trim_end_matches(';').trim_end();

    let tests_raw = std::fs::read_to_string(&opts.tests)
        .with_context(|| format!("failed to read tests from {}", opts.tests.display()))?;
    let tests: Vec<TestCase> = serde_json::from_str(&tests_raw)
        .with_context(|| format!("failed to parse tests from {}", opts.tests.display()))?;

    let harness = SkillHarness::new(sandbox_config);
    match harness.evaluate(&source, &tests).await {
        Ok(report) => {
            let rendered = if opts.pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{rendered}");
            std::process::exit(if report.passed { 0 } else { 1 });
        }
        Err(SandboxError::Rejected(violation)) => {
            eprintln!("{}", violation.to_structured_error());
            std::process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}
