//! `trellis`: run a registered workflow as a tree of retryable units of
//! work, tracing every step to stderr.
//!
//! The attempt budget comes from `--retry`, then `TRELLIS_RETRY`, then
//! `retry` in the config file (default 0). A non-null result is printed to
//! stdout as JSON.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use tracing::debug;
use trellis::config::{DEFAULT_CONFIG_PATH, RETRY_ENV, load_config, resolve_attempt_budget};
use trellis::core::address::Address;
use trellis::core::value::Value;
use trellis::demo;
use trellis::dispatch::{DispatchError, Invocation};
use trellis::exit_codes;
use trellis::logging;
use trellis::trace::TracingSink;

fn main() {
    process::exit(run());
}

fn run() -> i32 {
    let dispatcher = match demo::dispatcher() {
        Ok(dispatcher) => dispatcher,
        Err(err) => {
            eprintln!("{err:#}");
            return exit_codes::FAILED;
        }
    };
    let invocation = match dispatcher.parse_from(std::env::args_os()) {
        Ok(invocation) => invocation,
        Err(DispatchError::Cli(err)) => err.exit(),
        Err(err) => {
            eprintln!("error: {err}");
            return exit_codes::USAGE;
        }
    };
    match execute(invocation) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::FAILED
        }
    }
}

fn execute(invocation: Invocation) -> Result<i32> {
    let Invocation { unit, options } = invocation;
    let config_path = options
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut cfg = load_config(&config_path)?;
    options.apply_to(&mut cfg.log);
    logging::init(&cfg.log);

    let env_budget = std::env::var(RETRY_ENV).ok();
    let attempt_budget = resolve_attempt_budget(options.retry, env_budget.as_deref(), &cfg)?;
    debug!(attempt_budget, config = %config_path.display(), "starting root unit");

    match unit.execute(&TracingSink, attempt_budget, &Address::root()) {
        Ok(Value::Null) => Ok(exit_codes::OK),
        Ok(value) => {
            let rendered = serde_json::to_string_pretty(&value).context("serialize result")?;
            println!("{rendered}");
            Ok(exit_codes::OK)
        }
        Err(failure) => {
            eprintln!("error: {failure:#}");
            Ok(exit_codes::FAILED)
        }
    }
}
