//! Command-line dispatcher: maps registered operations to subcommands and
//! builds the root unit of work from parsed flags.
//!
//! Each operation becomes a subcommand named after it (lowercase, `_` as
//! `-`), with one `--flag` per declared parameter. Only flags that were
//! actually given are bound, so parameter defaults still apply. A built-in
//! `help` subcommand is itself a unit of work and is the default.

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use thiserror::Error;

use crate::config::LogConfig;
use crate::core::signature::{Args, BindingError, Param, ParamType, Signature, SignatureError};
use crate::core::value::{Value, repr};
use crate::trace::Severity;
use crate::unit::{Operation, Unit};

const HELP: &str = "help";
const RESERVED_FLAGS: [&str; 7] = [
    "retry",
    "config",
    "timestamps",
    "verbose",
    "quiet",
    "help",
    "version",
];

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Parse failure, or a `--help`/`--version` request; `clap` knows how to
    /// report it.
    #[error(transparent)]
    Cli(#[from] clap::Error),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Registration(#[from] SignatureError),
}

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    pub retry: Option<u32>,
    pub config: Option<PathBuf>,
    pub timestamps: bool,
    pub verbose: u8,
    pub quiet: bool,
}

impl GlobalOptions {
    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            retry: matches.get_one::<u32>("retry").copied(),
            config: matches.get_one::<PathBuf>("config").cloned(),
            timestamps: matches.get_flag("timestamps"),
            verbose: matches.get_count("verbose"),
            quiet: matches.get_flag("quiet"),
        }
    }

    /// Layer command-line presentation flags over the configured ones.
    pub fn apply_to(&self, log: &mut LogConfig) {
        if self.timestamps {
            log.timestamps = true;
        }
        if self.quiet {
            log.verbosity = Severity::Warn;
        }
        for _ in 0..self.verbose {
            log.verbosity = log.verbosity.more_verbose();
        }
    }
}

/// Parsed command line: the root unit plus global flags.
#[derive(Debug)]
pub struct Invocation {
    pub unit: Unit,
    pub options: GlobalOptions,
}

pub struct Dispatcher {
    command: Command,
    operations: Vec<(String, Operation)>,
}

impl Dispatcher {
    pub fn new(name: &str, about: &str) -> Self {
        let command = Command::new(name.to_string())
            .about(about.to_string())
            .version(env!("CARGO_PKG_VERSION"))
            .disable_help_subcommand(true)
            .arg(
                Arg::new("retry")
                    .long("retry")
                    .global(true)
                    .value_name("N")
                    .value_parser(value_parser!(u32))
                    .help("Attempt budget for retryable steps (overrides TRELLIS_RETRY)"),
            )
            .arg(
                Arg::new("config")
                    .long("config")
                    .global(true)
                    .value_name("PATH")
                    .value_parser(value_parser!(PathBuf))
                    .help("Config file [default: trellis.toml]"),
            )
            .arg(
                Arg::new("timestamps")
                    .long("timestamps")
                    .global(true)
                    .action(ArgAction::SetTrue)
                    .help("Prefix trace lines with timestamps"),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .global(true)
                    .action(ArgAction::Count)
                    .help("Show more trace detail (repeatable)"),
            )
            .arg(
                Arg::new("quiet")
                    .short('q')
                    .long("quiet")
                    .global(true)
                    .action(ArgAction::SetTrue)
                    .conflicts_with("verbose")
                    .help("Only show warnings and failures"),
            )
            .subcommand(Command::new(HELP).about("Print help message"));
        Self {
            command,
            operations: Vec::new(),
        }
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Expose `operation` as a subcommand.
    pub fn register(&mut self, operation: Operation) -> Result<&mut Self> {
        let name = command_name(operation.name());
        if name == HELP || self.operations.iter().any(|(n, _)| *n == name) {
            bail!("subcommand `{name}` is already registered");
        }
        let signature = operation.signature();
        if let Some(param) = signature
            .params()
            .iter()
            .find(|p| RESERVED_FLAGS.contains(&command_name(&p.name).as_str()))
        {
            bail!(
                "{}: parameter `{}` clashes with a global flag",
                signature.name(),
                param.name
            );
        }

        let mut subcommand = Command::new(name.clone());
        if let Some(summary) = signature.summary() {
            subcommand = subcommand.about(summary.to_string());
        }
        for param in signature.params() {
            subcommand = subcommand.arg(param_arg(param));
        }
        self.command = std::mem::take(&mut self.command).subcommand(subcommand);
        self.operations.push((name, operation));
        Ok(self)
    }

    pub fn parse_from<I, T>(&self, args: I) -> Result<Invocation, DispatchError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command.clone().try_get_matches_from(args)?;
        let options = GlobalOptions::from_matches(&matches);
        let unit = match matches.subcommand() {
            None | Some((HELP, _)) => self.help_unit()?,
            Some((name, sub)) => {
                let operation = self
                    .operations
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, op)| op)
                    .ok_or_else(|| {
                        self.command
                            .clone()
                            .error(clap::error::ErrorKind::InvalidSubcommand, name.to_string())
                    })?;
                bind_from_matches(operation, sub)?
            }
        };
        Ok(Invocation { unit, options })
    }

    fn help_unit(&self) -> Result<Unit, DispatchError> {
        let help = self.command.clone().render_help().to_string();
        let operation = Operation::builder(
            Signature::new(HELP, Vec::new())?.with_summary("Print help message"),
        )
        .template("Print help message")
        .severity(Severity::Debug)
        .leaf(move |_| {
            print!("{help}");
            Ok(Value::Null)
        })?;
        Ok(operation.bind(Args::new())?)
    }
}

/// `deploy_all` → `deploy-all`.
pub fn command_name(name: &str) -> String {
    name.to_lowercase().replace('_', "-")
}

fn param_arg(param: &Param) -> Arg {
    let mut help = param.help.clone().unwrap_or_default();
    if let Some(default) = &param.default {
        if !help.is_empty() {
            help.push(' ');
        }
        help.push_str(&format!("[default: {}]", repr(default)));
    }
    let arg = Arg::new(param.name.clone())
        .long(command_name(&param.name))
        .value_name(param.name.to_uppercase())
        .required(param.default.is_none())
        .help(help);
    match param.kind {
        ParamType::Bool => arg.num_args(0..=1).default_missing_value("true"),
        _ => arg,
    }
}

fn bind_from_matches(operation: &Operation, matches: &ArgMatches) -> Result<Unit, DispatchError> {
    let mut args = Args::new();
    for param in operation.signature().params() {
        let Some(raw) = matches.get_one::<String>(&param.name) else {
            continue;
        };
        let value = param
            .kind
            .parse(raw)
            .ok_or_else(|| BindingError::InvalidValue {
                operation: operation.name().to_string(),
                name: param.name.clone(),
                expected: param.kind,
                raw: raw.clone(),
            })?;
        args = args.kwarg(param.name.clone(), value);
    }
    Ok(operation.bind(args)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deploy() -> Operation {
        Operation::builder(
            Signature::new(
                "deploy_app",
                vec![
                    Param::required("region", ParamType::String).with_help("Target region"),
                    Param::optional("replicas", ParamType::Integer, 3),
                    Param::optional("dry_run", ParamType::Bool, false),
                ],
            )
            .expect("signature")
            .with_summary("Deploy the app"),
        )
        .leaf(|_| Ok(Value::Null))
        .expect("op")
    }

    fn dispatcher() -> Dispatcher {
        let mut dispatcher = Dispatcher::new("trellis", "test");
        dispatcher.register(deploy()).expect("register");
        dispatcher
    }

    #[test]
    fn command_definition_is_consistent() {
        dispatcher().command().clone().debug_assert();
    }

    #[test]
    fn binds_only_supplied_flags() {
        let invocation = dispatcher()
            .parse_from(["trellis", "deploy-app", "--region", "eu", "--dry-run"])
            .expect("parse");
        let args = invocation.unit.arguments();
        assert_eq!(args.get("region"), Some(&json!("eu")));
        assert_eq!(args.get("replicas"), Some(&json!(3)));
        assert_eq!(args.get("dry_run"), Some(&json!(true)));
        assert_eq!(
            invocation.unit.render(),
            "deploy_app(region='eu', replicas=3, dry_run=true)"
        );
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let invocation = dispatcher()
            .parse_from(["trellis", "deploy-app", "--region", "eu", "--retry", "2", "-vv"])
            .expect("parse");
        assert_eq!(invocation.options.retry, Some(2));
        assert_eq!(invocation.options.verbose, 2);

        let mut log = LogConfig::default();
        invocation.options.apply_to(&mut log);
        assert_eq!(log.verbosity, Severity::Trace);
    }

    #[test]
    fn bad_values_are_binding_errors() {
        let err = dispatcher()
            .parse_from(["trellis", "deploy-app", "--region", "eu", "--replicas", "many"])
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Binding(BindingError::InvalidValue { .. })
        ));
    }

    #[test]
    fn missing_required_flag_is_a_cli_error() {
        let err = dispatcher()
            .parse_from(["trellis", "deploy-app"])
            .unwrap_err();
        assert!(matches!(err, DispatchError::Cli(_)));
    }

    #[test]
    fn no_subcommand_selects_help() {
        let invocation = dispatcher().parse_from(["trellis"]).expect("parse");
        assert_eq!(invocation.unit.operation().name(), "help");
        assert_eq!(invocation.unit.render(), "Print help message");
    }

    #[test]
    fn rejects_duplicate_and_clashing_registrations() {
        let mut dispatcher = dispatcher();
        assert!(dispatcher.register(deploy()).is_err());

        let clashing = Operation::builder(
            Signature::new("noisy", vec![Param::optional("verbose", ParamType::Bool, false)])
                .expect("signature"),
        )
        .leaf(|_| Ok(Value::Null))
        .expect("op");
        assert!(dispatcher.register(clashing).is_err());
    }
}
