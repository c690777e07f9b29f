//! Sample provisioning and build workflows exposed by the `trellis` binary.
//!
//! The steps do no real work; they exist to show nesting, retries, and
//! failure handling in the trace. `--flaky N` makes every replica fail its
//! first `N` starts, so `--retry` can be seen recovering them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use serde_json::json;

use crate::core::signature::{Args, Param, ParamType, Signature};
use crate::core::step::Sequence;
use crate::dispatch::Dispatcher;
use crate::trace::Severity;
use crate::unit::Operation;

/// Start counts per (region, replica index), shared across attempts.
type StartCounts = Arc<Mutex<HashMap<(String, i64), u32>>>;

/// Dispatcher with every demo workflow registered.
pub fn dispatcher() -> Result<Dispatcher> {
    let mut dispatcher = Dispatcher::new(
        "trellis",
        "Run nested, retryable workflows with an indented execution trace",
    );
    dispatcher.register(provision()?)?.register(build()?)?;
    Ok(dispatcher)
}

/// `provision`: network, then each replica (retryable), then a health check.
pub fn provision() -> Result<Operation> {
    let create_network = Operation::builder(Signature::new(
        "create_network",
        vec![Param::required("region", ParamType::String)],
    )?)
    .template("Creating network in {region}")
    .leaf(|args| Ok(json!(format!("net-{}", args.str("region")?))))?;

    let starts: StartCounts = Arc::default();
    let start_replica = Operation::builder(Signature::new(
        "start_replica",
        vec![
            Param::required("region", ParamType::String),
            Param::required("index", ParamType::Integer),
            Param::optional("fail_first", ParamType::Integer, 0),
        ],
    )?)
    .retryable(true)
    .leaf(move |args| {
        let key = (args.str("region")?.to_string(), args.i64("index")?);
        let fail_first = args.i64("fail_first")?;
        let started = {
            let mut counts = starts
                .lock()
                .map_err(|_| anyhow!("replica start counts poisoned"))?;
            let count = counts.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if i64::from(started) <= fail_first {
            bail!("replica {} in {} did not come up (start #{started})", key.1, key.0);
        }
        Ok(json!(format!("{}-replica-{}", key.0, key.1)))
    })?;

    let health_check = Operation::builder(Signature::new(
        "health_check",
        vec![
            Param::required("region", ParamType::String),
            Param::required("replicas", ParamType::Integer),
        ],
    )?)
    .severity(Severity::Debug)
    .leaf(|args| {
        Ok(json!({
            "region": args.str("region")?,
            "replicas": args.i64("replicas")?,
            "healthy": true,
        }))
    })?;

    let operation = Operation::builder(
        Signature::new(
            "provision",
            vec![
                Param::optional("region", ParamType::String, "us").with_help("Target region"),
                Param::optional("replicas", ParamType::Integer, 2)
                    .with_help("Number of replicas to start"),
                Param::optional("flaky", ParamType::Integer, 0)
                    .with_help("Failed starts per replica before it comes up"),
            ],
        )?
        .with_summary("Provision a network and replicas in a region"),
    )
    .template("Provisioning {replicas} replicas in {region}")
    .sequence(move |args| {
        let region = args.str("region")?;
        let replicas = args.i64("replicas")?;
        if replicas < 0 {
            bail!("replicas must be >= 0 (got {replicas})");
        }
        let flaky = args.i64("flaky")?;
        if flaky < 0 {
            bail!("flaky must be >= 0 (got {flaky})");
        }
        let mut children = vec![create_network.bind(Args::new().arg(region))?];
        for index in 0..replicas {
            children.push(start_replica.bind(
                Args::new()
                    .arg(region)
                    .arg(index)
                    .kwarg("fail_first", flaky),
            )?);
        }
        children.push(health_check.bind(Args::new().arg(region).arg(replicas))?);
        Ok(Sequence::new(children))
    })?;
    Ok(operation)
}

/// `build`: compile each unit in turn, then link; `--keep-going` absorbs
/// failed units.
pub fn build() -> Result<Operation> {
    let compile = Operation::builder(Signature::new(
        "compile",
        vec![
            Param::required("target", ParamType::String),
            Param::required("unit", ParamType::Integer),
            Param::optional("broken", ParamType::Bool, false),
        ],
    )?)
    .formatter(|args| {
        format!(
            "Compiling unit {} ({})",
            args.i64("unit").unwrap_or_default(),
            args.str("target").unwrap_or_default()
        )
    })
    .leaf(|args| {
        if args.bool("broken")? {
            bail!("unit {} failed to compile", args.i64("unit")?);
        }
        Ok(json!(format!("unit{}.o", args.i64("unit")?)))
    })?;

    let link = Operation::builder(Signature::new(
        "link",
        vec![Param::required("target", ParamType::String)],
    )?)
    .template("Linking {target}")
    .leaf(|args| Ok(json!({ "artifact": format!("app-{}", args.str("target")?) })))?;

    let operation = Operation::builder(
        Signature::new(
            "build",
            vec![
                Param::optional("target", ParamType::String, "release"),
                Param::optional("units", ParamType::Integer, 3)
                    .with_help("Number of compilation units"),
                Param::optional("broken_unit", ParamType::Integer, -1)
                    .with_help("Index of a unit that fails to compile"),
                Param::optional("keep_going", ParamType::Bool, false)
                    .with_help("Continue past failed units"),
            ],
        )?
        .with_summary("Compile and link a target"),
    )
    .retryable(true)
    .sequence(move |args| {
        let target = args.str("target")?;
        let broken_unit = args.i64("broken_unit")?;
        let mut children = Vec::new();
        for unit in 0..args.i64("units")? {
            children.push(compile.bind(
                Args::new()
                    .arg(target)
                    .arg(unit)
                    .kwarg("broken", unit == broken_unit),
            )?);
        }
        children.push(link.bind(Args::new().arg(target))?);
        Ok(Sequence::new(children).tolerate_failures(args.bool("keep_going")?))
    })?;
    Ok(operation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address::Address;
    use crate::trace::RecordingSink;

    #[test]
    fn provision_traces_every_step() {
        let unit = provision()
            .expect("op")
            .bind(Args::new().kwarg("region", "eu").kwarg("replicas", 1))
            .expect("bind");
        let sink = RecordingSink::new();
        let value = unit.execute(&sink, 0, &Address::root()).expect("execute");
        assert_eq!(value["region"], json!("eu"));
        assert_eq!(
            sink.lines(),
            vec![
                "Provisioning 1 replicas in eu",
                ".0 Creating network in eu",
                ".0 DONE Creating network in eu",
                ".1 start_replica(region='eu', index=0, fail_first=0)",
                ".1 DONE start_replica(region='eu', index=0, fail_first=0)",
                ".2 health_check(region='eu', replicas=1)",
                ".2 DONE health_check(region='eu', replicas=1)",
                "DONE Provisioning 1 replicas in eu",
            ]
        );
    }

    #[test]
    fn flaky_replicas_recover_with_budget() {
        let unit = provision()
            .expect("op")
            .bind(Args::new().kwarg("replicas", 1).kwarg("flaky", 1))
            .expect("bind");
        let sink = RecordingSink::new();
        unit.execute(&sink, 1, &Address::root()).expect("execute");
        let lines = sink.lines();
        assert!(lines.contains(&".1(1) FAILED start_replica(region='us', index=0, fail_first=1)".to_string()));
        assert!(lines.contains(&".1(2) DONE start_replica(region='us', index=0, fail_first=1)".to_string()));
    }

    #[test]
    fn flaky_replicas_fail_without_budget() {
        let unit = provision()
            .expect("op")
            .bind(Args::new().kwarg("flaky", 1))
            .expect("bind");
        let sink = RecordingSink::new();
        let err = unit.execute(&sink, 0, &Address::root()).unwrap_err();
        assert!(err.to_string().contains("replica 0 in us did not come up"));
        assert_eq!(
            sink.lines().last().map(String::as_str),
            Some("FAILED Provisioning 2 replicas in us")
        );
    }

    #[test]
    fn negative_flaky_is_rejected_before_any_replica_starts() {
        let unit = provision()
            .expect("op")
            .bind(Args::new().kwarg("replicas", 1).kwarg("flaky", -1))
            .expect("bind");
        let sink = RecordingSink::new();
        let err = unit.execute(&sink, 3, &Address::root()).unwrap_err();
        assert_eq!(err.to_string(), "flaky must be >= 0 (got -1)");
        assert_eq!(
            sink.lines(),
            vec![
                "Provisioning 1 replicas in us",
                "FAILED Provisioning 1 replicas in us",
            ]
        );
    }

    #[test]
    fn keep_going_build_links_despite_broken_unit() {
        let unit = build()
            .expect("op")
            .bind(Args::new().kwarg("units", 2).kwarg("broken_unit", 0).kwarg("keep_going", true))
            .expect("bind");
        let sink = RecordingSink::new();
        let value = unit.execute(&sink, 0, &Address::root()).expect("execute");
        assert_eq!(value, json!({ "artifact": "app-release" }));
        let lines = sink.lines();
        assert!(lines.contains(&".0 FAILED Compiling unit 0 (release)".to_string()));
        assert!(lines.contains(&".2 DONE Linking release".to_string()));
    }

    #[test]
    fn broken_build_is_retried_as_a_whole() {
        let unit = build()
            .expect("op")
            .bind(Args::new().kwarg("units", 1).kwarg("broken_unit", 0))
            .expect("bind");
        let sink = RecordingSink::new();
        unit.execute(&sink, 1, &Address::root()).unwrap_err();
        let lines = sink.lines();
        assert!(lines.contains(&"(1) FAILED build(target='release', units=1, broken_unit=0, keep_going=false)".to_string()));
        assert!(lines.contains(&"(2).0 Compiling unit 0 (release)".to_string()));
        assert_eq!(
            lines.last().map(String::as_str),
            Some("(2) FAILED build(target='release', units=1, broken_unit=0, keep_going=false)")
        );
    }
}
