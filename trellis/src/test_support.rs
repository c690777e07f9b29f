//! Test-only helpers for building scripted operations.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::anyhow;

use crate::core::signature::{Args, Signature};
use crate::core::step::Sequence;
use crate::core::value::Value;
use crate::unit::Operation;

fn no_params(name: &str) -> Signature {
    Signature::new(name, Vec::new()).expect("signature")
}

/// Operation failing on its first `failures` runs, then returning the run
/// number. The counter sees every run across attempts.
pub fn flaky(name: &str, failures: u32, retryable: bool) -> (Operation, Arc<AtomicU32>) {
    let runs = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&runs);
    let op = Operation::builder(no_params(name))
        .retryable(retryable)
        .leaf(move |_| {
            let run = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if run <= failures {
                Err(anyhow!("failure #{run}"))
            } else {
                Ok(Value::from(run))
            }
        })
        .expect("flaky op");
    (op, runs)
}

/// Operation that always succeeds with `value`.
pub fn always_ok(name: &str, value: Value) -> Operation {
    Operation::builder(no_params(name))
        .leaf(move |_| Ok(value.clone()))
        .expect("ok op")
}

/// Operation that always fails with `message`.
pub fn always_fail(name: &str, message: &str) -> Operation {
    let message = message.to_string();
    Operation::builder(no_params(name))
        .leaf(move |_| Err(anyhow!(message.clone())))
        .expect("failing op")
}

/// Parameterless sequence over `children`, rebuilt on every attempt.
pub fn sequence_of(
    name: &str,
    children: Vec<Operation>,
    tolerate_failures: bool,
    retryable: bool,
) -> Operation {
    Operation::builder(no_params(name))
        .retryable(retryable)
        .sequence(move |_| {
            let units = children
                .iter()
                .map(|child| child.bind(Args::new()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Sequence::new(units).tolerate_failures(tolerate_failures))
        })
        .expect("sequence op")
}
