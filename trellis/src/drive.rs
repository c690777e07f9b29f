//! Trampoline that steps one attempt of a unit's body to completion.

use tracing::trace;

use crate::core::address::Address;
use crate::core::resolution::Failure;
use crate::core::step::{Input, Step, advance};
use crate::core::value::Value;
use crate::trace::{TraceEvent, TraceSink};
use crate::unit::Unit;

impl Unit {
    /// Run one attempt of this unit at `address`.
    ///
    /// Emits the start line, then advances a fresh body until it completes,
    /// executing each yielded child at `address.<n>` (numbered from 0 in
    /// request order, whatever the child's outcome) and feeding its value or
    /// failure back in. A body that fails emits no DONE line.
    pub(crate) fn drive(
        &self,
        sink: &dyn TraceSink,
        attempt_budget: u32,
        address: &Address,
    ) -> Result<Value, Failure> {
        let text = self.render();
        sink.emit(TraceEvent::start(self.severity, address.clone(), text.clone()));

        let mut body = self.instantiate()?;
        let mut input = Input::Start;
        let mut child_count = 0usize;
        loop {
            match advance(body.as_mut(), input)? {
                Step::Yield(child) => {
                    let child_address = address.child(child_count);
                    child_count += 1;
                    input = match child.execute(sink, attempt_budget, &child_address) {
                        Ok(value) => Input::Value(value),
                        Err(failure) => {
                            trace!(address = %child_address, "injecting child failure");
                            Input::Failure(failure)
                        }
                    };
                }
                Step::Complete(value) => {
                    sink.emit(TraceEvent::done(address.clone(), text));
                    return Ok(value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::signature::{Args, Param, ParamType, Signature};
    use crate::core::step::{FnBody, Sequence};
    use crate::trace::{RecordingSink, TraceKind};
    use crate::unit::Operation;
    use anyhow::{anyhow, bail};
    use serde_json::json;

    fn leaf(name: &str, result: Result<i64, &'static str>) -> Operation {
        Operation::builder(Signature::new(name, Vec::new()).expect("signature"))
            .leaf(move |_| match result {
                Ok(v) => Ok(json!(v)),
                Err(msg) => Err(anyhow!(msg)),
            })
            .expect("op")
    }

    #[test]
    fn children_are_numbered_in_request_order() {
        let a = leaf("a", Ok(1));
        let b = leaf("b", Ok(2));
        let parent = Operation::builder(Signature::new("parent", Vec::new()).expect("sig"))
            .sequence(move |_| {
                Ok(Sequence::new(vec![
                    a.bind(Args::new())?,
                    b.bind(Args::new())?,
                ]))
            })
            .expect("op");

        let sink = RecordingSink::new();
        let unit = parent.bind(Args::new()).expect("bind");
        let value = unit
            .drive(&sink, 0, &Address::root().child(4))
            .expect("drive");

        assert_eq!(value, json!(2));
        assert_eq!(
            sink.lines(),
            vec![
                ".4 parent()",
                ".4.0 a()",
                ".4.0 DONE a()",
                ".4.1 b()",
                ".4.1 DONE b()",
                ".4 DONE parent()",
            ]
        );
    }

    #[test]
    fn failing_body_emits_no_done_line() {
        let unit = leaf("boom", Err("nope")).bind(Args::new()).expect("bind");
        let sink = RecordingSink::new();
        let err = unit.drive(&sink, 0, &Address::root()).unwrap_err();
        assert_eq!(err.to_string(), "nope");
        let kinds: Vec<TraceKind> = sink.events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![TraceKind::Start]);
    }

    #[test]
    fn injected_failure_reaches_body_at_suspension_point() {
        let child = leaf("child", Err("child failed"));
        let op = Operation::builder(
            Signature::new("catcher", vec![Param::optional("n", ParamType::Integer, 0)])
                .expect("sig"),
        )
        .body(move |_| {
            let child = child.clone();
            let mut yielded = false;
            Ok(FnBody::new(move |input| match input {
                Input::Start if !yielded => {
                    yielded = true;
                    Ok(Step::Yield(child.bind(Args::new())?))
                }
                Input::Failure(err) => Ok(Step::Complete(json!(format!("caught: {err}")))),
                _ => bail!("unexpected input"),
            }))
        })
        .expect("op");

        let sink = RecordingSink::new();
        let value = op
            .bind(Args::new())
            .expect("bind")
            .drive(&sink, 0, &Address::root())
            .expect("drive");
        assert_eq!(value, json!("caught: child failed"));
        assert!(sink.lines().contains(&".0 FAILED child()".to_string()));
    }
}
