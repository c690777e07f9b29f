//! Step-wise contract of a suspendable operation body.
//!
//! A body is an explicit state machine. The driving loop calls
//! [`Body::start`] once, then either [`Body::resume`] with the value of the
//! child it last yielded or [`Body::resume_failure`] with that child's
//! failure, until the body completes.

use std::collections::VecDeque;

use crate::core::resolution::Failure;
use crate::core::value::Value;
use crate::unit::Unit;

/// Result of advancing a body by one step.
#[derive(Debug)]
pub enum Step {
    /// Suspend on a child unit of work.
    Yield(Unit),
    /// Finished with a value.
    Complete(Value),
}

/// Input carried by one advance.
#[derive(Debug)]
pub enum Input {
    Start,
    Value(Value),
    Failure(Failure),
}

pub trait Body {
    fn start(&mut self) -> Result<Step, Failure>;

    fn resume(&mut self, value: Value) -> Result<Step, Failure>;

    /// Observe a failed child at the current suspension point.
    ///
    /// The default re-raises it, failing the whole body.
    fn resume_failure(&mut self, failure: Failure) -> Result<Step, Failure> {
        Err(failure)
    }
}

/// Advance `body` with `input`, dispatching to the matching transition.
pub fn advance(body: &mut dyn Body, input: Input) -> Result<Step, Failure> {
    match input {
        Input::Start => body.start(),
        Input::Value(value) => body.resume(value),
        Input::Failure(failure) => body.resume_failure(failure),
    }
}

/// Body backed by a closure over [`Input`].
pub struct FnBody<F>(F);

impl<F> FnBody<F>
where
    F: FnMut(Input) -> Result<Step, Failure>,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Body for FnBody<F>
where
    F: FnMut(Input) -> Result<Step, Failure>,
{
    fn start(&mut self) -> Result<Step, Failure> {
        (self.0)(Input::Start)
    }

    fn resume(&mut self, value: Value) -> Result<Step, Failure> {
        (self.0)(Input::Value(value))
    }

    fn resume_failure(&mut self, failure: Failure) -> Result<Step, Failure> {
        (self.0)(Input::Failure(failure))
    }
}

/// Body with no children: completes on its first step.
pub struct Leaf<F> {
    run: Option<F>,
}

impl<F> Leaf<F>
where
    F: FnOnce() -> Result<Value, Failure>,
{
    pub fn new(run: F) -> Self {
        Self { run: Some(run) }
    }
}

impl<F> Body for Leaf<F>
where
    F: FnOnce() -> Result<Value, Failure>,
{
    fn start(&mut self) -> Result<Step, Failure> {
        let run = self
            .run
            .take()
            .ok_or_else(|| anyhow::anyhow!("leaf body started twice"))?;
        run().map(Step::Complete)
    }

    fn resume(&mut self, _value: Value) -> Result<Step, Failure> {
        Err(anyhow::anyhow!("leaf body never suspends"))
    }
}

/// Runs children in order and completes with the last child's value.
///
/// With `tolerate_failures`, a failed child is absorbed (its value counts as
/// `null`) and the sequence moves on to the next child.
pub struct Sequence {
    pending: VecDeque<Unit>,
    tolerate_failures: bool,
    last: Value,
}

impl Sequence {
    pub fn new(children: impl IntoIterator<Item = Unit>) -> Self {
        Self {
            pending: children.into_iter().collect(),
            tolerate_failures: false,
            last: Value::Null,
        }
    }

    pub fn tolerate_failures(mut self, tolerate: bool) -> Self {
        self.tolerate_failures = tolerate;
        self
    }

    fn next(&mut self) -> Step {
        match self.pending.pop_front() {
            Some(child) => Step::Yield(child),
            None => Step::Complete(std::mem::take(&mut self.last)),
        }
    }
}

impl Body for Sequence {
    fn start(&mut self) -> Result<Step, Failure> {
        Ok(self.next())
    }

    fn resume(&mut self, value: Value) -> Result<Step, Failure> {
        self.last = value;
        Ok(self.next())
    }

    fn resume_failure(&mut self, failure: Failure) -> Result<Step, Failure> {
        if !self.tolerate_failures {
            return Err(failure);
        }
        self.last = Value::Null;
        Ok(self.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;

    #[test]
    fn leaf_completes_on_start() {
        let mut leaf = Leaf::new(|| Ok(json!(7)));
        assert!(matches!(leaf.start(), Ok(Step::Complete(v)) if v == json!(7)));
        assert!(leaf.start().is_err());
    }

    #[test]
    fn default_resume_failure_reraises() {
        let mut leaf = Leaf::new(|| Ok(Value::Null));
        let err = advance(&mut leaf, Input::Failure(anyhow!("child broke"))).unwrap_err();
        assert_eq!(err.to_string(), "child broke");
    }

    #[test]
    fn empty_sequence_completes_with_null() {
        let mut seq = Sequence::new(Vec::new());
        assert!(matches!(seq.start(), Ok(Step::Complete(Value::Null))));
    }

    #[test]
    fn fn_body_sees_every_transition() {
        let mut seen = Vec::new();
        {
            let mut body = FnBody::new(|input| {
                seen.push(match &input {
                    Input::Start => "start",
                    Input::Value(_) => "value",
                    Input::Failure(_) => "failure",
                });
                Ok(Step::Complete(Value::Null))
            });
            advance(&mut body, Input::Start).expect("start");
            advance(&mut body, Input::Value(json!(1))).expect("resume");
            advance(&mut body, Input::Failure(anyhow!("x"))).expect("inject");
        }
        assert_eq!(seen, vec!["start", "value", "failure"]);
    }
}
