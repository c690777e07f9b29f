//! One-shot resolution slot of a unit of work.

use thiserror::Error;

use crate::core::value::Value;

/// Failure raised by an operation body, or injected into one.
pub type Failure = anyhow::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("unit of work already resolved")]
    AlreadyResolved,
    #[error("unit of work is still pending")]
    Pending,
}

/// `Pending → Succeeded` or `Pending → Failed`, exactly once.
#[derive(Debug, Default)]
pub enum Resolution {
    #[default]
    Pending,
    Succeeded(Value),
    Failed(Failure),
}

impl Resolution {
    pub fn is_pending(&self) -> bool {
        matches!(self, Resolution::Pending)
    }

    pub fn succeed(&mut self, value: Value) -> Result<(), ResolutionError> {
        self.settle(Resolution::Succeeded(value))
    }

    pub fn fail(&mut self, failure: Failure) -> Result<(), ResolutionError> {
        self.settle(Resolution::Failed(failure))
    }

    fn settle(&mut self, resolved: Resolution) -> Result<(), ResolutionError> {
        if !self.is_pending() {
            return Err(ResolutionError::AlreadyResolved);
        }
        *self = resolved;
        Ok(())
    }

    /// Borrow the settled value; a failed slot yields its failure.
    pub fn value(&self) -> Result<Result<&Value, &Failure>, ResolutionError> {
        match self {
            Resolution::Pending => Err(ResolutionError::Pending),
            Resolution::Succeeded(value) => Ok(Ok(value)),
            Resolution::Failed(failure) => Ok(Err(failure)),
        }
    }

    /// Consume the slot into the outcome observed by the caller.
    pub fn into_outcome(self) -> Result<Value, Failure> {
        match self {
            Resolution::Pending => Err(ResolutionError::Pending.into()),
            Resolution::Succeeded(value) => Ok(value),
            Resolution::Failed(failure) => Err(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;

    #[test]
    fn resolves_exactly_once() {
        let mut slot = Resolution::default();
        slot.succeed(json!(1)).expect("first resolve");
        assert_eq!(slot.succeed(json!(2)), Err(ResolutionError::AlreadyResolved));
        assert_eq!(
            slot.fail(anyhow!("late")),
            Err(ResolutionError::AlreadyResolved)
        );
        assert_eq!(slot.into_outcome().expect("value"), json!(1));
    }

    #[test]
    fn rereading_does_not_change_value() {
        let mut slot = Resolution::default();
        slot.succeed(json!("ok")).expect("resolve");
        let first = slot.value().expect("settled").expect("ok").clone();
        let second = slot.value().expect("settled").expect("ok").clone();
        assert_eq!(first, second);
    }

    #[test]
    fn pending_slot_cannot_be_read() {
        let slot = Resolution::default();
        assert_eq!(slot.value().unwrap_err(), ResolutionError::Pending);
        let err = slot.into_outcome().unwrap_err();
        assert_eq!(
            err.downcast_ref::<ResolutionError>(),
            Some(&ResolutionError::Pending)
        );
    }

    #[test]
    fn failed_slot_surfaces_failure() {
        let mut slot = Resolution::default();
        slot.fail(anyhow!("boom")).expect("resolve");
        assert_eq!(slot.into_outcome().unwrap_err().to_string(), "boom");
    }
}
