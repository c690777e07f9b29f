//! Whole-unit retry around the driving loop.

use tracing::debug;

use crate::core::address::Address;
use crate::core::resolution::Failure;
use crate::core::signature::BindingError;
use crate::core::value::Value;
use crate::trace::{TraceEvent, TraceSink};
use crate::unit::Unit;

/// Failures that no further attempt can fix.
fn is_terminal(failure: &Failure) -> bool {
    failure.chain().any(|cause| cause.is::<BindingError>())
}

impl Unit {
    /// Drive this unit to its terminal resolution and return it.
    ///
    /// A retryable unit with `attempt_budget = N > 0` gets up to `N` caught
    /// attempts at `address(1)..address(N)`, each failure logged with full
    /// detail, then one final attempt at `address(N+1)` whose failure is the
    /// unit's. Otherwise a single attempt runs at `address` itself. The whole
    /// body, children included, is rebuilt for every attempt.
    pub fn execute(
        mut self,
        sink: &dyn TraceSink,
        attempt_budget: u32,
        address: &Address,
    ) -> Result<Value, Failure> {
        let mut tried = 0u32;
        if self.retryable {
            while tried < attempt_budget {
                tried = tried.saturating_add(1);
                let attempt = address.attempt(tried);
                match self.drive(sink, attempt_budget, &attempt) {
                    Ok(value) => {
                        self.resolution.succeed(value)?;
                        return self.resolution.into_outcome();
                    }
                    Err(failure) if is_terminal(&failure) => {
                        sink.emit(TraceEvent::failed(attempt, self.render(), None));
                        self.resolution.fail(failure)?;
                        return self.resolution.into_outcome();
                    }
                    Err(failure) => {
                        debug!(address = %attempt, tried, attempt_budget, "attempt failed");
                        sink.emit(TraceEvent::failed(
                            attempt,
                            self.render(),
                            Some(format!("{failure:?}")),
                        ));
                    }
                }
            }
        }

        let address = if tried > 0 {
            address.attempt(tried.saturating_add(1))
        } else {
            address.clone()
        };
        match self.drive(sink, attempt_budget, &address) {
            Ok(value) => self.resolution.succeed(value)?,
            Err(failure) => {
                sink.emit(TraceEvent::failed(address, self.render(), None));
                self.resolution.fail(failure)?;
            }
        }
        self.resolution.into_outcome()
    }
}
