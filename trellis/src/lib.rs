//! Hierarchical, retryable units of work with an indented execution trace.
//!
//! An operation is written as an explicit state machine ([`core::step::Body`])
//! that may suspend on child units of work and receives each child's value
//! or failure back at that point. Units are retried as a whole, and every
//! start, completion, and failure is reported as a trace line addressed by
//! the unit's position in the tree (`.0.2(1).1`).
//!
//! - **[`core`]**: Pure building blocks (signatures, rendering, addresses,
//!   resolution slots, the body contract).
//! - **[`unit`]**, **[`drive`]**, **[`retry`]**: Operations, the driving loop,
//!   and the retry controller.
//! - **[`trace`]**: Trace events and sinks.
//! - **[`dispatch`]**, **[`config`]**, **[`logging`]**: Command-line surface
//!   used by the `trellis` binary.

pub mod config;
pub mod core;
pub mod demo;
pub mod dispatch;
pub mod drive;
pub mod exit_codes;
pub mod logging;
pub mod retry;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod trace;
pub mod unit;
