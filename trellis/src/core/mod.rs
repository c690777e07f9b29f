//! Deterministic building blocks of the execution engine.
//!
//! Core modules are free of I/O. They describe operations, bind and render
//! their arguments, address units in the trace, and hold resolutions.

pub mod address;
pub mod display;
pub mod resolution;
pub mod signature;
pub mod step;
pub mod value;
