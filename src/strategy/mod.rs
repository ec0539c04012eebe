//! Parsing Strategy Module
//!
//! The engine itself is synchronous and single-threaded per invocation;
//! this module layers data parallelism across independent invocations.

pub mod parallel;

pub use parallel::{parse_batch, parse_batch_with};
