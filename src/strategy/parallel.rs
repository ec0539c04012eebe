//! Parallel Batch Parsing
//!
//! Uses Rayon to parse many independent buffers concurrently. Each buffer
//! gets its own engine, telemetry collector, and cancellation flag, so no
//! state is shared across invocations.

use rayon::prelude::*;

use crate::engine::{ParseOutcome, Parser};
use crate::policy::Policy;

/// Parse every buffer under the same policy, in parallel.
pub fn parse_batch(inputs: &[&str], policy: &Policy) -> Vec<ParseOutcome> {
    inputs
        .par_iter()
        .map(|input| Parser::new(policy.clone()).parse(input))
        .collect()
}

/// Parse every buffer with a caller-built engine, in parallel.
///
/// The factory runs once per buffer, so entity tables or custom readers
/// are configured per invocation.
pub fn parse_batch_with<F>(inputs: &[&str], make_parser: F) -> Vec<ParseOutcome>
where
    F: Fn() -> Parser + Sync,
{
    inputs
        .par_iter()
        .map(|input| make_parser().parse(input))
        .collect()
}
