//! DOM Module - arena-based document tree
//!
//! - Arena allocation for nodes, NodeId (u32) indices
//! - Parent back-references as plain indices (relation, not ownership)
//! - Cycle-checked attachment
//! - Markup renderer for diagnostics and round-trip tests

pub mod document;
pub mod node;

pub use document::Document;
pub use node::{DocumentNode, NodeId};
