//! XmlWard - Hardened markup parsing with policy enforcement
//!
//! Parses untrusted markup into a bounded document tree:
//! - Policy: allow-lists and structural limits consulted at every decision
//! - Sanitizer: reserved-character escaping, name filtering
//! - Entity resolver: built-in, custom, and gated external (SYSTEM)
//!   entities; each reference expanded exactly once
//! - Telemetry: per-parse counters with a scope-guaranteed duration
//! - Engine: recursive-descent tree builder with cooperative cancellation
//!
//! Every violation is a typed [`ParseError`] that aborts the whole parse;
//! no partial tree is ever returned.
//!
//! ```
//! use xmlward::{Parser, Policy};
//!
//! let parser = Parser::new(Policy::new().with_max_depth(8));
//! let outcome = parser.parse("<note to=\"it\">&lt;hi&gt;</note>");
//! let doc = outcome.result.unwrap();
//! let root = doc.root().unwrap();
//! assert_eq!(doc.get(root).unwrap().name, "note");
//! assert_eq!(outcome.stats.total_nodes, 1);
//! ```

mod core;
mod dom;
mod engine;
mod error;
mod policy;
mod query;
mod strategy;
mod telemetry;

pub use crate::core::entities::{EntityTable, FsReader, ResourceReader};
pub use crate::core::sanitize::{sanitize_name, sanitize_text};
pub use dom::{Document, DocumentNode, NodeId};
pub use engine::{CancelFlag, ParseOutcome, Parser};
pub use error::ParseError;
pub use policy::Policy;
pub use query::{value_at, CompiledPath, PathCache};
pub use strategy::{parse_batch, parse_batch_with};
pub use telemetry::StatsSnapshot;

#[cfg(test)]
mod tests {
    //! End-to-end checks over the public API.

    use super::*;

    fn parse(input: &str) -> Document {
        Parser::new(Policy::new())
            .parse(input)
            .result
            .expect("document should parse")
    }

    /// Collect (name, attributes, text) triples in pre-order for
    /// structural comparison.
    fn shape(doc: &Document) -> Vec<(String, Vec<(String, String)>, String)> {
        fn walk(
            doc: &Document,
            id: NodeId,
            out: &mut Vec<(String, Vec<(String, String)>, String)>,
        ) {
            let node = doc.get(id).unwrap();
            out.push((
                node.name.clone(),
                node.attributes()
                    .map(|(n, v)| (n.to_string(), v.to_string()))
                    .collect(),
                node.text.clone(),
            ));
            for &child in &node.children {
                walk(doc, child, out);
            }
        }
        let mut out = Vec::new();
        if let Some(root) = doc.root() {
            walk(doc, root, &mut out);
        }
        out
    }

    #[test]
    fn test_render_reparse_round_trip() {
        let original = parse(
            "<catalog version=\"2\"><item id=\"a\">first &amp; foremost</item>\
             <item id=\"b\"><note/>tail</item></catalog>",
        );
        let rendered = original.render_root();
        let reparsed = parse(&rendered);

        assert_eq!(shape(&original), shape(&reparsed));
        // a second round trip is a fixed point
        assert_eq!(rendered, reparsed.render_root());
    }

    #[test]
    fn test_rendered_output_never_leaks_markup() {
        let doc = parse("<t a=\"&lt;x&gt;\">&lt;script&gt;</t>");
        let rendered = doc.render_root();
        assert!(!rendered.contains("<script>"));
        assert!(!rendered.contains("<x>"));
        assert!(rendered.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_path_query_over_parsed_tree() {
        let doc = parse(
            "<config><server><host>localhost</host><port>8080</port></server></config>",
        );
        assert_eq!(value_at(&doc, "server/host"), "localhost");
        assert_eq!(value_at(&doc, "server/port"), "8080");
        assert_eq!(value_at(&doc, "server/missing"), "");
    }

    #[test]
    fn test_cancellation_from_another_thread() {
        let parser = Parser::new(Policy::new());
        let flag = parser.cancel_flag();

        let handle = std::thread::spawn(move || flag.cancel());
        handle.join().expect("cancel thread");

        let outcome = parser.parse("<root><a/></root>");
        assert!(matches!(
            outcome.result,
            Err(ParseError::InvalidSyntax(_))
        ));
    }

    #[test]
    fn test_concurrent_independent_parses() {
        let results = parse_batch(
            &["<a>1</a>"; 8],
            &Policy::new().with_max_children(4),
        );
        assert_eq!(results.len(), 8);
        for outcome in results {
            assert_eq!(outcome.stats.total_nodes, 1);
            assert!(outcome.result.is_ok());
        }
    }

    #[test]
    fn test_telemetry_duration_recorded_on_error() {
        let outcome = Parser::new(Policy::new()).parse("<broken");
        assert!(outcome.result.is_err());
        // the scope guard stamps the duration on the error path too
        assert!(outcome.stats.parse_time > std::time::Duration::ZERO);
    }
}
