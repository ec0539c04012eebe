//! Path Queries
//!
//! Minimal single-result lookup: a `/`-delimited sequence of tag names,
//! descended first-match at each step, returning the final node's text.
//! Not a general query language.
//!
//! Compiled paths are cached in an LRU cache so repeated lookups skip the
//! split step.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::dom::{Document, NodeId};

/// A pre-split path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPath {
    segments: Vec<String>,
}

impl CompiledPath {
    /// Compile a `/`-delimited path; empty segments are ignored, so
    /// `a/b`, `/a/b/` and `a//b` are equivalent.
    pub fn compile(path: &str) -> Self {
        CompiledPath {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Descend from `start` matching children by name at each step.
    /// Returns the final node's text, or an empty string on any miss.
    pub fn evaluate(&self, doc: &Document, start: NodeId) -> String {
        let mut current = start;
        for segment in &self.segments {
            let next = doc.get(current).and_then(|node| {
                node.children
                    .iter()
                    .copied()
                    .find(|&c| doc.get(c).is_some_and(|n| n.name == *segment))
            });
            match next {
                Some(id) => current = id,
                None => return String::new(),
            }
        }
        doc.get(current).map_or_else(String::new, |n| n.text.clone())
    }
}

/// LRU cache of compiled paths keyed by their source string.
pub struct PathCache {
    cache: LruCache<String, CompiledPath>,
}

impl PathCache {
    /// Create a cache bounded to `capacity` compiled paths.
    pub fn new(capacity: NonZeroUsize) -> Self {
        PathCache {
            cache: LruCache::new(capacity),
        }
    }

    /// Evaluate `path` from `start`, compiling on first sight.
    pub fn value_at(&mut self, doc: &Document, start: NodeId, path: &str) -> String {
        if let Some(compiled) = self.cache.get(path) {
            return compiled.evaluate(doc, start);
        }
        let compiled = CompiledPath::compile(path);
        let result = compiled.evaluate(doc, start);
        self.cache.put(path.to_string(), compiled);
        result
    }

    /// Number of cached paths.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for PathCache {
    fn default() -> Self {
        // capacity chosen to cover typical query working sets
        PathCache::new(NonZeroUsize::new(64).unwrap_or(NonZeroUsize::MIN))
    }
}

/// One-shot uncached lookup from the document root.
pub fn value_at(doc: &Document, path: &str) -> String {
    match doc.root() {
        Some(root) => CompiledPath::compile(path).evaluate(doc, root),
        None => String::new(),
    }
}
