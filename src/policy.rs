//! Parse Policy
//!
//! Immutable-per-parse configuration: allow-lists for tags and attributes
//! plus numeric and boolean limits. Consulted by the engine at every
//! structural decision; never mutated mid-parse.

use std::collections::HashSet;

/// Validation limits and allow-lists applied during a parse.
///
/// An empty allow-list means "allow all". Defaults match the hardened
/// profile: DTD processing off, everything else permissive but bounded.
#[derive(Debug, Clone)]
pub struct Policy {
    allowed_tags: HashSet<String>,
    allowed_attributes: HashSet<String>,
    /// Maximum element nesting depth (root is depth 0).
    pub max_depth: usize,
    /// Maximum number of children per node.
    pub max_children: usize,
    /// Maximum number of attributes per node.
    pub max_attributes: usize,
    /// Maximum pre-sanitization character-data length per node.
    pub max_text_length: usize,
    /// Whether `<!-- -->` sections are permitted.
    pub allow_comments: bool,
    /// Whether `<![CDATA[ ]]>` sections are permitted.
    pub allow_cdata: bool,
    /// Whether DTD machinery (DOCTYPE, SYSTEM entities) is permitted.
    pub allow_dtd: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            allowed_tags: HashSet::new(),
            allowed_attributes: HashSet::new(),
            max_depth: 100,
            max_children: 1000,
            max_attributes: 50,
            max_text_length: 10_000,
            allow_comments: true,
            allow_cdata: true,
            allow_dtd: false,
        }
    }
}

impl Policy {
    /// Create the default hardened policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict parsing to the given tag name (additive).
    pub fn allow_tag(mut self, tag: impl Into<String>) -> Self {
        self.allowed_tags.insert(tag.into());
        self
    }

    /// Restrict parsing to the given attribute name (additive).
    pub fn allow_attribute(mut self, attr: impl Into<String>) -> Self {
        self.allowed_attributes.insert(attr.into());
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_children(mut self, children: usize) -> Self {
        self.max_children = children;
        self
    }

    pub fn with_max_attributes(mut self, attributes: usize) -> Self {
        self.max_attributes = attributes;
        self
    }

    pub fn with_max_text_length(mut self, length: usize) -> Self {
        self.max_text_length = length;
        self
    }

    pub fn with_comments(mut self, allow: bool) -> Self {
        self.allow_comments = allow;
        self
    }

    pub fn with_cdata(mut self, allow: bool) -> Self {
        self.allow_cdata = allow;
        self
    }

    pub fn with_dtd(mut self, allow: bool) -> Self {
        self.allow_dtd = allow;
        self
    }

    /// True when the tag allow-list is empty or contains `tag`.
    #[inline]
    pub fn is_tag_allowed(&self, tag: &str) -> bool {
        self.allowed_tags.is_empty() || self.allowed_tags.contains(tag)
    }

    /// True when the attribute allow-list is empty or contains `attr`.
    #[inline]
    pub fn is_attribute_allowed(&self, attr: &str) -> bool {
        self.allowed_attributes.is_empty() || self.allowed_attributes.contains(attr)
    }
}
