//! Parse Error Taxonomy
//!
//! Closed set of failure kinds for the parsing engine. Every variant aborts
//! the whole parse: there is no local recovery, and no partial tree is ever
//! returned. Callers decide whether to retry with a relaxed policy.

use thiserror::Error;

/// A fatal parse failure.
///
/// Structural errors (`InvalidSyntax`) and policy violations share one
/// taxonomy because both indicate input that must not be processed further.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Malformed markup: unclosed tag, missing closing tag, unterminated
    /// comment/CDATA section, cancellation, or a detected reference cycle.
    #[error("invalid syntax: {0}")]
    InvalidSyntax(String),

    /// Element nesting went past `Policy::max_depth`.
    #[error("maximum nesting depth exceeded at depth {0}")]
    MaxDepthExceeded(usize),

    /// A node would have more than `Policy::max_children` children.
    #[error("maximum number of child nodes exceeded for <{0}>")]
    MaxChildrenExceeded(String),

    /// A tag would have more than `Policy::max_attributes` attributes.
    #[error("maximum number of attributes exceeded for <{0}>")]
    MaxAttributesExceeded(String),

    /// A node's character data exceeds `Policy::max_text_length` before
    /// sanitization.
    #[error("text length {0} exceeds maximum allowed")]
    MaxTextLengthExceeded(usize),

    /// Tag name rejected by the allow-list.
    #[error("tag not allowed: {0}")]
    DisallowedTag(String),

    /// Attribute name rejected by the allow-list.
    #[error("attribute not allowed: {0}")]
    DisallowedAttribute(String),

    /// DTD machinery (DOCTYPE declaration or SYSTEM entity) encountered
    /// while `Policy::allow_dtd` is off.
    #[error("DTD processing is not allowed")]
    DisallowedDtd,

    /// Comment encountered while `Policy::allow_comments` is off.
    #[error("comments are not allowed")]
    DisallowedComment,

    /// CDATA section encountered while `Policy::allow_cdata` is off.
    #[error("CDATA sections are not allowed")]
    DisallowedCdata,

    /// External entity resolution requested while the resolver's
    /// external-entity switch is off.
    #[error("external entity processing is disabled")]
    ExternalEntityNotAllowed,

    /// Entity reference that is neither built-in, declared, nor a
    /// well-formed external declaration.
    #[error("malformed entity: {0}")]
    MalformedEntity(String),

    /// Reading an external entity resource failed.
    #[error("failed to read external entity: {0}")]
    Io(String),
}

impl ParseError {
    /// Structural-error constructor used at cancellation checkpoints.
    pub(crate) fn cancelled() -> Self {
        ParseError::InvalidSyntax("parse cancelled".into())
    }

    /// Structural-error constructor used by the attach-time cycle check.
    pub(crate) fn circular() -> Self {
        ParseError::InvalidSyntax("circular reference detected".into())
    }
}
