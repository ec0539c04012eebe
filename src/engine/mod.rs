//! Parser Engine
//!
//! Recursive-descent tree builder over an in-memory buffer. Consults the
//! Policy at every structural decision, the EntityResolver at every
//! reference, and feeds the telemetry collector as it goes. Each node moves
//! through: open tag -> attributes -> body (children and character data)
//! -> closing tag. Any error unwinds the whole parse; no partial tree is
//! returned.
//!
//! Every invocation gets a fresh telemetry collector; the cancellation
//! flag is a cloneable per-parser handle checked at each recursive entry
//! and each substitution iteration.

mod attributes;

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::core::entities::{EntityResolver, EntityTable, FsReader, ResourceReader};
use crate::core::sanitize::{sanitize_name, sanitize_text};
use crate::core::scanner::{find_str, Scanner};
use crate::dom::{Document, DocumentNode, NodeId};
use crate::error::ParseError;
use crate::policy::Policy;
use crate::telemetry::{StatsCollector, StatsSnapshot, TimerGuard};

use attributes::scan_attributes;

/// Cooperative cancellation handle, one per parser.
///
/// Cloneable and settable from another thread; takes effect at the next
/// checkpoint (recursive entry or substitution iteration), never
/// mid-instruction.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the parse fails at its next checkpoint.
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::Relaxed)
    }
}

/// Result of a parse invocation: tree or error, plus the telemetry
/// accumulated up to the point the call returned.
#[derive(Debug)]
pub struct ParseOutcome {
    pub result: Result<Document, ParseError>,
    pub stats: StatsSnapshot,
}

/// Configured parsing engine.
///
/// Holds the policy, entity table, injected resource reader, and the
/// cancellation handle. `parse` may be called repeatedly; every call
/// builds its own document and telemetry.
pub struct Parser {
    policy: Policy,
    entities: EntityTable,
    external_entities: bool,
    reader: Box<dyn ResourceReader>,
    cancel: CancelFlag,
}

impl Parser {
    /// Create a parser with the given policy, the default filesystem
    /// reader, and the built-in entity table.
    pub fn new(policy: Policy) -> Self {
        Parser {
            policy,
            entities: EntityTable::new(),
            external_entities: true,
            reader: Box::new(FsReader),
            cancel: CancelFlag::new(),
        }
    }

    /// Replace the resource-reader capability (external entities only).
    pub fn with_reader(mut self, reader: impl ResourceReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    /// Replace the entity table wholesale.
    pub fn with_entities(mut self, entities: EntityTable) -> Self {
        self.entities = entities;
        self
    }

    /// Register a custom entity before parsing.
    pub fn register_entity(&mut self, name: &str, value: &str) {
        self.entities.register(name, value);
    }

    /// Toggle the entity-substitution pass (on by default). When off,
    /// `&...;` spans pass through verbatim and the resolver is never
    /// consulted.
    pub fn set_external_entities(&mut self, enabled: bool) {
        self.external_entities = enabled;
    }

    /// Handle for cancelling an in-flight parse from another thread.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Parse a document from an in-memory buffer.
    ///
    /// The telemetry snapshot is returned on success and on failure; on
    /// failure it reflects whatever had accumulated before the abort.
    pub fn parse(&self, input: &str) -> ParseOutcome {
        debug!(bytes = input.len(), "parsing document");

        let mut stats = StatsCollector::new();
        let elapsed = Cell::new(Duration::ZERO);
        let result = {
            let _timer = TimerGuard::new(&elapsed);
            let mut run = ParseRun {
                policy: &self.policy,
                resolver: EntityResolver::new(
                    &self.entities,
                    &self.policy,
                    self.reader.as_ref(),
                    self.external_entities,
                ),
                cancel: &self.cancel,
                stats: &mut stats,
                doc: Document::new(),
            };
            match run.parse_root(input) {
                Ok(()) => Ok(run.doc),
                Err(e) => Err(e),
            }
        };

        let stats = stats.snapshot(elapsed.get());
        match &result {
            Ok(_) => debug!(
                nodes = stats.total_nodes,
                elapsed_us = stats.parse_time.as_micros() as u64,
                "parse complete"
            ),
            Err(e) => debug!(error = %e, "parse failed"),
        }

        ParseOutcome { result, stats }
    }
}

/// State for one parse invocation.
struct ParseRun<'a> {
    policy: &'a Policy,
    resolver: EntityResolver<'a>,
    cancel: &'a CancelFlag,
    stats: &'a mut StatsCollector,
    doc: Document,
}

/// One span of a node's body, in document order.
enum Piece<'b> {
    /// Character data to entity-resolve and sanitize
    Raw(&'b str),
    /// CDATA literal: sanitized but never entity-resolved
    Cdata(&'b str),
}

impl ParseRun<'_> {
    /// Scan past prolog markup and parse the first element as the root.
    fn parse_root(&mut self, input: &str) -> Result<(), ParseError> {
        if self.cancel.is_cancelled() {
            return Err(ParseError::cancelled());
        }

        let mut scanner = Scanner::new(input);
        while let Some(lt) = scanner.find_tag_start() {
            scanner.seek(lt);
            if scanner.starts_with("<!--") {
                let consumed = self.skip_comment(scanner.remaining())?;
                scanner.advance(consumed);
            } else if scanner.starts_with("<![CDATA[") {
                // character data outside any element carries no node
                if !self.policy.allow_cdata {
                    return Err(ParseError::DisallowedCdata);
                }
                let consumed = skip_cdata(scanner.remaining())?;
                scanner.advance(consumed);
            } else if scanner.starts_with("<!DOCTYPE") {
                if !self.policy.allow_dtd {
                    return Err(ParseError::DisallowedDtd);
                }
                let consumed = skip_doctype(scanner.remaining())?;
                scanner.advance(consumed);
            } else if scanner.starts_with("<?") {
                let consumed = skip_processing_instruction(scanner.remaining())?;
                scanner.advance(consumed);
            } else if scanner.starts_with("</") {
                // stray closing tag before any element: nothing to parse
                break;
            } else {
                match self.parse_element(scanner.remaining(), 0)? {
                    Some((id, _consumed)) => {
                        self.doc.set_root(id);
                        return Ok(());
                    }
                    None => break,
                }
            }
        }
        Ok(())
    }

    /// Parse one element starting at the '<' that opens `input`.
    ///
    /// Returns the created node id and the number of bytes consumed, or
    /// None when the tag at this position is a closing tag (the caller
    /// decides what that means at its level).
    fn parse_element(
        &mut self,
        input: &str,
        depth: usize,
    ) -> Result<Option<(NodeId, usize)>, ParseError> {
        if self.cancel.is_cancelled() {
            return Err(ParseError::cancelled());
        }
        if depth > self.policy.max_depth {
            return Err(ParseError::MaxDepthExceeded(depth));
        }

        let scanner = Scanner::new(input);
        let tag_end = scanner
            .find_tag_end_quoted()
            .ok_or_else(|| ParseError::InvalidSyntax("unclosed tag".into()))?;
        let tag_content = &input[1..tag_end];

        if tag_content.starts_with('/') {
            return Ok(None);
        }

        let self_closing = tag_content.ends_with('/');
        let body = if self_closing {
            &tag_content[..tag_content.len() - 1]
        } else {
            tag_content
        };

        let (raw_name, attr_span) = match body.find(|c: char| c.is_whitespace()) {
            Some(ws) => (&body[..ws], &body[ws + 1..]),
            None => (body, ""),
        };
        let name = sanitize_name(raw_name).into_owned();

        self.stats.record_node(depth);
        if !self.policy.is_tag_allowed(&name) {
            return Err(ParseError::DisallowedTag(name));
        }
        self.stats.record_tag(&name);

        let mut node = DocumentNode::new(&name, depth);
        self.parse_attributes(&mut node, attr_span)?;
        let id = self.doc.push_node(node);

        if self_closing {
            return Ok(Some((id, tag_end + 1)));
        }

        let content_start = tag_end + 1;
        let closing = format!("</{}>", name);
        let close_rel = find_str(&input[content_start..], &closing).ok_or_else(|| {
            ParseError::InvalidSyntax(format!("missing closing tag for <{name}>"))
        })?;

        let inner = &input[content_start..content_start + close_rel];
        self.parse_body(id, &name, inner, depth)?;

        Ok(Some((id, content_start + close_rel + closing.len())))
    }

    /// Process one raw attribute list, left to right, into `node`.
    fn parse_attributes(
        &mut self,
        node: &mut DocumentNode,
        span: &str,
    ) -> Result<(), ParseError> {
        for raw in scan_attributes(span) {
            if node.attribute_count() >= self.policy.max_attributes {
                return Err(ParseError::MaxAttributesExceeded(node.name.clone()));
            }

            let attr_name = sanitize_name(raw.name).into_owned();
            if !self.policy.is_attribute_allowed(&attr_name) {
                return Err(ParseError::DisallowedAttribute(attr_name));
            }

            let value = self.resolver.substitute(raw.value, self.cancel)?;
            let value = sanitize_text(&value).into_owned();

            self.stats.record_attribute(&attr_name);
            node.set_attribute(attr_name, value);
        }
        Ok(())
    }

    /// Segment a node's inner span into character data, CDATA, comments,
    /// and child elements; harvest the children and assemble the node's
    /// own text.
    fn parse_body(
        &mut self,
        id: NodeId,
        name: &str,
        inner: &str,
        depth: usize,
    ) -> Result<(), ParseError> {
        let mut pieces: Vec<Piece<'_>> = Vec::new();
        let mut scanner = Scanner::new(inner);

        loop {
            let pos = scanner.position();
            let lt = match scanner.find_tag_start() {
                None => {
                    if pos < inner.len() {
                        pieces.push(Piece::Raw(&inner[pos..]));
                    }
                    break;
                }
                Some(lt) => lt,
            };
            if lt > pos {
                pieces.push(Piece::Raw(&inner[pos..lt]));
            }
            scanner.seek(lt);

            if scanner.starts_with("<!--") {
                let consumed = self.skip_comment(scanner.remaining())?;
                scanner.advance(consumed);
            } else if scanner.starts_with("<![CDATA[") {
                if self.cancel.is_cancelled() {
                    return Err(ParseError::cancelled());
                }
                if !self.policy.allow_cdata {
                    return Err(ParseError::DisallowedCdata);
                }
                let rest = scanner.remaining();
                let end = find_str(rest, "]]>").ok_or_else(|| {
                    ParseError::InvalidSyntax("unterminated CDATA section".into())
                })?;
                pieces.push(Piece::Cdata(&rest["<![CDATA[".len()..end]));
                scanner.advance(end + "]]>".len());
            } else if scanner.starts_with("</") {
                // unexpected closing tag: harvesting ends at this level
                break;
            } else {
                let child_count = self.doc.get(id).map_or(0, |n| n.children.len());
                if child_count >= self.policy.max_children {
                    return Err(ParseError::MaxChildrenExceeded(name.to_string()));
                }
                match self.parse_element(scanner.remaining(), depth + 1)? {
                    Some((child, consumed)) => {
                        self.doc.attach(id, child)?;
                        scanner.advance(consumed);
                    }
                    None => break,
                }
            }
        }

        // Length limit applies before entity resolution and sanitization
        let raw_len: usize = pieces
            .iter()
            .map(|p| match p {
                Piece::Raw(s) | Piece::Cdata(s) => s.len(),
            })
            .sum();
        if raw_len > self.policy.max_text_length {
            return Err(ParseError::MaxTextLengthExceeded(raw_len));
        }

        let mut text = String::with_capacity(raw_len);
        for piece in pieces {
            match piece {
                Piece::Raw(s) => {
                    let resolved = self.resolver.substitute(s, self.cancel)?;
                    text.push_str(&sanitize_text(&resolved));
                }
                Piece::Cdata(s) => text.push_str(&sanitize_text(s)),
            }
        }

        self.stats.record_text(text.len());
        if let Some(node) = self.doc.get_mut(id) {
            node.text = text;
        }
        Ok(())
    }

    /// Skip a `<!-- -->` span, gated by the comment policy.
    fn skip_comment(&self, rest: &str) -> Result<usize, ParseError> {
        if !self.policy.allow_comments {
            return Err(ParseError::DisallowedComment);
        }
        match find_str(rest, "-->") {
            Some(end) => Ok(end + "-->".len()),
            None => Err(ParseError::InvalidSyntax("unterminated comment".into())),
        }
    }
}

/// Skip a `<![CDATA[ ]]>` span (prolog position, content discarded).
fn skip_cdata(rest: &str) -> Result<usize, ParseError> {
    match find_str(rest, "]]>") {
        Some(end) => Ok(end + "]]>".len()),
        None => Err(ParseError::InvalidSyntax(
            "unterminated CDATA section".into(),
        )),
    }
}

/// Skip a DOCTYPE declaration, including an internal subset if present.
fn skip_doctype(rest: &str) -> Result<usize, ParseError> {
    let gt = find_str(rest, ">")
        .ok_or_else(|| ParseError::InvalidSyntax("unterminated DOCTYPE".into()))?;
    match find_str(rest, "[") {
        Some(bracket) if bracket < gt => {
            let end = find_str(rest, "]>")
                .ok_or_else(|| ParseError::InvalidSyntax("unterminated DOCTYPE".into()))?;
            Ok(end + "]>".len())
        }
        _ => Ok(gt + 1),
    }
}

/// Skip a `<? ?>` processing instruction or XML declaration.
fn skip_processing_instruction(rest: &str) -> Result<usize, ParseError> {
    match find_str(rest, "?>") {
        Some(end) => Ok(end + "?>".len()),
        None => Err(ParseError::InvalidSyntax(
            "unterminated processing instruction".into(),
        )),
    }
}
