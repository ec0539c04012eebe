//! Entity Table and Resolution
//!
//! Maps entity names to replacement text:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Custom entities registered by the caller (sanitized on insertion)
//! - External (SYSTEM) entities read through an injected ResourceReader,
//!   gated by Policy::allow_dtd and the resolver's external-entity switch
//!
//! Substitution replaces each `&...;` occurrence exactly once, left to
//! right, and never re-scans substituted output: expansion bombs are
//! impossible by construction.

use std::collections::HashMap;
use std::io;

use memchr::memchr;
use tracing::trace;

use crate::core::sanitize::{sanitize_name, sanitize_text};
use crate::engine::CancelFlag;
use crate::error::ParseError;
use crate::policy::Policy;

/// Capability for reading external entity resources.
///
/// Injected into the resolver so that disabling DTD processing provably
/// removes all external I/O from the parse path, and so tests can
/// substitute fakes.
pub trait ResourceReader: Send + Sync {
    fn read(&self, locator: &str) -> io::Result<String>;
}

/// Default reader backed by the filesystem.
#[derive(Debug, Default)]
pub struct FsReader;

impl ResourceReader for FsReader {
    fn read(&self, locator: &str) -> io::Result<String> {
        std::fs::read_to_string(locator)
    }
}

/// Named entity replacements, pre-seeded with the five built-ins.
#[derive(Debug, Clone)]
pub struct EntityTable {
    entries: HashMap<String, String>,
}

impl Default for EntityTable {
    fn default() -> Self {
        let mut entries = HashMap::new();
        entries.insert("lt".into(), "<".into());
        entries.insert("gt".into(), ">".into());
        entries.insert("amp".into(), "&".into());
        entries.insert("quot".into(), "\"".into());
        entries.insert("apos".into(), "'".into());
        EntityTable { entries }
    }
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom entity. Name and value are sanitized on insertion.
    pub fn register(&mut self, name: &str, value: &str) {
        self.entries.insert(
            sanitize_name(name).into_owned(),
            sanitize_text(value).into_owned(),
        );
    }

    /// Look up a replacement by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }
}

/// Per-parse entity resolution context.
///
/// Borrows the table, policy, and reader; owns no state of its own, so a
/// fresh one is cheap to build for every parse invocation.
pub struct EntityResolver<'a> {
    table: &'a EntityTable,
    policy: &'a Policy,
    reader: &'a dyn ResourceReader,
    external_entities: bool,
}

impl<'a> EntityResolver<'a> {
    pub fn new(
        table: &'a EntityTable,
        policy: &'a Policy,
        reader: &'a dyn ResourceReader,
        external_entities: bool,
    ) -> Self {
        EntityResolver {
            table,
            policy,
            reader,
            external_entities,
        }
    }

    /// Resolve a single entity name to its replacement text.
    ///
    /// Built-ins first, then external (SYSTEM) declarations, then the
    /// table; anything else is malformed.
    pub fn resolve(&self, name: &str) -> Result<String, ParseError> {
        match name {
            "lt" => return Ok("<".into()),
            "gt" => return Ok(">".into()),
            "amp" => return Ok("&".into()),
            "quot" => return Ok("\"".into()),
            "apos" => return Ok("'".into()),
            _ => {}
        }

        if name.contains("SYSTEM") {
            return self.resolve_external(name);
        }

        match self.table.get(name) {
            Some(value) => Ok(value.to_string()),
            None => Err(ParseError::MalformedEntity(name.to_string())),
        }
    }

    /// Resolve an external entity declaration by reading the quoted
    /// locator through the injected reader.
    fn resolve_external(&self, decl: &str) -> Result<String, ParseError> {
        if !self.policy.allow_dtd {
            return Err(ParseError::DisallowedDtd);
        }
        if !self.external_entities {
            return Err(ParseError::ExternalEntityNotAllowed);
        }

        let locator = extract_locator(decl)
            .ok_or_else(|| ParseError::MalformedEntity(decl.to_string()))?;

        trace!(locator, "resolving external entity");
        self.reader
            .read(locator)
            .map_err(|e| ParseError::Io(format!("{locator}: {e}")))
    }

    /// Replace every `&...;` span in `text` with its resolution, left to
    /// right, without re-scanning replacements.
    ///
    /// When the external-entity switch is off the input passes through
    /// verbatim and the resolver is never consulted. Cancellation is
    /// checked at every substitution.
    pub fn substitute(&self, text: &str, cancel: &CancelFlag) -> Result<String, ParseError> {
        if !self.external_entities {
            return Ok(text.to_string());
        }

        let bytes = text.as_bytes();
        let mut result = String::with_capacity(text.len());
        let mut pos = 0;

        while pos < bytes.len() {
            match memchr(b'&', &bytes[pos..]) {
                None => {
                    result.push_str(&text[pos..]);
                    break;
                }
                Some(offset) => {
                    if cancel.is_cancelled() {
                        return Err(ParseError::cancelled());
                    }

                    let amp = pos + offset;
                    result.push_str(&text[pos..amp]);

                    match memchr(b';', &bytes[amp + 1..]) {
                        Some(semi_offset) if semi_offset > 0 => {
                            let name = &text[amp + 1..amp + 1 + semi_offset];
                            result.push_str(&self.resolve(name)?);
                            pos = amp + 1 + semi_offset + 1;
                        }
                        // "&;" or a trailing '&' is literal text
                        _ => {
                            result.push('&');
                            pos = amp + 1;
                        }
                    }
                }
            }
        }

        Ok(result)
    }
}

/// Extract the double-quoted resource locator from a SYSTEM declaration
fn extract_locator(decl: &str) -> Option<&str> {
    let system_pos = decl.find("SYSTEM")?;
    let rest = &decl[system_pos + "SYSTEM".len()..];
    let open = rest.find('"')?;
    let after_open = &rest[open + 1..];
    let close = after_open.find('"')?;
    Some(&after_open[..close])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeReader {
        calls: AtomicUsize,
        content: String,
    }

    impl FakeReader {
        fn new(content: &str) -> Self {
            FakeReader {
                calls: AtomicUsize::new(0),
                content: content.to_string(),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::Relaxed)
        }
    }

    impl ResourceReader for FakeReader {
        fn read(&self, _locator: &str) -> io::Result<String> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(self.content.clone())
        }
    }

    struct FailingReader;

    impl ResourceReader for FailingReader {
        fn read(&self, locator: &str) -> io::Result<String> {
            Err(io::Error::new(io::ErrorKind::NotFound, locator.to_string()))
        }
    }

    fn resolver<'a>(
        table: &'a EntityTable,
        policy: &'a Policy,
        reader: &'a dyn ResourceReader,
    ) -> EntityResolver<'a> {
        EntityResolver::new(table, policy, reader, true)
    }

    #[test]
    fn test_builtin_entities() {
        let table = EntityTable::new();
        let policy = Policy::new();
        let reader = FsReader;
        let r = resolver(&table, &policy, &reader);

        assert_eq!(r.resolve("lt").unwrap(), "<");
        assert_eq!(r.resolve("gt").unwrap(), ">");
        assert_eq!(r.resolve("amp").unwrap(), "&");
        assert_eq!(r.resolve("quot").unwrap(), "\"");
        assert_eq!(r.resolve("apos").unwrap(), "'");
    }

    #[test]
    fn test_custom_entity() {
        let mut table = EntityTable::new();
        table.register("company", "Acme Corp");
        let policy = Policy::new();
        let reader = FsReader;
        let r = resolver(&table, &policy, &reader);

        assert_eq!(r.resolve("company").unwrap(), "Acme Corp");
    }

    #[test]
    fn test_registration_sanitizes() {
        let mut table = EntityTable::new();
        table.register("na me!", "<value>");
        assert_eq!(table.get("name"), Some("&lt;value&gt;"));
    }

    #[test]
    fn test_unknown_entity_is_malformed() {
        let table = EntityTable::new();
        let policy = Policy::new();
        let reader = FsReader;
        let r = resolver(&table, &policy, &reader);

        assert!(matches!(
            r.resolve("nope"),
            Err(ParseError::MalformedEntity(_))
        ));
    }

    #[test]
    fn test_system_blocked_without_dtd() {
        let table = EntityTable::new();
        let policy = Policy::new().with_dtd(false);
        let reader = FakeReader::new("secret");
        let r = resolver(&table, &policy, &reader);

        let result = r.resolve("xxe SYSTEM \"/etc/passwd\"");
        assert_eq!(result, Err(ParseError::DisallowedDtd));
        // The reader must never be consulted when DTD processing is off
        assert_eq!(reader.call_count(), 0);
    }

    #[test]
    fn test_system_reads_through_capability() {
        let table = EntityTable::new();
        let policy = Policy::new().with_dtd(true);
        let reader = FakeReader::new("payload");
        let r = resolver(&table, &policy, &reader);

        let result = r.resolve("ext SYSTEM \"data.txt\"").unwrap();
        assert_eq!(result, "payload");
        assert_eq!(reader.call_count(), 1);
    }

    #[test]
    fn test_system_without_switch() {
        let table = EntityTable::new();
        let policy = Policy::new().with_dtd(true);
        let reader = FakeReader::new("payload");
        let r = EntityResolver::new(&table, &policy, &reader, false);

        assert_eq!(
            r.resolve("ext SYSTEM \"data.txt\""),
            Err(ParseError::ExternalEntityNotAllowed)
        );
        assert_eq!(reader.call_count(), 0);
    }

    #[test]
    fn test_system_unreadable_is_io_error() {
        let table = EntityTable::new();
        let policy = Policy::new().with_dtd(true);
        let reader = FailingReader;
        let r = resolver(&table, &policy, &reader);

        assert!(matches!(
            r.resolve("ext SYSTEM \"missing.txt\""),
            Err(ParseError::Io(_))
        ));
    }

    #[test]
    fn test_system_missing_quotes_is_malformed() {
        let table = EntityTable::new();
        let policy = Policy::new().with_dtd(true);
        let reader = FakeReader::new("x");
        let r = resolver(&table, &policy, &reader);

        assert!(matches!(
            r.resolve("ext SYSTEM missing"),
            Err(ParseError::MalformedEntity(_))
        ));
    }

    #[test]
    fn test_substitute_replaces_each_once() {
        let mut table = EntityTable::new();
        // A replacement containing an entity reference must not be
        // re-expanded; insertion sanitizes "&bomb;" to "&amp;bomb;"
        table.register("bomb", "&bomb;");
        let policy = Policy::new();
        let reader = FsReader;
        let r = resolver(&table, &policy, &reader);
        let cancel = CancelFlag::new();

        let result = r.substitute("x &bomb; y", &cancel).unwrap();
        assert_eq!(result, "x &amp;bomb; y");
    }

    #[test]
    fn test_substitute_literal_ampersand() {
        let table = EntityTable::new();
        let policy = Policy::new();
        let reader = FsReader;
        let r = resolver(&table, &policy, &reader);
        let cancel = CancelFlag::new();

        assert_eq!(r.substitute("a &; b", &cancel).unwrap(), "a &; b");
        assert_eq!(r.substitute("trailing &", &cancel).unwrap(), "trailing &");
    }

    #[test]
    fn test_substitute_skipped_when_switch_off() {
        let table = EntityTable::new();
        let policy = Policy::new();
        let reader = FsReader;
        let r = EntityResolver::new(&table, &policy, &reader, false);
        let cancel = CancelFlag::new();

        assert_eq!(r.substitute("&lt;kept&gt;", &cancel).unwrap(), "&lt;kept&gt;");
    }

    #[test]
    fn test_substitute_honors_cancellation() {
        let table = EntityTable::new();
        let policy = Policy::new();
        let reader = FsReader;
        let r = resolver(&table, &policy, &reader);
        let cancel = CancelFlag::new();
        cancel.cancel();

        assert!(r.substitute("&lt;", &cancel).is_err());
    }

    #[test]
    fn test_extract_locator() {
        assert_eq!(
            extract_locator("foo SYSTEM \"file.xml\""),
            Some("file.xml")
        );
        assert_eq!(extract_locator("foo SYSTEM 'file.xml'"), None);
        assert_eq!(extract_locator("foo SYSTEM \"unbalanced"), None);
    }
}
