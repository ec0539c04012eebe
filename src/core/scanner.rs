//! SIMD-accelerated markup scanning using memchr
//!
//! Uses the memchr crate for fast byte searching with SIMD acceleration,
//! plus memmem for literal substring searches (closing tags, comment and
//! CDATA terminators).

use memchr::{memchr, memmem};

/// Scanner for markup delimiter detection over a text span.
///
/// Positions are byte offsets; all searched delimiters are ASCII, so every
/// returned offset is a valid UTF-8 boundary for slicing.
pub struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner for the given input
    #[inline]
    pub fn new(input: &'a str) -> Self {
        Scanner { input, pos: 0 }
    }

    /// Get the current position
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get remaining input (borrows the input, not the scanner)
    #[inline]
    pub fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Advance by n bytes
    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    /// Jump to an absolute position
    #[inline]
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Find next '<' (tag start) from the current position, as an absolute
    /// offset
    #[inline]
    pub fn find_tag_start(&self) -> Option<usize> {
        memchr(b'<', self.remaining().as_bytes()).map(|i| self.pos + i)
    }

    /// Find the '>' closing the markup starting at the current position,
    /// skipping '>' inside quoted attribute values
    pub fn find_tag_end_quoted(&self) -> Option<usize> {
        let bytes = self.input.as_bytes();
        let mut pos = self.pos;
        let mut in_single_quote = false;
        let mut in_double_quote = false;

        while pos < bytes.len() {
            match bytes[pos] {
                b'"' if !in_single_quote => in_double_quote = !in_double_quote,
                b'\'' if !in_double_quote => in_single_quote = !in_single_quote,
                b'>' if !in_single_quote && !in_double_quote => return Some(pos),
                _ => {}
            }
            pos += 1;
        }
        None
    }

    /// Check if input starts with the given prefix at the current position
    #[inline]
    pub fn starts_with(&self, needle: &str) -> bool {
        self.remaining().starts_with(needle)
    }
}

/// Find a literal substring within a span
#[inline]
pub fn find_str(haystack: &str, needle: &str) -> Option<usize> {
    memmem::find(haystack.as_bytes(), needle.as_bytes())
}
