//! Text and Name Sanitization
//!
//! Pure transformation functions applied to every stored string:
//! - sanitize_text: escape reserved markup characters, drop non-printable
//!   bytes (keeping `\n` `\r` `\t` and non-ASCII UTF-8)
//! - sanitize_name: retain only name characters `[A-Za-z0-9_:-]`
//!
//! Both are total: they never fail, only transform. Uses Cow for zero-copy
//! when no transformation is needed.

use std::borrow::Cow;

/// Escape reserved markup characters and drop non-printable ones.
///
/// Returns Borrowed when the input needs no transformation (zero-copy).
pub fn sanitize_text(input: &str) -> Cow<'_, str> {
    // Fast path: nothing to escape or drop
    if !input
        .chars()
        .any(|c| is_reserved(c) || is_dropped(c))
    {
        return Cow::Borrowed(input);
    }

    let mut result = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            c if is_dropped(c) => {}
            c => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Retain only valid name characters, silently dropping the rest.
///
/// No error is raised for dropped characters; a hostile name simply
/// shrinks, possibly to empty.
pub fn sanitize_name(input: &str) -> Cow<'_, str> {
    if input.chars().all(is_name_char) {
        return Cow::Borrowed(input);
    }
    Cow::Owned(input.chars().filter(|&c| is_name_char(c)).collect())
}

/// Reserved markup characters that must be escaped in stored text
#[inline]
fn is_reserved(c: char) -> bool {
    matches!(c, '<' | '>' | '&' | '"' | '\'')
}

/// Characters dropped from text: ASCII controls other than tab/newline/CR.
/// Non-ASCII passes through untouched.
#[inline]
fn is_dropped(c: char) -> bool {
    c.is_ascii_control() && !matches!(c, '\n' | '\r' | '\t')
}

/// Check if a character is valid in a sanitized tag or attribute name
#[inline]
pub fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':')
}
