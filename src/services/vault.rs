//! Term vault: reversible protection of glossary terms and numeric tokens.
//!
//! Before a unit is handed to a transformation provider, every protected
//! span is swapped for an opaque sentinel token (`__TERM_007__`,
//! `__NUM_002__`). Providers are untrusted, so the vault also verifies
//! which sentinels survived a candidate and the loop gates on the result.
//!
//! Guarantees:
//!
//! - **Round trip**: `restore(protect(t)) == t` for any text and glossary.
//!   Matched spans are stored byte-exact, so original casing comes back
//!   untouched no matter how the term was declared.
//! - **Longest match first**: overlapping terms resolve to the longest
//!   candidate, ties broken by glossary declaration order, so a term that
//!   is a substring of another never corrupts it.
//! - **No silent corruption**: input that already contains sentinel-shaped
//!   text fails protection with a placeholder collision instead of
//!   producing an ambiguous mapping.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Glossary, PlaceholderMap};

// ============================================================================
// Vault
// ============================================================================

/// Pure protect/restore engine for one glossary.
#[derive(Debug, Clone)]
pub struct TermVault {
    glossary: Glossary,
}

impl TermVault {
    /// Build a vault over a glossary.
    pub const fn new(glossary: Glossary) -> Self {
        Self { glossary }
    }

    /// The glossary this vault protects.
    pub const fn glossary(&self) -> &Glossary {
        &self.glossary
    }

    /// Replace protected spans with sentinel tokens.
    ///
    /// Returns the protected text and the scan-ordered placeholder map.
    /// Fails with [`DomainError::PlaceholderCollision`] if the input
    /// already contains sentinel-shaped text.
    pub fn protect(&self, text: &str) -> DomainResult<(String, PlaceholderMap)> {
        if let Some(collision) = find_sentinel(text) {
            return Err(DomainError::PlaceholderCollision(collision));
        }

        let mut spans = collect_term_spans(text, self.glossary.terms());
        if self.glossary.protect_numbers() {
            collect_number_spans(text, &mut spans);
        }
        spans.sort_by_key(|span| span.start);

        let mut protected = String::with_capacity(text.len());
        let mut map = PlaceholderMap::default();
        let mut term_counter = 0usize;
        let mut num_counter = 0usize;
        let mut cursor = 0usize;

        for span in spans {
            let token = match span.category {
                SpanCategory::Term => {
                    let token = format!("__TERM_{term_counter:03}__");
                    term_counter += 1;
                    token
                }
                SpanCategory::Number => {
                    let token = format!("__NUM_{num_counter:03}__");
                    num_counter += 1;
                    token
                }
            };
            protected.push_str(&text[cursor..span.start]);
            protected.push_str(&token);
            map.push(token, &text[span.start..span.end]);
            cursor = span.end;
        }
        protected.push_str(&text[cursor..]);

        Ok((protected, map))
    }

    /// Swap sentinel tokens back for their original spans.
    ///
    /// Tokens the provider dropped simply stay absent; tokens it duplicated
    /// are each restored. Quality gating catches both cases via
    /// [`TermVault::verify`].
    pub fn restore(protected: &str, map: &PlaceholderMap) -> String {
        let mut restored = protected.to_string();
        for entry in map.entries() {
            restored = restored.replace(&entry.token, &entry.span);
        }
        restored
    }

    /// Fraction of sentinel tokens that survived in a candidate, in
    /// `[0, 1]`. An empty map is trivially fully preserved.
    pub fn verify(candidate: &str, map: &PlaceholderMap) -> f64 {
        if map.is_empty() {
            return 1.0;
        }
        let survived = map
            .entries()
            .iter()
            .filter(|entry| candidate.contains(&entry.token))
            .count();
        #[allow(clippy::cast_precision_loss)]
        {
            survived as f64 / map.len() as f64
        }
    }

    /// Tokens (with their spans) missing from a candidate, for audit
    /// detail.
    pub fn missing<'a>(candidate: &str, map: &'a PlaceholderMap) -> Vec<&'a str> {
        map.entries()
            .iter()
            .filter(|entry| !candidate.contains(&entry.token))
            .map(|entry| entry.span.as_str())
            .collect()
    }
}

// ============================================================================
// Span collection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanCategory {
    Term,
    Number,
}

#[derive(Debug, Clone, Copy)]
struct ProtectedSpan {
    start: usize,
    end: usize,
    category: SpanCategory,
}

impl ProtectedSpan {
    const fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Match glossary terms, longest first, declaration order breaking ties.
/// Accepted spans never overlap.
fn collect_term_spans(text: &str, terms: &[String]) -> Vec<ProtectedSpan> {
    let mut order: Vec<usize> = (0..terms.len()).collect();
    // Stable sort keeps declaration order within an equal length.
    order.sort_by_key(|&i| std::cmp::Reverse(terms[i].chars().count()));

    let mut accepted: Vec<ProtectedSpan> = Vec::new();
    for index in order {
        let term = &terms[index];
        let mut from = 0usize;
        while let Some((start, end)) = find_word_ci(text, term, from) {
            let span = ProtectedSpan {
                start,
                end,
                category: SpanCategory::Term,
            };
            if !accepted.iter().any(|existing| existing.overlaps(&span)) {
                accepted.push(span);
            }
            from = end;
        }
    }
    accepted
}

/// Case-insensitive (ASCII) word-bounded search starting at `from`.
///
/// Byte indices refer to the original string: characters are compared in
/// place rather than on a lowercased copy, which would shift offsets for
/// some Unicode.
fn find_word_ci(haystack: &str, needle: &str, from: usize) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return None;
    }
    let needle_chars: Vec<char> = needle.chars().collect();

    for (start, _) in haystack[from..].char_indices() {
        let start = from + start;
        if let Some(end) = match_at_ci(haystack, start, &needle_chars) {
            if is_word_boundary(haystack, start, end) {
                return Some((start, end));
            }
        }
    }
    None
}

/// Try to match `needle_chars` at byte offset `start`; returns the end
/// offset on success.
fn match_at_ci(haystack: &str, start: usize, needle_chars: &[char]) -> Option<usize> {
    let mut offset = start;
    for &expected in needle_chars {
        let actual = haystack[offset..].chars().next()?;
        let matches = if expected.is_ascii() && actual.is_ascii() {
            expected.eq_ignore_ascii_case(&actual)
        } else {
            expected == actual
        };
        if !matches {
            return None;
        }
        offset += actual.len_utf8();
    }
    Some(offset)
}

fn is_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before_ok = start == 0
        || text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric() && c != '_');
    let after_ok = end == text.len()
        || text[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric() && c != '_');
    before_ok && after_ok
}

/// Collect numeric tokens (`42`, `3.14`, `95%`) outside already-accepted
/// spans.
fn collect_number_spans(text: &str, accepted: &mut Vec<ProtectedSpan>) {
    let bytes = text.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        // Digit runs glued to a word or a decimal tail are not standalone
        // numbers ("v2", the "3" of "1.2.3").
        let prev = text[..i].chars().next_back();
        if prev.is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.') {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            continue;
        }

        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
        if i < bytes.len() && bytes[i] == b'%' {
            i += 1;
        }

        let span = ProtectedSpan {
            start,
            end: i,
            category: SpanCategory::Number,
        };
        if !accepted.iter().any(|existing| existing.overlaps(&span)) {
            accepted.push(span);
        }
    }
}

// ============================================================================
// Sentinel detection
// ============================================================================

/// Find sentinel-shaped text (`__TERM_nnn__` / `__NUM_nnn__`) already
/// present in the input.
fn find_sentinel(text: &str) -> Option<String> {
    for prefix in ["__TERM_", "__NUM_"] {
        for (index, _) in text.match_indices(prefix) {
            let tail = &text[index + prefix.len()..];
            let digits = tail.bytes().take_while(u8::is_ascii_digit).count();
            if digits >= 1 && tail[digits..].starts_with("__") {
                let end = index + prefix.len() + digits + 2;
                return Some(text[index..end].to_string());
            }
        }
    }
    None
}
