//! Protected-term glossaries and the placeholder maps produced when a
//! glossary is applied to a text.

use serde::{Deserialize, Serialize};

/// Terms that must survive transformation byte-for-byte.
///
/// Declaration order matters: it is the tie-breaker between equal-length
/// matches. Construction normalizes the list (trims whitespace, drops
/// empties, keeps the first occurrence of duplicates).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "GlossaryRaw")]
pub struct Glossary {
    terms: Vec<String>,
    protect_numbers: bool,
}

impl Glossary {
    /// Build a glossary from terms in declaration order; numeric protection
    /// defaults to on.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen: Vec<String> = Vec::new();
        for term in terms {
            let term = term.into().trim().to_string();
            if !term.is_empty() && !seen.contains(&term) {
                seen.push(term);
            }
        }
        Self {
            terms: seen,
            protect_numbers: true,
        }
    }

    /// A glossary protecting nothing (numeric protection off).
    pub const fn empty() -> Self {
        Self {
            terms: Vec::new(),
            protect_numbers: false,
        }
    }

    /// Toggle protection of numeric tokens.
    #[must_use]
    pub const fn with_protect_numbers(mut self, protect: bool) -> Self {
        self.protect_numbers = protect;
        self
    }

    /// Terms in declaration order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Whether numeric tokens are vaulted alongside terms.
    pub const fn protect_numbers(&self) -> bool {
        self.protect_numbers
    }

    /// True when neither terms nor numbers are protected.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && !self.protect_numbers
    }
}

/// Wire shape for glossary files.
#[derive(Debug, Deserialize)]
struct GlossaryRaw {
    #[serde(default)]
    terms: Vec<String>,
    #[serde(default = "default_protect_numbers")]
    protect_numbers: bool,
}

const fn default_protect_numbers() -> bool {
    true
}

impl From<GlossaryRaw> for Glossary {
    fn from(raw: GlossaryRaw) -> Self {
        Self::new(raw.terms).with_protect_numbers(raw.protect_numbers)
    }
}

/// One vaulted span: the sentinel token standing in for it and the exact
/// original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderEntry {
    /// Sentinel token, e.g. `__TERM_003__`.
    pub token: String,
    /// The exact span that was replaced (original casing preserved).
    pub span: String,
}

/// Ordered placeholder → span mapping for one protect pass.
///
/// Entries are kept in scan order. Tokens are globally unique within a
/// map, so restoration can substitute them in any order. Serializes as a
/// bare entry array, which is also the wire shape providers receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct PlaceholderMap {
    entries: Vec<PlaceholderEntry>,
}

impl PlaceholderMap {
    /// Append an entry in scan order.
    pub fn push(&mut self, token: impl Into<String>, span: impl Into<String>) {
        self.entries.push(PlaceholderEntry {
            token: token.into(),
            span: span.into(),
        });
    }

    /// Entries in scan order.
    pub fn entries(&self) -> &[PlaceholderEntry] {
        &self.entries
    }

    /// The span a token stands in for.
    pub fn span_for(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.token == token)
            .map(|entry| entry.span.as_str())
    }

    /// Number of vaulted spans.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether anything was vaulted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
