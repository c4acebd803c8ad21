//! Markdown document splitting.
//!
//! A document is cut into sections at ATX headings (`#`, `##`, ...); each
//! section keeps its heading line so reassembling the refined texts in
//! position order reproduces the document. Text before the first heading
//! becomes a leading body section, and headings inside fenced code blocks
//! are ignored.

use crate::domain::models::SectionKind;

/// Split a document into `(section kind, text)` pairs in reading order.
///
/// Section text is trimmed of surrounding blank lines; interior content is
/// untouched. Whitespace-only chunks are dropped.
pub fn split_sections(text: &str) -> Vec<(SectionKind, String)> {
    let mut sections = Vec::new();
    let mut buffer = String::new();
    let mut kind = SectionKind::Body;
    let mut in_fence = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        } else if !in_fence && is_heading(line) {
            flush(&mut sections, kind, &mut buffer);
            kind = SectionKind::from_heading(line);
        }
        buffer.push_str(line);
        buffer.push('\n');
    }
    flush(&mut sections, kind, &mut buffer);

    sections
}

fn flush(sections: &mut Vec<(SectionKind, String)>, kind: SectionKind, buffer: &mut String) {
    let trimmed = buffer.trim();
    if !trimmed.is_empty() {
        sections.push((kind, trimmed.to_string()));
    }
    buffer.clear();
}

fn is_heading(line: &str) -> bool {
    let trimmed = line.trim_start();
    // ATX heading: leading hashes followed by whitespace or end of line.
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes)
        && trimmed[hashes..]
            .chars()
            .next()
            .is_none_or(char::is_whitespace)
}
