//! Whitespace normalization for extracted page text.

/// Collapse extracted text onto a single line.
///
/// Line breaks become spaces, runs of whitespace collapse to one space, and
/// leading and trailing whitespace is removed. NUL bytes, which some PDF
/// producers emit between glyphs, count as whitespace.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split(|c: char| c.is_whitespace() || c == '\0').filter(|w| !w.is_empty()) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}
