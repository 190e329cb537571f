//! Sanitization of input-derived strings before they enter a report.
//!
//! Receipts are untrusted. Anything copied from one into a report passes
//! through [`Sanitizer::clean`], so the report renders safely as plain text.

/// Marker appended to truncated strings.
pub const TRUNCATION_MARKER: &str = "…";

/// Strips control and bidi-override characters and bounds length.
#[derive(Debug, Clone, Copy)]
pub struct Sanitizer {
    max_len: usize,
}

impl Sanitizer {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    /// Clean one string. `max_len` counts characters, not bytes.
    pub fn clean(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len().min(self.max_len * 4));
        let mut kept = 0usize;
        for c in input.chars().filter(|c| !is_unsafe(*c)) {
            if kept == self.max_len {
                out.push_str(TRUNCATION_MARKER);
                return out;
            }
            out.push(c);
            kept += 1;
        }
        out
    }
}

fn is_unsafe(c: char) -> bool {
    c.is_control() || matches!(c, '\u{202a}'..='\u{202e}' | '\u{2066}'..='\u{2069}' | '\u{200e}' | '\u{200f}')
}
