// ============================================================
// Layer 4 — Line Preprocessor
// ============================================================
// Turns a raw document into the clean lines the example
// builder packs into sequences.
//
// Cleaning steps (applied in order):
//   1. Map Unicode whitespace variants and control characters
//      to plain spaces, carriage returns to newlines
//   2. Collapse runs of spaces inside each line
//   3. Trim each line and drop the empty ones
//   4. Optionally drop lines shorter than `min_chars`
//
// Line breaks are meaningful here: the example builder treats
// each line as one sentence, so they are never merged.

pub struct Preprocessor {
    /// Lines with fewer visible characters are dropped
    min_chars: usize,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::with_min_chars(1)
    }

    pub fn with_min_chars(min_chars: usize) -> Self {
        Self { min_chars: min_chars.max(1) }
    }

    /// Clean a document and return its non-empty lines.
    pub fn clean_lines(&self, text: &str) -> Vec<String> {
        let normalised: String = text
            .chars()
            .map(|c| match c {
                '\t' | '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                '\r' => '\n',
                c if c.is_control() && c != '\n' => ' ',
                c => c,
            })
            .collect();

        normalised
            .lines()
            .map(collapse_spaces)
            .filter(|line| line.chars().count() >= self.min_chars)
            .collect()
    }
}

/// Collapse every run of spaces to a single space and trim.
fn collapse_spaces(line: &str) -> String {
    line.split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}
