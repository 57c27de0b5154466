// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Cleans raw product descriptions before word counting and
// tokenisation.
//
// Product feeds scraped from storefronts often contain:
//   - Inline HTML tags (<br>, <li>, <b>) from rich descriptions
//   - Non-breaking and zero-width spaces from copy-pasting
//   - Tabs and newlines from bullet lists
//   - Stray control characters
//
// Cleaning steps (applied in order):
//   1. Drop anything between '<' and '>' (simple tag stripper)
//   2. Map Unicode whitespace variants and controls to a space
//   3. Collapse runs of spaces and trim, giving a single line
//
// `words` is the matching word splitter used to count the
// training vocabulary: lowercase runs of alphanumerics and '_'.
//
// Reference: Rust Book §8 (Strings in Rust)
//            Rust Book §13 (Iterators)

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean a raw description into a single normalised line.
    pub fn clean(&self, text: &str) -> String {

        // ── Step 1: Strip markup ──────────────────────────────────────────────
        // Tags are replaced by a space so "a<br>b" stays two words.
        let mut step1  = String::with_capacity(text.len());
        let mut in_tag = false;
        for c in text.chars() {
            match c {
                '<' => in_tag = true,
                '>' if in_tag => {
                    in_tag = false;
                    step1.push(' ');
                }
                c if !in_tag => step1.push(c),
                _ => {}
            }
        }

        // ── Step 2: Normalise individual characters ───────────────────────────
        let step2 = step1.chars().map(|c| match c {
            '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
            c if c.is_whitespace() || c.is_control() => ' ',
            c => c,
        });

        // ── Step 3: Collapse spaces ───────────────────────────────────────────
        let mut out        = String::with_capacity(text.len());
        let mut last_space = true;
        for c in step2 {
            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        out.trim_end().to_string()
    }

    /// Lowercased word tokens of an already cleaned line.
    pub fn words<'a>(&self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_multiple_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("usb   cable"), "usb cable");
    }

    #[test]
    fn test_trims_edges() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("  usb cable \n"), "usb cable");
    }

    #[test]
    fn test_strips_html_tags() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("<p>Soft<br/>cotton</p> <b>tee</b>"), "Soft cotton tee");
    }

    #[test]
    fn test_removes_control_and_wide_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("red\x01mug\u{00A0}set\tof\u{200B}2"), "red mug set of 2");
    }

    #[test]
    fn test_empty_string() {
        let p = Preprocessor::new();
        assert_eq!(p.clean(""), "");
    }

    #[test]
    fn test_words_lowercase_and_split_punctuation() {
        let p = Preprocessor::new();
        let w: Vec<String> = p.words("Wi-Fi Router, 5GHz (black)").collect();
        assert_eq!(w, vec!["wi", "fi", "router", "5ghz", "black"]);
    }
}
