// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Turns one raw sentence from the question table into tokens.
//
// Cleaning steps (applied in order):
//   1. Replace the ASCII separators 0x1C-0x1F with a space;
//      other control characters stay inside their token
//   2. Remove '(' and ')'                  (ignore_punctuation)
//   3. Replace other ASCII punctuation
//      with a space                        (ignore_punctuation)
//   4. Lowercase                           (lowercase)
//   5. Split on whitespace
//
// With both options off the result is exactly a whitespace
// split of the input, which is what the pair CSVs expect
// (their text columns are already space-segmented).
//
// Reference: Rust Book §8 (Strings in Rust)

#[derive(Debug, Clone, Copy, Default)]
pub struct Preprocessor {
    lowercase:          bool,
    ignore_punctuation: bool,
}

impl Preprocessor {
    pub fn new(lowercase: bool, ignore_punctuation: bool) -> Self {
        Self { lowercase, ignore_punctuation }
    }

    /// Clean a raw sentence and split it into tokens.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let cleaned: String = text
            .chars()
            .filter(|&c| !(self.ignore_punctuation && (c == '(' || c == ')')))
            .map(|c| match c {
                // Separators are token breaks in the corpus;
                // char::is_whitespace does not cover them
                '\u{1C}'..='\u{1F}' => ' ',
                c if self.ignore_punctuation && c.is_ascii_punctuation() => ' ',
                c => c,
            })
            .collect();

        let cleaned = if self.lowercase { cleaned.to_lowercase() } else { cleaned };

        cleaned.split_whitespace().map(str::to_string).collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_split() {
        let p = Preprocessor::default();
        assert_eq!(p.tokenize("  a  b\tc  "), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_keeps_case_and_punctuation_by_default() {
        let p = Preprocessor::default();
        assert_eq!(p.tokenize("Hello , (World)"), vec!["Hello", ",", "(World)"]);
    }

    #[test]
    fn test_lowercase() {
        let p = Preprocessor::new(true, false);
        assert_eq!(p.tokenize("Hello World"), vec!["hello", "world"]);
    }

    #[test]
    fn test_ignore_punctuation() {
        let p = Preprocessor::new(false, true);
        assert_eq!(p.tokenize("(a) b,c!"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_non_ascii_tokens_pass_through() {
        let p = Preprocessor::new(true, true);
        assert_eq!(p.tokenize("我 想 借钱"), vec!["我", "想", "借钱"]);
    }

    #[test]
    fn test_separators_split_other_controls_kept() {
        let p = Preprocessor::default();
        assert_eq!(p.tokenize("a\u{00A0}b\x1fc"), vec!["a", "b", "c"]);
        assert_eq!(p.tokenize("a\x01b c"), vec!["a\x01b", "c"]);
    }

    #[test]
    fn test_empty_string() {
        let p = Preprocessor::default();
        assert!(p.tokenize("").is_empty());
    }
}
