//! # Text Correction Module
//!
//! Maps raw OCR tokens onto the captcha's digit/operator alphabet. Two
//! tiers of correction apply: operator-confirmed learned overrides keyed on
//! the exact raw string, and a static table of characters Tesseract
//! commonly misreads for digits or operators. Correction is value
//! preserving, not validating; unmapped characters pass through and the
//! expression solver decides what is noise.

use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::debug;

use crate::ocr::RawToken;
use crate::store::CorrectionTable;

lazy_static! {
    /// Characters the OCR engine commonly misreads for a digit or operator.
    static ref CONFUSABLES: HashMap<char, char> = {
        let mut map = HashMap::new();
        map.insert('O', '0');
        map.insert('S', '5');
        map.insert('I', '1');
        map.insert('B', '8');
        map.insert('G', '6');
        map.insert('Z', '2');
        map.insert('T', '7');
        map.insert('A', '4');
        map.insert('X', '*');
        map.insert('×', '*');
        map.insert('L', '1');
        map.insert('H', '8');
        map.insert('_', '-');
        map.insert('/', '7');
        map.insert('£', '8');
        map.insert('&', '8');
        map
    };
}

/// Normalize raw tokens into the single raw recognition string.
///
/// Tokens are trimmed, uppercased and concatenated in order. This string is
/// both the learned-override lookup key and the input to per-character
/// correction.
pub fn normalize_tokens(tokens: &[RawToken]) -> String {
    tokens
        .iter()
        .map(|token| token.trim().to_uppercase())
        .collect()
}

/// Apply the static confusable table to one character.
pub fn correct_char(c: char) -> char {
    CONFUSABLES.get(&c).copied().unwrap_or(c)
}

/// Correct a sequence of raw OCR tokens into one canonical string.
///
/// A learned override matching the full normalized raw string wins outright
/// and skips per-character correction; otherwise every character goes
/// through the static confusable table.
pub fn correct_tokens(tokens: &[RawToken], learned: &CorrectionTable) -> String {
    let raw = normalize_tokens(tokens);

    if let Some(correction) = learned.get(&raw) {
        debug!(%raw, corrected = %correction, "Applied learned correction");
        return correction.clone();
    }

    raw.chars().map(correct_char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_learned() -> CorrectionTable {
        CorrectionTable::new()
    }

    #[test]
    fn test_static_table_applied_per_character() {
        let tokens = vec!["O5+S2".to_string()];
        assert_eq!(correct_tokens(&tokens, &no_learned()), "05+52");
    }

    #[test]
    fn test_tokens_trimmed_uppercased_and_concatenated() {
        let tokens = vec![" o5 ".to_string(), "x".to_string(), "s2\n".to_string()];
        assert_eq!(correct_tokens(&tokens, &no_learned()), "05*52");
    }

    #[test]
    fn test_unmapped_characters_pass_through() {
        let tokens = vec!["9.4".to_string()];
        assert_eq!(correct_tokens(&tokens, &no_learned()), "9.4");
    }

    #[test]
    fn test_learned_override_wins_over_static_table() {
        let mut learned = CorrectionTable::new();
        learned.insert("O5+S2".to_string(), "65+52".to_string());

        let tokens = vec!["O5+S2".to_string()];
        assert_eq!(correct_tokens(&tokens, &learned), "65+52");
    }

    #[test]
    fn test_learned_override_requires_exact_raw_match() {
        let mut learned = CorrectionTable::new();
        learned.insert("O5+S2".to_string(), "65+52".to_string());

        // Different raw string: falls back to the static table.
        let tokens = vec!["O5-S2".to_string()];
        assert_eq!(correct_tokens(&tokens, &learned), "05-52");
    }

    #[test]
    fn test_idempotent_over_corrected_alphabet() {
        // The static table is a fixed point over digits and operators.
        let corrected = "12+34";
        let tokens = vec![corrected.to_string()];
        assert_eq!(correct_tokens(&tokens, &no_learned()), corrected);

        let twice = vec![correct_tokens(&tokens, &no_learned())];
        assert_eq!(correct_tokens(&twice, &no_learned()), corrected);
    }

    #[test]
    fn test_operator_confusables() {
        let tokens = vec!["3×4".to_string()];
        assert_eq!(correct_tokens(&tokens, &no_learned()), "3*4");

        let tokens = vec!["7_2".to_string()];
        assert_eq!(correct_tokens(&tokens, &no_learned()), "7-2");
    }
}
