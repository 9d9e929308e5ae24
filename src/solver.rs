//! # Expression Solver Module
//!
//! Parses a corrected recognition string into a two-operand arithmetic
//! expression and evaluates it. The captcha format is rigid: two
//! non-negative integers and one operator from `{+, -, *}`, with `x`/`×`
//! accepted as multiplication synonyms and the answer always reported as an
//! absolute value. Anything that does not fit is surfaced as unsolvable so
//! a human can take over; the solver never guesses.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    /// Maximal digit runs, each one operand.
    static ref OPERANDS: Regex = Regex::new(r"\d+").expect("operand regex is valid");
}

/// Outcome of a solving attempt.
///
/// `Unsolvable` is a normal outcome, not an error: the caller surfaces the
/// corrected text for manual entry instead of submitting a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Solution {
    /// Evaluated answer, always non-negative
    Answer(i64),
    /// The corrected string did not yield exactly two operands and one operator
    Unsolvable,
}

impl Solution {
    /// Answer value, if the expression was solvable.
    pub fn answer(&self) -> Option<i64> {
        match self {
            Solution::Answer(value) => Some(*value),
            Solution::Unsolvable => None,
        }
    }
}

fn is_operator(c: char) -> bool {
    matches!(c, '+' | '-' | '*' | 'x' | 'X' | '×')
}

fn apply(operator: char, left: i64, right: i64) -> i64 {
    let result = match operator {
        '+' => left + right,
        '-' => left - right,
        // '*' and its synonyms; is_operator admits nothing else
        _ => left * right,
    };
    // The captcha convention discards sign.
    result.abs()
}

/// Solve a corrected recognition string.
///
/// Ambiguous punctuation (`.`, `_`, `/`) is stripped as presumed noise,
/// then maximal digit runs become operands and operator characters are
/// collected in encountered order. Exactly two operands and one operator
/// evaluate directly. A 3-character string starting with an operator is
/// read as `<op><digit><digit>` to recover a dropped leading digit (so
/// `-86` means `8 - 6`, not negative 86). Everything else is unsolvable.
pub fn solve(corrected: &str) -> Solution {
    let cleaned: String = corrected
        .chars()
        .filter(|c| !matches!(c, '.' | '_' | '/'))
        .collect();

    let operands: Vec<i64> = OPERANDS
        .find_iter(&cleaned)
        .filter_map(|m| m.as_str().parse::<i64>().ok())
        .collect();
    let operators: Vec<char> = cleaned.chars().filter(|c| is_operator(*c)).collect();

    if operands.len() == 2 && operators.len() == 1 {
        let answer = apply(operators[0], operands[0], operands[1]);
        debug!(
            expression = %cleaned,
            left = operands[0],
            operator = %operators[0],
            right = operands[1],
            answer,
            "Solved captcha expression"
        );
        return Solution::Answer(answer);
    }

    // Truncated recognition: an operator-first 3-character string is read
    // as <op><digit><digit>, recovering a dropped leading digit.
    let chars: Vec<char> = cleaned.chars().collect();
    if chars.len() == 3 && is_operator(chars[0]) {
        if let (Some(left), Some(right)) = (chars[1].to_digit(10), chars[2].to_digit(10)) {
            let answer = apply(chars[0], left as i64, right as i64);
            debug!(expression = %cleaned, answer, "Solved via operator-first fallback");
            return Solution::Answer(answer);
        }
    }

    debug!(
        expression = %cleaned,
        operand_count = operands.len(),
        operator_count = operators.len(),
        "Expression unsolvable"
    );
    Solution::Unsolvable
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addition() {
        assert_eq!(solve("12+7"), Solution::Answer(19));
    }

    #[test]
    fn test_multiplication() {
        assert_eq!(solve("9*3"), Solution::Answer(27));
        assert_eq!(solve("9x3"), Solution::Answer(27));
        assert_eq!(solve("9×3"), Solution::Answer(27));
    }

    #[test]
    fn test_subtraction_reports_absolute_value() {
        assert_eq!(solve("5-9"), Solution::Answer(4));
        assert_eq!(solve("9-5"), Solution::Answer(4));
    }

    #[test]
    fn test_operator_first_fallback() {
        // OCR dropped the separator or a leading digit; "-86" means 8 - 6.
        assert_eq!(solve("-86"), Solution::Answer(2));
        assert_eq!(solve("+35"), Solution::Answer(8));
        assert_eq!(solve("*24"), Solution::Answer(8));
    }

    #[test]
    fn test_fallback_requires_two_digits() {
        assert_eq!(solve("-8x"), Solution::Unsolvable);
    }

    #[test]
    fn test_single_operand_unsolvable() {
        assert_eq!(solve("12"), Solution::Unsolvable);
    }

    #[test]
    fn test_empty_string_unsolvable() {
        assert_eq!(solve(""), Solution::Unsolvable);
    }

    #[test]
    fn test_too_many_operators_unsolvable() {
        assert_eq!(solve("1+2+3"), Solution::Unsolvable);
    }

    #[test]
    fn test_noise_punctuation_stripped() {
        assert_eq!(solve("1.2+7"), Solution::Answer(19));
        assert_eq!(solve("12_+7"), Solution::Answer(19));
        assert_eq!(solve("12/+7"), Solution::Answer(19));
    }

    #[test]
    fn test_answer_accessor() {
        assert_eq!(solve("2*3").answer(), Some(6));
        assert_eq!(solve("abc").answer(), None);
    }
}
