use anyhow::Result;
use regex::Regex;

use super::tokens::{group_digits, CandidateValue, PointRange, Position, RawToken};

/// Numeric recognizers, applied to every token:
/// - Grouped digits: 215,600 or 1.234.567
/// - Bare digit runs: 215600
/// - Grouped digits with OCR-inserted whitespace: 215 , 600
const VALUE_PATTERNS: [&str; 3] = [
    r"\d{1,3}(?:[,.]\d{3})+",
    r"\b\d{4,7}\b",
    r"\d{1,3}\s*[,.]\s*\d{3}(?:\s*[,.]\s*\d{3})?",
];

/// Finds point totals in OCR text.
pub struct ValueExtractor {
    patterns: Vec<Regex>,
    range: PointRange,
    /// Max vertical gap in pixels between two readings of one row
    row_tolerance: u32,
}

impl ValueExtractor {
    pub fn new(range: PointRange) -> Result<Self> {
        let patterns = VALUE_PATTERNS
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            range,
            row_tolerance: 0,
        })
    }

    /// Readings of the same value at most `pixels` apart vertically are taken
    /// as one row read twice (chunk overlap).
    pub fn with_row_tolerance(mut self, pixels: u32) -> Self {
        self.row_tolerance = pixels;
        self
    }

    /// Extracts in-range values, in order of first appearance.
    ///
    /// A value read by several recognizers on one token is kept once. Across
    /// tokens, equal values are merged only when they sit on the same row:
    /// both unpositioned, or positioned within the row tolerance. Equal totals
    /// on different rows stay separate candidates.
    pub fn extract(&self, tokens: &[RawToken]) -> Vec<CandidateValue> {
        let mut found: Vec<CandidateValue> = Vec::new();

        for token in tokens {
            let mut hits: Vec<(usize, u32)> = self
                .patterns
                .iter()
                .flat_map(|re| re.find_iter(&token.text))
                .filter_map(|m| parse_points(m.as_str()).map(|v| (m.start(), v)))
                .filter(|&(_, v)| self.range.contains(v))
                .collect();
            hits.sort_by_key(|&(start, _)| start);

            for (_, value) in hits {
                if found
                    .iter()
                    .any(|c| c.value == value && self.same_row(c.position, token.position))
                {
                    continue;
                }
                found.push(CandidateValue {
                    value,
                    display: group_digits(value),
                    position: token.position,
                });
            }
        }

        found
    }

    fn same_row(&self, a: Option<Position>, b: Option<Position>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => a.y.abs_diff(b.y) <= self.row_tolerance,
            (None, None) => true,
            _ => false,
        }
    }
}

/// Parses a points string by dropping every non-digit character.
/// Returns `None` if nothing numeric is left or the number overflows.
pub fn parse_points(text: &str) -> Option<u32> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
