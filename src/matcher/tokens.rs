//! Value types flowing through the matcher.

use serde::{Deserialize, Serialize};

/// Where a piece of OCR text came from in the source image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    /// Index of the horizontal chunk the text was read from
    pub chunk: usize,
    /// Vertical offset of the text line in source-image pixels
    pub y: u32,
}

/// A fragment of OCR output, optionally tagged with its position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawToken {
    pub text: String,
    pub position: Option<Position>,
}

impl RawToken {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            position: None,
        }
    }

    pub fn at(text: impl Into<String>, chunk: usize, y: u32) -> Self {
        Self {
            text: text.into(),
            position: Some(Position { chunk, y }),
        }
    }
}

/// Inclusive numeric bounds, e.g. the plausible range of a point total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointRange {
    pub min: u32,
    pub max: u32,
}

impl PointRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: u32) -> bool {
        self.min <= value && value <= self.max
    }

    /// Distance from `value` to the nearest bound; 0 when inside.
    pub fn distance(&self, value: u32) -> u32 {
        if value < self.min {
            self.min - value
        } else if value > self.max {
            value - self.max
        } else {
            0
        }
    }
}

/// A number read from OCR text that plausibly is a point total.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateValue {
    pub value: u32,
    /// Digit-grouped form used for output, e.g. "215,600"
    pub display: String,
    pub position: Option<Position>,
}

/// A player name found in OCR text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateName {
    pub name: String,
    pub position: Option<Position>,
    /// Plausible range for this player's total, if configured
    pub range: Option<PointRange>,
    /// Expected total, used for tie-breaks and the placeholder policy
    pub expected: Option<u32>,
}

impl CandidateName {
    /// A name outside any roster: no range, no expectation.
    pub fn unlisted(name: impl Into<String>, position: Option<Position>) -> Self {
        Self {
            name: name.into(),
            position,
            range: None,
            expected: None,
        }
    }
}

/// One output row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssignmentRecord {
    pub name: String,
    pub points: String,
}

impl AssignmentRecord {
    pub fn new(name: impl Into<String>, points: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: points.into(),
        }
    }
}

/// Case- and whitespace-insensitive identity of a name.
pub fn name_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Formats a value with comma thousands separators: 215600 -> "215,600".
pub fn group_digits(value: u32) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
