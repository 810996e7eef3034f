//! Reconciles noisy OCR text into (name, points) records.
//!
//! - `values`: point totals inside the plausible range
//! - `names`: roster names (or cleaned nicknames) present in the text
//! - `assign`: exact table, range nearest-fit and position proximity

pub mod assign;
pub mod names;
pub mod tokens;
pub mod values;

pub use assign::{AssignOptions, ExactTable};
pub use names::{NameDetector, NicknameCleaner};
pub use tokens::{AssignmentRecord, PointRange, RawToken};
pub use values::ValueExtractor;

use anyhow::Result;

use crate::config::ExtractorConfig;
use crate::log_debug;

pub struct Matcher {
    values: ValueExtractor,
    names: NameDetector,
    table: ExactTable,
    options: AssignOptions,
}

impl Matcher {
    pub fn from_config(config: &ExtractorConfig) -> Result<Self> {
        let validation = &config.validation_settings;
        let cleaner = NicknameCleaner::new(
            validation.min_nickname_length,
            validation.max_nickname_words,
        )?;

        Ok(Self {
            values: ValueExtractor::new(config.point_range())?
                .with_row_tolerance(config.processing_settings.chunk_overlap_pixels),
            names: NameDetector::new(&config.roster, cleaner)?,
            table: ExactTable::from_roster(&config.roster),
            options: AssignOptions {
                strategies: config.matching.strategies.clone(),
                fill_missing_with_expected: config.matching.fill_missing_with_expected,
                max_row_distance: Some(config.chunk_height()),
            },
        })
    }

    /// True when names come from cleaned nickname lines instead of a roster.
    pub fn is_open_vocabulary(&self) -> bool {
        self.names.is_open()
    }

    /// Matches one text blob where names and points are interleaved.
    pub fn match_text(&self, text: &str) -> Vec<AssignmentRecord> {
        let tokens = [RawToken::new(text)];
        self.match_tokens(&tokens, &tokens)
    }

    /// Matches names read from `name_tokens` against points read from
    /// `value_tokens`.
    pub fn match_tokens(
        &self,
        name_tokens: &[RawToken],
        value_tokens: &[RawToken],
    ) -> Vec<AssignmentRecord> {
        let values = self.values.extract(value_tokens);
        let names = self.names.detect(name_tokens);

        log_debug(&format!(
            "Found {} names and {} point values",
            names.len(),
            values.len()
        ));
        log_debug(&format!(
            "Point values: {:?}",
            values.iter().map(|c| c.display.as_str()).collect::<Vec<_>>()
        ));

        assign::assign(&names, &values, &self.table, &self.options)
    }
}
