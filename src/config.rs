//! Extractor configuration loaded from config.json.
//!
//! Every section falls back to defaults field by field, so a config file only
//! needs to list what it changes. A missing or unreadable file means all
//! defaults.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::matcher::PointRange;

/// Complete extractor configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub image_settings: ImageSettings,
    pub processing_settings: ProcessingSettings,
    pub layout_settings: LayoutSettings,
    pub ocr_settings: OcrSettings,
    pub validation_settings: ValidationSettings,
    pub clan_sizes: ClanSizeSettings,
    /// Known players. Empty means any cleaned nickname is accepted.
    pub roster: Vec<RosterEntry>,
    pub matching: MatchingSettings,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub input_image: String,
    pub output_csv: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    /// Verbose diagnostics (raw OCR dumps, per-match logs)
    pub debug_mode: bool,
    /// Write preprocessed images to `debug_dir`
    pub save_debug_images: bool,
    pub debug_dir: String,
    /// Approximate height of one player row in pixels
    pub expected_player_height: u32,
    pub chunk_overlap_pixels: u32,
    pub players_per_chunk: u32,
    pub layout: LayoutMode,
    /// Tune chunking to the clan size inferred from image height
    pub auto_adjust: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Fraction of the width (from the left) that holds nicknames
    pub left_region_width_ratio: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Explicit Tesseract executable; searched for when unset
    pub tesseract_path: Option<String>,
    pub tessdata_dir: Option<String>,
    pub language: String,
    /// OCR configurations tried over the whole image in the single layout
    pub passes: Vec<OcrPass>,
    pub pass_selection: PassSelection,
    /// OCR configuration for the nickname region in the chunked layout
    pub nickname_pass: OcrPass,
    /// OCR configuration for the points region in the chunked layout
    pub points_pass: OcrPass,
    pub scale_factor: u32,
    pub contrast_enhancement: f32,
}

/// One Tesseract invocation setting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrPass {
    pub oem: u8,
    pub psm: u8,
    #[serde(default)]
    pub whitelist: Option<String>,
}

impl OcrPass {
    pub fn new(oem: u8, psm: u8) -> Self {
        Self {
            oem,
            psm,
            whitelist: None,
        }
    }
}

impl std::fmt::Display for OcrPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "--oem {} --psm {}", self.oem, self.psm)?;
        if let Some(chars) = &self.whitelist {
            write!(f, " -c tessedit_char_whitelist={}", chars)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub min_points: u32,
    pub max_points: u32,
    pub min_nickname_length: usize,
    pub max_nickname_words: usize,
}

/// Image-height thresholds for the clan size categories.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClanSizeSettings {
    pub small_max_height: u32,
    pub medium_max_height: u32,
    pub large_max_height: u32,
}

/// A known player.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    /// Extra regex patterns matched against lower-cased OCR text
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Plausible range for this player's total
    #[serde(default)]
    pub range: Option<PointRange>,
    #[serde(default)]
    pub expected: Option<u32>,
    /// Exact totals (including known misreadings) that identify this player
    #[serde(default)]
    pub known_totals: Vec<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingSettings {
    pub strategies: Vec<Strategy>,
    /// Emit an unmatched roster name with its expected total instead of
    /// dropping it
    pub fill_missing_with_expected: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// Chunked for tall images or an empty roster, single otherwise
    #[default]
    Auto,
    Single,
    Chunked,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassSelection {
    /// Keep the pass that produced the most records
    #[default]
    Best,
    /// Match once over the text of all passes
    Combined,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ExactTable,
    RangeNearest,
    Proximity,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClanSize {
    Small,
    Medium,
    Large,
    Maximum,
}

impl ClanSize {
    pub fn from_height(height: u32, sizes: &ClanSizeSettings) -> Self {
        if height <= sizes.small_max_height {
            ClanSize::Small
        } else if height <= sizes.medium_max_height {
            ClanSize::Medium
        } else if height <= sizes.large_max_height {
            ClanSize::Large
        } else {
            ClanSize::Maximum
        }
    }

    pub fn players_per_chunk(self) -> u32 {
        match self {
            ClanSize::Small => 15,
            ClanSize::Medium => 12,
            ClanSize::Large => 10,
            ClanSize::Maximum => 8,
        }
    }
}

impl std::fmt::Display for ClanSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ClanSize::Small => "small",
            ClanSize::Medium => "medium",
            ClanSize::Large => "large",
            ClanSize::Maximum => "maximum",
        };
        f.write_str(label)
    }
}

/// Images taller than this get their upscale factor capped.
const LARGE_IMAGE_HEIGHT: u32 = 10_000;
const MAX_LARGE_IMAGE_SCALE: u32 = 2;
const LARGE_CLAN_OVERLAP: u32 = 30;

const NICKNAME_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789[]{}()_- ";
const POINTS_WHITELIST: &str = "0123456789,points ";

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            input_image: "points.jpg".to_string(),
            output_csv: "clan_points.csv".to_string(),
        }
    }
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            debug_mode: true,
            save_debug_images: true,
            debug_dir: "debug".to_string(),
            expected_player_height: 140,
            chunk_overlap_pixels: 20,
            players_per_chunk: 12,
            layout: LayoutMode::Auto,
            auto_adjust: true,
        }
    }
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            left_region_width_ratio: 0.7,
        }
    }
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            tesseract_path: None,
            tessdata_dir: None,
            language: "eng".to_string(),
            passes: vec![OcrPass::new(3, 6), OcrPass::new(3, 4), OcrPass::new(3, 3)],
            pass_selection: PassSelection::Best,
            nickname_pass: OcrPass {
                oem: 3,
                psm: 6,
                whitelist: Some(NICKNAME_WHITELIST.to_string()),
            },
            points_pass: OcrPass {
                oem: 3,
                psm: 6,
                whitelist: Some(POINTS_WHITELIST.to_string()),
            },
            scale_factor: 2,
            contrast_enhancement: 1.5,
        }
    }
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            min_points: 1_000,
            max_points: 999_999,
            min_nickname_length: 2,
            max_nickname_words: 3,
        }
    }
}

impl Default for ClanSizeSettings {
    fn default() -> Self {
        Self {
            small_max_height: 4_200,
            medium_max_height: 7_000,
            large_max_height: 11_200,
        }
    }
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            strategies: vec![Strategy::ExactTable, Strategy::RangeNearest, Strategy::Proximity],
            fill_missing_with_expected: false,
        }
    }
}

impl ExtractorConfig {
    /// Load config from file, or return defaults if it is missing or invalid.
    pub fn load(config_path: &Path) -> Self {
        if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => {
                        crate::log(&format!("Loaded configuration from {}", config_path.display()));
                        return config;
                    }
                    Err(e) => {
                        crate::log(&format!(
                            "Failed to parse {}: {}. Using defaults.",
                            config_path.display(),
                            e
                        ));
                    }
                },
                Err(e) => {
                    crate::log(&format!(
                        "Failed to read {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    ));
                }
            }
        } else {
            crate::log(&format!(
                "Config file {} not found, using defaults",
                config_path.display()
            ));
        }
        Self::default()
    }

    /// Range a number must fall in to count as a point total.
    pub fn point_range(&self) -> PointRange {
        PointRange::new(
            self.validation_settings.min_points,
            self.validation_settings.max_points,
        )
    }

    /// Height in pixels of one processing chunk.
    pub fn chunk_height(&self) -> u32 {
        self.processing_settings
            .expected_player_height
            .saturating_mul(self.processing_settings.players_per_chunk)
            .max(1)
    }

    /// Number of player rows an image of this height holds.
    pub fn estimated_players(&self, image_height: u32) -> u32 {
        image_height / self.processing_settings.expected_player_height.max(1)
    }

    /// Tunes chunking for the clan size implied by the image height.
    pub fn auto_adjust(&mut self, image_height: u32) -> ClanSize {
        let size = ClanSize::from_height(image_height, &self.clan_sizes);
        let processing = &mut self.processing_settings;

        processing.players_per_chunk = size.players_per_chunk();
        if matches!(size, ClanSize::Large | ClanSize::Maximum) {
            processing.chunk_overlap_pixels = LARGE_CLAN_OVERLAP;
        }
        if image_height > LARGE_IMAGE_HEIGHT && self.ocr_settings.scale_factor > MAX_LARGE_IMAGE_SCALE {
            self.ocr_settings.scale_factor = MAX_LARGE_IMAGE_SCALE;
            crate::log(&format!(
                "Reduced scale factor to {} for large image",
                MAX_LARGE_IMAGE_SCALE
            ));
        }

        crate::log(&format!("Auto-adjusted settings for {} clan", size));
        size
    }

    /// Resolves `Auto` against the image height and roster.
    pub fn resolve_layout(&self, image_height: u32) -> LayoutMode {
        match self.processing_settings.layout {
            LayoutMode::Auto if self.roster.is_empty() || image_height > self.chunk_height() => {
                LayoutMode::Chunked
            }
            LayoutMode::Auto => LayoutMode::Single,
            explicit => explicit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = ExtractorConfig::load(&dir.path().join("config.json"));

        assert_eq!(config.image_settings.input_image, "points.jpg");
        assert_eq!(config.validation_settings.min_points, 1_000);
        assert!(config.roster.is_empty());
    }

    #[test]
    fn test_load_invalid_json_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = ExtractorConfig::load(&path);
        assert_eq!(config.processing_settings.expected_player_height, 140);
    }

    #[test]
    fn test_load_partial_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "validation_settings": { "min_points": 150000, "max_points": 300000 },
                "processing_settings": { "layout": "chunked" },
                "roster": [
                    {
                        "name": "Spider Friend",
                        "aliases": ["spider", "splder"],
                        "range": { "min": 210000, "max": 220000 },
                        "expected": 215600,
                        "known_totals": [215600]
                    },
                    { "name": "Finde" }
                ],
                "matching": { "strategies": ["exact_table", "range_nearest"] }
            }"#,
        )
        .unwrap();

        let config = ExtractorConfig::load(&path);
        assert_eq!(config.point_range(), PointRange::new(150_000, 300_000));
        assert_eq!(config.validation_settings.max_nickname_words, 3);
        assert_eq!(config.processing_settings.layout, LayoutMode::Chunked);
        assert_eq!(config.roster.len(), 2);
        assert_eq!(config.roster[0].range, Some(PointRange::new(210_000, 220_000)));
        assert!(config.roster[1].known_totals.is_empty());
        assert_eq!(
            config.matching.strategies,
            vec![Strategy::ExactTable, Strategy::RangeNearest]
        );
        assert!(!config.matching.fill_missing_with_expected);
    }

    #[test]
    fn test_clan_size_from_height() {
        let sizes = ClanSizeSettings::default();
        assert_eq!(ClanSize::from_height(3_000, &sizes), ClanSize::Small);
        assert_eq!(ClanSize::from_height(4_200, &sizes), ClanSize::Small);
        assert_eq!(ClanSize::from_height(6_000, &sizes), ClanSize::Medium);
        assert_eq!(ClanSize::from_height(11_200, &sizes), ClanSize::Large);
        assert_eq!(ClanSize::from_height(11_302, &sizes), ClanSize::Maximum);
    }

    #[test]
    fn test_auto_adjust_large_image() {
        let mut config = ExtractorConfig::default();
        config.ocr_settings.scale_factor = 3;

        let size = config.auto_adjust(11_302);
        assert_eq!(size, ClanSize::Maximum);
        assert_eq!(config.processing_settings.players_per_chunk, 8);
        assert_eq!(config.processing_settings.chunk_overlap_pixels, 30);
        assert_eq!(config.ocr_settings.scale_factor, 2);
        assert_eq!(config.chunk_height(), 140 * 8);
    }

    #[test]
    fn test_chunk_height_saturates() {
        let mut config = ExtractorConfig::default();
        config.processing_settings.expected_player_height = u32::MAX;
        config.processing_settings.players_per_chunk = 12;
        assert_eq!(config.chunk_height(), u32::MAX);

        config.processing_settings.players_per_chunk = 0;
        assert_eq!(config.chunk_height(), 1);
    }

    #[test]
    fn test_auto_adjust_small_image_keeps_overlap() {
        let mut config = ExtractorConfig::default();
        config.auto_adjust(2_000);
        assert_eq!(config.processing_settings.players_per_chunk, 15);
        assert_eq!(config.processing_settings.chunk_overlap_pixels, 20);
    }

    #[test]
    fn test_resolve_layout() {
        let mut config = ExtractorConfig::default();
        assert_eq!(config.resolve_layout(500), LayoutMode::Chunked);

        config.roster.push(RosterEntry {
            name: "Akshat".to_string(),
            aliases: Vec::new(),
            range: None,
            expected: None,
            known_totals: Vec::new(),
        });
        assert_eq!(config.resolve_layout(500), LayoutMode::Single);
        assert_eq!(config.resolve_layout(5_000), LayoutMode::Chunked);

        config.processing_settings.layout = LayoutMode::Single;
        assert_eq!(config.resolve_layout(5_000), LayoutMode::Single);
    }

    #[test]
    fn test_ocr_pass_display() {
        assert_eq!(OcrPass::new(3, 6).to_string(), "--oem 3 --psm 6");
        let pass = OcrPass {
            oem: 3,
            psm: 6,
            whitelist: Some("0123456789,".to_string()),
        };
        assert_eq!(pass.to_string(), "--oem 3 --psm 6 -c tessedit_char_whitelist=0123456789,");
    }
}
