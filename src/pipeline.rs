//! Extraction runner: image in, records out.
//!
//! Two layouts:
//! - single: the whole image goes through every configured OCR pass and the
//!   roster matcher; the pass with the most records wins (or all pass texts
//!   are matched together)
//! - chunked: the image is sliced into overlapping horizontal chunks, each
//!   split into a nickname column and a points column, and names are paired
//!   with points by position

use anyhow::Result;
use image::GrayImage;
use std::path::Path;

use crate::config::{ExtractorConfig, LayoutMode, OcrPass, PassSelection};
use crate::error::ExtractError;
use crate::matcher::{AssignmentRecord, Matcher, RawToken};
use crate::ocr::preprocess::{crop_region, save_debug_image};
use crate::ocr::{lines_to_text, plan_chunks, prepare_for_ocr, Region, TextScanner};
use crate::{log, log_debug};

/// Result of one extraction run.
#[derive(Debug)]
pub struct Extraction {
    pub records: Vec<AssignmentRecord>,
    /// Layout actually used (never `Auto`)
    pub layout: LayoutMode,
}

/// Loads `image_path` as grayscale.
pub fn load_image(image_path: &Path) -> Result<GrayImage, ExtractError> {
    if !image_path.exists() {
        return Err(ExtractError::ImageNotFound(image_path.to_path_buf()));
    }
    let img = image::open(image_path).map_err(|source| ExtractError::ImageDecode {
        path: image_path.display().to_string(),
        source,
    })?;
    Ok(img.to_luma8())
}

/// Runs the full pipeline on one image file.
///
/// `config` may be tuned to the image size when auto-adjust is enabled.
pub fn run_extraction(
    config: &mut ExtractorConfig,
    image_path: &Path,
    scanner: &dyn TextScanner,
    debug_dir: Option<&Path>,
) -> Result<Extraction> {
    let img = load_image(image_path)?;
    let (width, height) = img.dimensions();

    log(&format!("Loaded image: {}x{} pixels", width, height));
    log(&format!(
        "Estimated players: {}",
        config.estimated_players(height)
    ));

    if config.processing_settings.auto_adjust {
        let size = config.auto_adjust(height);
        log(&format!("Clan size category: {}", size));
    }

    extract_records(&img, config, scanner, debug_dir)
}

/// Extracts records from an already loaded image.
pub fn extract_records(
    img: &GrayImage,
    config: &ExtractorConfig,
    scanner: &dyn TextScanner,
    debug_dir: Option<&Path>,
) -> Result<Extraction> {
    let matcher = Matcher::from_config(config)?;
    let layout = config.resolve_layout(img.height());

    let (records, layout) = match layout {
        LayoutMode::Chunked => {
            log("Processing image in chunks...");
            let records = extract_chunked(img, config, &matcher, scanner, debug_dir);
            (records, LayoutMode::Chunked)
        }
        LayoutMode::Single | LayoutMode::Auto => {
            if matcher.is_open_vocabulary() {
                log("Warning: single layout without a roster recognizes no names");
            }
            log("Running OCR over the whole image...");
            let records = extract_single(img, config, &matcher, scanner, debug_dir);
            (records, LayoutMode::Single)
        }
    };

    Ok(Extraction { records, layout })
}

fn extract_single(
    img: &GrayImage,
    config: &ExtractorConfig,
    matcher: &Matcher,
    scanner: &dyn TextScanner,
    debug_dir: Option<&Path>,
) -> Vec<AssignmentRecord> {
    let ocr = &config.ocr_settings;
    let processed = prepare_for_ocr(img, ocr.scale_factor, ocr.contrast_enhancement);
    if let Some(dir) = debug_dir {
        if let Err(e) = save_debug_image(&processed, dir, "debug_processed.png") {
            log(&format!("Warning: {:#}", e));
        }
    }

    let texts: Vec<(&OcrPass, String)> = ocr
        .passes
        .iter()
        .filter_map(|pass| match scanner.scan(&processed, pass) {
            Ok(lines) => {
                let text = lines_to_text(&lines);
                log_debug(&format!("Config {}: {} chars extracted", pass, text.len()));
                Some((pass, text))
            }
            Err(e) => {
                log(&format!("OCR config '{}' failed: {:#}", pass, e));
                None
            }
        })
        .collect();

    match ocr.pass_selection {
        PassSelection::Combined => {
            let combined = texts
                .iter()
                .map(|(_, text)| text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            log_debug(&format!("----- COMBINED OCR OUTPUT -----\n{}", combined));
            matcher.match_text(&combined)
        }
        PassSelection::Best => {
            let mut best: Vec<AssignmentRecord> = Vec::new();
            let mut best_text: Option<(&OcrPass, &str)> = None;

            for (pass, text) in &texts {
                let records = matcher.match_text(text);
                if records.len() > best.len() {
                    best = records;
                    best_text = Some((*pass, text.as_str()));
                }
            }

            if let Some((pass, text)) = best_text {
                log_debug(&format!("----- OCR OUTPUT (best config: {}) -----\n{}", pass, text));
            }
            best
        }
    }
}

fn extract_chunked(
    img: &GrayImage,
    config: &ExtractorConfig,
    matcher: &Matcher,
    scanner: &dyn TextScanner,
    debug_dir: Option<&Path>,
) -> Vec<AssignmentRecord> {
    let (width, height) = img.dimensions();
    let ocr = &config.ocr_settings;
    let ratio = config.layout_settings.left_region_width_ratio.clamp(0.0, 1.0);
    let left_width = (width as f32 * ratio) as u32;
    let scale = ocr.scale_factor.max(1);

    let spans = plan_chunks(
        height,
        config.chunk_height(),
        config.processing_settings.chunk_overlap_pixels,
    );

    let mut name_tokens: Vec<RawToken> = Vec::new();
    let mut value_tokens: Vec<RawToken> = Vec::new();

    for span in &spans {
        log_debug(&format!(
            "Processing chunk {}: y={} to {}",
            span.index, span.y_start, span.y_end
        ));

        let regions = [
            ("nickname", &ocr.nickname_pass, 0, left_width, &mut name_tokens),
            ("points", &ocr.points_pass, left_width, width - left_width, &mut value_tokens),
        ];

        for (kind, pass, x, region_width, tokens) in regions {
            if region_width == 0 {
                continue;
            }
            let region = crop_region(
                img,
                Region {
                    x,
                    y: span.y_start,
                    width: region_width,
                    height: span.height(),
                },
            );
            let processed = prepare_for_ocr(&region, scale, ocr.contrast_enhancement);

            if let Some(dir) = debug_dir {
                let file_name = format!("debug_{}_chunk_{}.png", kind, span.index);
                if let Err(e) = save_debug_image(&processed, dir, &file_name) {
                    log(&format!("Warning: {:#}", e));
                }
            }

            let lines = match scanner.scan(&processed, pass) {
                Ok(lines) => lines,
                Err(e) => {
                    log(&format!(
                        "OCR failed for {} chunk {}: {:#}",
                        kind, span.index, e
                    ));
                    continue;
                }
            };

            log_debug(&format!(
                "--- {} OCR CHUNK {} ---\n{}",
                kind.to_uppercase(),
                span.index,
                lines_to_text(&lines)
            ));

            tokens.extend(
                lines
                    .iter()
                    .map(|line| RawToken::at(&line.text, span.index, span.y_start + line.top / scale)),
            );
        }
    }

    matcher.match_tokens(&name_tokens, &value_tokens)
}
