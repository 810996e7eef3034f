use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::TesseractPaths;
use crate::config::OcrPass;

/// Represents a line of OCR text with confidence score
#[derive(Debug, Clone)]
pub struct OcrLine {
    pub text: String,
    pub words: Vec<OcrWord>,
    pub confidence: f32,
    /// Top edge of the line in pixels of the recognized image
    pub top: u32,
}

/// Represents a single word from OCR with confidence score
#[derive(Debug, Clone)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
}

/// Turns an image into lines of text.
pub trait TextScanner {
    fn scan(&self, img: &GrayImage, pass: &OcrPass) -> Result<Vec<OcrLine>>;
}

/// Runs the Tesseract executable as a subprocess.
pub struct TesseractEngine {
    paths: TesseractPaths,
    language: String,
}

impl TesseractEngine {
    pub fn new(paths: TesseractPaths, language: &str) -> Self {
        Self {
            paths,
            language: language.to_string(),
        }
    }
}

impl TextScanner for TesseractEngine {
    /// Runs Tesseract on a preprocessed grayscale image.
    /// Returns structured output with lines and confidence scores.
    fn scan(&self, img: &GrayImage, pass: &OcrPass) -> Result<Vec<OcrLine>> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to write OCR input image")?;

        // Tesseract appends .tsv to the output base
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let mut command = Command::new(&self.paths.executable);
        command.arg(temp_input.path()).arg(&output_base);
        if let Some(tessdata) = &self.paths.tessdata {
            command.arg("--tessdata-dir").arg(tessdata);
        }
        command
            .arg("-l")
            .arg(&self.language)
            .arg("--oem")
            .arg(pass.oem.to_string())
            .arg("--psm")
            .arg(pass.psm.to_string());
        if let Some(chars) = &pass.whitelist {
            command
                .arg("-c")
                .arg(format!("tessedit_char_whitelist={}", chars));
        }
        let output = command.arg("tsv").output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed ({}): {}", pass, stderr.trim()));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;
        let _ = std::fs::remove_file(&tsv_path);

        Ok(parse_tsv_output(&tsv_content))
    }
}

/// Joins recognized lines back into a text blob.
pub fn lines_to_text(lines: &[OcrLine]) -> String {
    lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Line under construction while walking TSV rows.
#[derive(Default)]
struct LineBuilder {
    key: Option<(i32, i32, i32)>,
    words: Vec<OcrWord>,
    top: u32,
}

impl LineBuilder {
    fn finish(&mut self, lines: &mut Vec<OcrLine>) {
        let words = std::mem::take(&mut self.words);
        if words.is_empty() {
            return;
        }
        let confidence = words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32;
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(OcrLine {
            text,
            words,
            confidence,
            top: self.top,
        });
    }
}

/// Parses Tesseract TSV output into structured OcrLine data
fn parse_tsv_output(tsv: &str) -> Vec<OcrLine> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current = LineBuilder::default();

    for row in tsv.lines().skip(1) {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let level: i32 = fields[0].parse().unwrap_or(-1);
        let key = (
            fields[2].parse().unwrap_or(-1),
            fields[3].parse().unwrap_or(-1),
            fields[4].parse().unwrap_or(-1),
        );
        let top: u32 = fields[7].parse().unwrap_or(0);
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        let text = fields[11].trim();

        // Level 5 = word
        if level != 5 || text.is_empty() || conf < 0.0 {
            continue;
        }

        // line_num restarts in every block and paragraph
        if current.key != Some(key) {
            current.finish(&mut lines);
            current.key = Some(key);
            current.top = top;
        }

        current.top = current.top.min(top);
        current.words.push(OcrWord {
            text: text.to_string(),
            confidence: conf,
        });
    }

    current.finish(&mut lines);
    lines
}
