use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::{median_filter, sharpen3x3};
use std::path::Path;

/// Upper bound on chunks per image, against runaway slicing.
pub const MAX_CHUNKS: usize = 100;

/// A rectangle in absolute pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One horizontal slice of a tall image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkSpan {
    pub index: usize,
    pub y_start: u32,
    pub y_end: u32,
}

impl ChunkSpan {
    pub fn height(&self) -> u32 {
        self.y_end - self.y_start
    }
}

/// Splits `height` pixels into chunks of `chunk_height`, each overlapping the
/// previous one by `overlap` pixels so no text line is cut in half.
pub fn plan_chunks(height: u32, chunk_height: u32, overlap: u32) -> Vec<ChunkSpan> {
    let chunk_height = chunk_height.max(1);
    let overlap = overlap.min(chunk_height - 1);
    let mut spans = Vec::new();
    let mut y = 0;

    while y < height && spans.len() < MAX_CHUNKS {
        let y_end = (y + chunk_height).min(height);
        spans.push(ChunkSpan {
            index: spans.len(),
            y_start: y,
            y_end,
        });
        if y_end == height {
            break;
        }
        y = y_end - overlap;
    }

    if spans.len() == MAX_CHUNKS && spans.last().is_some_and(|s| s.y_end < height) {
        crate::log("Warning: too many chunks, the bottom of the image is skipped");
    }
    spans
}

/// Crops a sub-region, clamping it to the image bounds.
pub fn crop_region(img: &GrayImage, region: Region) -> GrayImage {
    let (w, h) = img.dimensions();

    let x0 = region.x.min(w);
    let y0 = region.y.min(h);
    let rw = region.width.min(w - x0);
    let rh = region.height.min(h - y0);

    image::imageops::crop_imm(img, x0, y0, rw, rh).to_image()
}

/// Converts to black text on white using Otsu's global threshold.
pub fn binarize(img: &GrayImage) -> GrayImage {
    let level = otsu_level(img);
    let (width, height) = img.dimensions();
    let mut output = GrayImage::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let value = if pixel[0] > level { 255u8 } else { 0u8 };
        output.put_pixel(x, y, Luma([value]));
    }

    // Light text on a dark background: flip so Tesseract sees dark text
    let dark = output.pixels().filter(|p| p[0] == 0).count();
    if dark * 2 > output.pixels().len() {
        image::imageops::invert(&mut output);
    }
    output
}

/// Prepares a region for OCR: denoise, binarize, upscale, sharpen and
/// boost contrast.
///
/// `contrast` is a multiplier (1.0 = unchanged).
pub fn prepare_for_ocr(img: &GrayImage, scale_factor: u32, contrast: f32) -> GrayImage {
    let denoised = median_filter(img, 1, 1);
    let binary = binarize(&denoised);

    let scale = scale_factor.max(1);
    let (w, h) = binary.dimensions();
    let scaled = if scale > 1 {
        image::imageops::resize(&binary, w * scale, h * scale, FilterType::Lanczos3)
    } else {
        binary
    };

    let sharpened = sharpen3x3(&scaled);
    // imageops::contrast squares (100 + c) / 100, so take the root of the multiplier
    let percent = (contrast.max(0.0).sqrt() - 1.0) * 100.0;
    image::imageops::contrast(&sharpened, percent)
}

/// Writes an intermediate image for troubleshooting.
pub fn save_debug_image(img: &GrayImage, dir: &Path, file_name: &str) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create debug directory {}", dir.display()))?;
    let path = dir.join(file_name);
    img.save(&path)
        .with_context(|| format!("Failed to save debug image {}", path.display()))?;
    crate::log_debug(&format!("Saved debug image: {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_chunks_single() {
        let spans = plan_chunks(1000, 1680, 20);
        assert_eq!(
            spans,
            vec![ChunkSpan {
                index: 0,
                y_start: 0,
                y_end: 1000
            }]
        );
    }

    #[test]
    fn test_plan_chunks_overlap() {
        let spans = plan_chunks(3400, 1680, 20);
        let bounds: Vec<(u32, u32)> = spans.iter().map(|s| (s.y_start, s.y_end)).collect();
        assert_eq!(bounds, vec![(0, 1680), (1660, 3340), (3320, 3400)]);
        assert_eq!(spans[2].index, 2);
    }

    #[test]
    fn test_plan_chunks_overlap_not_larger_than_chunk() {
        let spans = plan_chunks(50, 10, 40);
        assert!(spans.len() <= MAX_CHUNKS);
        assert_eq!(spans.last().unwrap().y_end, 50);
    }

    #[test]
    fn test_plan_chunks_capped() {
        let spans = plan_chunks(1_000_000, 100, 0);
        assert_eq!(spans.len(), MAX_CHUNKS);
    }

    #[test]
    fn test_plan_chunks_empty_image() {
        assert!(plan_chunks(0, 1680, 20).is_empty());
    }

    #[test]
    fn test_crop_region() {
        let img = GrayImage::from_fn(100, 200, |x, y| Luma([(x + y) as u8]));
        let cropped = crop_region(
            &img,
            Region {
                x: 10,
                y: 50,
                width: 50,
                height: 20,
            },
        );

        assert_eq!(cropped.dimensions(), (50, 20));
        assert_eq!(cropped.get_pixel(0, 0)[0], 60);
    }

    #[test]
    fn test_crop_region_clamps() {
        let img = GrayImage::new(100, 100);
        let cropped = crop_region(
            &img,
            Region {
                x: 90,
                y: 90,
                width: 50,
                height: 50,
            },
        );
        assert_eq!(cropped.dimensions(), (10, 10));
    }

    #[test]
    fn test_binarize_dark_text_on_light() {
        let img = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 2 { 20 } else { 230 }]));
        let result = binarize(&img);

        assert_eq!(result.get_pixel(0, 0)[0], 0, "Text should stay black");
        assert_eq!(result.get_pixel(5, 0)[0], 255, "Background should be white");
    }

    #[test]
    fn test_binarize_inverts_light_text_on_dark() {
        let img = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 2 { 240 } else { 30 }]));
        let result = binarize(&img);

        assert_eq!(result.get_pixel(0, 0)[0], 0, "Light text should become black");
        assert_eq!(result.get_pixel(5, 0)[0], 255, "Dark background should become white");
    }

    #[test]
    fn test_prepare_for_ocr_scales() {
        let img = GrayImage::from_fn(20, 10, |x, _| Luma([if x % 5 == 0 { 10 } else { 220 }]));
        let prepared = prepare_for_ocr(&img, 2, 1.5);
        assert_eq!(prepared.dimensions(), (40, 20));
    }
}
