pub mod engine;
pub mod preprocess;
pub mod setup;

pub use engine::{lines_to_text, TesseractEngine, TextScanner};
pub use preprocess::{plan_chunks, prepare_for_ocr, Region};
pub use setup::{check_dependencies, locate_tesseract};
