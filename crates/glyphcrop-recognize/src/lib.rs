pub mod config;
pub mod tesseract;

pub use config::{PageSegMode, TesseractConfig};
pub use tesseract::TesseractRecognizer;
