use std::sync::Arc;

use glyphcrop_core::{Detection, GlyphBox};

use crate::aggregate::CharBucket;

/// One surviving detection of an image together with its crop.
#[derive(Debug, Clone)]
pub struct GlyphCrop {
    /// Position among the image's surviving detections.
    pub index: usize,
    pub detection: Detection,
    pub crop_box: GlyphBox,
    /// File name inside the image's crop folder.
    pub crop_filename: String,
    pub png: Arc<[u8]>,
}

/// All crops of one source image.
#[derive(Debug, Clone)]
pub struct ImageGroup {
    /// Unique, path-safe name of the source image within the batch.
    pub source_image: String,
    pub width: u32,
    pub height: u32,
    pub glyphs: Vec<GlyphCrop>,
}

/// Result of a finished batch: per-image groups in input order and the
/// label buckets in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct BatchOutput {
    pub images: Vec<ImageGroup>,
    pub buckets: Vec<CharBucket>,
}

impl BatchOutput {
    pub fn glyph_count(&self) -> usize {
        self.images.iter().map(|g| g.glyphs.len()).sum()
    }
}
