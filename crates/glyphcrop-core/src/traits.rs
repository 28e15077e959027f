use crate::error::Result;
use crate::types::{Detection, GlyphLevel, RawImage};

/// The recognition engine boundary.
///
/// One instance is acquired per batch and driven strictly sequentially:
/// `recognize` is called once per image and must complete before the next
/// call. `release` frees the engine and must be safe to call more than once.
pub trait GlyphRecognizer {
    /// Human-readable name for tracing.
    fn name(&self) -> &str;

    /// Detect glyphs in an RGBA image, in engine reading order.
    fn recognize(&mut self, image: &RawImage, level: GlyphLevel) -> Result<Vec<Detection>>;

    /// Release engine resources. Subsequent calls are no-ops.
    fn release(&mut self) -> Result<()>;
}

/// Outbound archive boundary: a bundle of named byte payloads.
///
/// Paths are `/`-separated and relative to the bundle root; folders are
/// implied by the path.
pub trait ArchiveSink {
    fn add(&mut self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Flush and close the bundle.
    fn finish(&mut self) -> Result<()>;
}

impl<T: ArchiveSink + ?Sized> ArchiveSink for Box<T> {
    fn add(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        (**self).add(path, bytes)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}
