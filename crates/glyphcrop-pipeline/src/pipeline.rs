use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use glyphcrop_core::{Detection, GlyphError, GlyphRecognizer, RawImage, Result, SourceImage};
use glyphcrop_recognize::TesseractRecognizer;
use glyphcrop_refine::{crop_png, decode_rgba, Rejection};

use crate::aggregate::{safe_file_name, sanitize, CharBucketAggregator, CropEntry};
use crate::config::PipelineConfig;
use crate::output::{BatchOutput, GlyphCrop, ImageGroup};
use crate::report::ReportBuilder;

/// Releases the engine on every exit path. Release failures are logged and
/// swallowed.
struct EngineGuard<R: GlyphRecognizer> {
    engine: R,
}

impl<R: GlyphRecognizer> Drop for EngineGuard<R> {
    fn drop(&mut self) {
        match self.engine.release() {
            Ok(()) => tracing::info!(engine = self.engine.name(), "engine released"),
            Err(e) => tracing::warn!(engine = self.engine.name(), error = %e, "engine release failed"),
        }
    }
}

/// Detections dropped by the filter, per reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterCounts {
    pub blank: usize,
    pub too_small: usize,
    pub outside_script: usize,
}

impl FilterCounts {
    fn count(&mut self, reason: Rejection) {
        match reason {
            Rejection::BlankText => self.blank += 1,
            Rejection::TooSmall => self.too_small += 1,
            Rejection::OutsideScript => self.outside_script += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.blank + self.too_small + self.outside_script
    }
}

/// The glyph pipeline: recognize → filter → refine → crop → aggregate.
///
/// Images are processed strictly one at a time. The only blocking point per
/// image is the engine call, which completes before refinement starts; the
/// label aggregator is owned by the running batch and returned with its
/// output.
pub struct GlyphPipeline {
    config: PipelineConfig,
}

impl GlyphPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Report builder matching this pipeline's level and script filter.
    pub fn reports(&self) -> ReportBuilder {
        ReportBuilder::new(self.config.level, self.config.filter.script)
    }

    /// Run a batch with the Tesseract engine from the configuration.
    pub fn run_tesseract(&self, sources: &[SourceImage]) -> Result<BatchOutput> {
        self.run(|| TesseractRecognizer::new(&self.config.engine), sources)
    }

    /// Run a batch.
    ///
    /// `acquire` is called once; its failure aborts the batch with
    /// `EngineUnavailable` before any image is touched. The first failing
    /// image aborts the rest of the batch. The engine is released on every
    /// path.
    pub fn run<R, F>(&self, acquire: F, sources: &[SourceImage]) -> Result<BatchOutput>
    where
        R: GlyphRecognizer,
        F: FnOnce() -> Result<R>,
    {
        let start = Instant::now();
        tracing::info!(images = sources.len(), level = %self.config.level, "starting glyph batch");

        let engine = acquire().map_err(|e| match e {
            GlyphError::EngineUnavailable(_) => e,
            other => GlyphError::EngineUnavailable(other.to_string()),
        });
        let mut guard = match engine {
            Ok(engine) => EngineGuard { engine },
            Err(e) => {
                tracing::error!(error = %e, "batch aborted");
                return Err(e);
            }
        };

        let mut aggregator = CharBucketAggregator::new();
        let mut images = Vec::with_capacity(sources.len());
        let mut names = HashSet::new();

        for source in sources {
            let name = unique_name(&mut names, &source.name);
            match self.process_source(&mut guard.engine, source, name, &mut aggregator) {
                Ok(group) => images.push(group),
                Err(e) => {
                    tracing::error!(image = %source.name, error = %e, "batch aborted");
                    return Err(e);
                }
            }
        }
        drop(guard);

        let output = BatchOutput {
            images,
            buckets: aggregator.into_buckets(),
        };
        tracing::info!(
            images = output.images.len(),
            glyphs = output.glyph_count(),
            labels = output.buckets.len(),
            elapsed_ms = start.elapsed().as_secs_f32() * 1000.0,
            "glyph batch complete"
        );
        Ok(output)
    }

    fn process_source<R: GlyphRecognizer>(
        &self,
        engine: &mut R,
        source: &SourceImage,
        name: String,
        aggregator: &mut CharBucketAggregator,
    ) -> Result<ImageGroup> {
        tracing::info!(image = %name, "=== {} ===", source.name);

        let image = decode_rgba(&source.data)?;
        let detections = engine
            .recognize(&image, self.config.level)
            .map_err(|e| tag_recognition_error(e, &source.name))?;

        self.process_detections(name, &image, detections, aggregator)
    }

    /// Filter, refine, crop and record the detections of one decoded image.
    pub fn process_detections(
        &self,
        source_image: String,
        image: &RawImage,
        detections: Vec<Detection>,
        aggregator: &mut CharBucketAggregator,
    ) -> Result<ImageGroup> {
        let raw_count = detections.len();
        let mut dropped = FilterCounts::default();
        let mut glyphs = Vec::new();

        for detection in detections {
            if let Some(reason) = self.config.filter.rejection(&detection) {
                dropped.count(reason);
                continue;
            }

            let index = glyphs.len();
            let crop_box = self.config.refine.refine(detection.bbox, image);
            let png: Arc<[u8]> = crop_png(image, crop_box)?.into();
            let safe_text = sanitize(&detection.text);
            let crop_filename = format!("{index:05}_{safe_text}.png");

            aggregator.record(
                &detection.text,
                CropEntry {
                    source_image: source_image.clone(),
                    crop_filename: format!("{source_image}__{crop_filename}"),
                    text: detection.text.clone(),
                    confidence: detection.confidence,
                    bbox: detection.bbox,
                    crop_box,
                    png: Arc::clone(&png),
                },
            );

            glyphs.push(GlyphCrop {
                index,
                detection,
                crop_box,
                crop_filename,
                png,
            });
        }

        tracing::info!(
            image = %source_image,
            detections = raw_count,
            dropped = dropped.total(),
            dropped_blank = dropped.blank,
            dropped_small = dropped.too_small,
            dropped_script = dropped.outside_script,
            "crops: {}",
            glyphs.len()
        );

        Ok(ImageGroup {
            source_image,
            width: image.width,
            height: image.height,
            glyphs,
        })
    }
}

/// Attach the image name to an engine error; anything the engine raises on
/// an image counts as a recognition failure.
fn tag_recognition_error(e: GlyphError, source_image: &str) -> GlyphError {
    let message = match e {
        GlyphError::Recognition { message, .. } => message,
        other => other.to_string(),
    };
    GlyphError::Recognition {
        source_image: source_image.to_string(),
        message,
    }
}

/// Path-safe name for `raw`, unique within the batch ignoring case.
/// `taken` holds the lowercased names handed out so far.
fn unique_name(taken: &mut HashSet<String>, raw: &str) -> String {
    let base = safe_file_name(raw);
    let mut name = base.clone();
    let mut n = 2;
    while !taken.insert(name.to_lowercase()) {
        name = format!("{base} ({n})");
        n += 1;
    }
    name
}
