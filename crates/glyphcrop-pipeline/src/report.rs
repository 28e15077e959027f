//! Tabular and structured summaries for the two output bundles.

use std::collections::BTreeMap;
use std::io::Cursor;

use glyphcrop_core::{ArchiveSink, Confidence, GlyphError, GlyphLevel, PixelRect, Result};
use glyphcrop_refine::Script;
use serde::Serialize;

use crate::aggregate::{visible_whitespace, BucketLabel, CharBucket};
use crate::archive::ZipSink;
use crate::output::{BatchOutput, ImageGroup};

pub const IMAGE_TSV_HEADER: &str = "idx\tlevel\ttext\tconf\tleft\ttop\twidth\theight\tsource";
pub const LABEL_TSV_HEADER: &str =
    "idx\tsource_image\tcrop_filename\ttext\tconf\tleft\ttop\twidth\theight";

/// Confidence statistics of one label within one image.
///
/// Only finite scores contribute to the averages; the fields are `null` when
/// no detection of the label had a usable score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelStats {
    pub count: usize,
    pub avg_conf: Option<f32>,
    pub min_conf: Option<f32>,
    pub max_conf: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemRecord {
    pub index: usize,
    pub text: String,
    pub confidence: Confidence,
    pub bbox: PixelRect,
    pub crop_box: PixelRect,
    pub crop_file: String,
}

/// Structured metadata for one source image.
#[derive(Debug, Clone, Serialize)]
pub struct ImageSummary {
    pub source_image: String,
    pub level: &'static str,
    pub script: Option<Script>,
    pub width: u32,
    pub height: u32,
    pub count: usize,
    pub labels: BTreeMap<String, LabelStats>,
    pub items: Vec<ItemRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketEntryRecord {
    pub index: usize,
    pub source_image: String,
    pub crop_filename: String,
    pub text: String,
    pub confidence: Confidence,
    pub bbox: PixelRect,
    pub crop_box: PixelRect,
}

/// Structured metadata for one label bucket.
#[derive(Debug, Clone, Serialize)]
pub struct BucketSummary {
    pub label: String,
    pub folder: String,
    pub count: usize,
    pub entries: Vec<BucketEntryRecord>,
}

/// The two output bundles of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bundle {
    ByImage,
    ByLabel,
}

impl Bundle {
    pub const ALL: [Bundle; 2] = [Bundle::ByImage, Bundle::ByLabel];

    /// Base name of the bundle: zip stem or directory name.
    pub fn name(self) -> &'static str {
        match self {
            Bundle::ByImage => "ocr_crops_by_image",
            Bundle::ByLabel => "ocr_crops_by_label",
        }
    }
}

/// Renders reports and writes both bundles.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    level: GlyphLevel,
    script: Option<Script>,
}

impl ReportBuilder {
    pub fn new(level: GlyphLevel, script: Option<Script>) -> Self {
        Self { level, script }
    }

    /// Folder holding an image's crops inside the by-image bundle.
    pub fn crop_folder(&self, source_image: &str) -> String {
        format!("{source_image}_crops_{}", self.level.tag())
    }

    /// Tab-separated table of an image's surviving detections, one header row
    /// plus one row per detection.
    pub fn image_tsv(&self, group: &ImageGroup) -> String {
        let mut lines = Vec::with_capacity(group.glyphs.len() + 1);
        lines.push(IMAGE_TSV_HEADER.to_string());
        for glyph in &group.glyphs {
            let d = &glyph.detection;
            lines.push(format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                glyph.index,
                self.level.tag(),
                visible_whitespace(&d.text),
                d.confidence,
                d.bbox.x0,
                d.bbox.y0,
                d.bbox.width(),
                d.bbox.height(),
                group.source_image,
            ));
        }
        lines.join("\n")
    }

    pub fn image_summary(&self, group: &ImageGroup) -> ImageSummary {
        let mut scores: BTreeMap<String, (usize, Vec<f32>)> = BTreeMap::new();
        for glyph in &group.glyphs {
            let label = BucketLabel::normalize(&glyph.detection.text);
            let slot = scores.entry(label.as_str().to_string()).or_default();
            slot.0 += 1;
            slot.1.extend(glyph.detection.confidence.finite());
        }
        let labels = scores
            .into_iter()
            .map(|(label, (count, finite))| (label, label_stats(count, &finite)))
            .collect();

        let items = group
            .glyphs
            .iter()
            .map(|g| ItemRecord {
                index: g.index,
                text: g.detection.text.clone(),
                confidence: g.detection.confidence,
                bbox: g.detection.bbox.to_rect(),
                crop_box: g.crop_box.to_rect(),
                crop_file: g.crop_filename.clone(),
            })
            .collect();

        ImageSummary {
            source_image: group.source_image.clone(),
            level: self.level.tag(),
            script: self.script,
            width: group.width,
            height: group.height,
            count: group.glyphs.len(),
            labels,
            items,
        }
    }

    /// Tab-separated table of every occurrence of one label in the batch.
    pub fn label_tsv(&self, bucket: &CharBucket) -> String {
        let mut lines = Vec::with_capacity(bucket.entries.len() + 1);
        lines.push(LABEL_TSV_HEADER.to_string());
        for (i, e) in bucket.entries.iter().enumerate() {
            lines.push(format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                i,
                e.source_image,
                e.crop_filename,
                visible_whitespace(&e.text),
                e.confidence,
                e.bbox.x0,
                e.bbox.y0,
                e.bbox.width(),
                e.bbox.height(),
            ));
        }
        lines.join("\n")
    }

    pub fn label_summary(&self, bucket: &CharBucket) -> BucketSummary {
        BucketSummary {
            label: bucket.label.as_str().to_string(),
            folder: bucket.safe_label.clone(),
            count: bucket.entries.len(),
            entries: bucket
                .entries
                .iter()
                .enumerate()
                .map(|(i, e)| BucketEntryRecord {
                    index: i,
                    source_image: e.source_image.clone(),
                    crop_filename: e.crop_filename.clone(),
                    text: e.text.clone(),
                    confidence: e.confidence,
                    bbox: e.bbox.to_rect(),
                    crop_box: e.crop_box.to_rect(),
                })
                .collect(),
        }
    }

    /// Write the "grouped by image" bundle and finish the sink.
    pub fn write_image_bundle<S: ArchiveSink + ?Sized>(
        &self,
        output: &BatchOutput,
        sink: &mut S,
    ) -> Result<()> {
        let tag = self.level.tag();
        for group in &output.images {
            let name = &group.source_image;
            sink.add(&format!("{name}.tsv.txt"), self.image_tsv(group).as_bytes())?;
            sink.add(
                &format!("{name}.metadata.{tag}.json"),
                &to_json(&self.image_summary(group))?,
            )?;
            let folder = self.crop_folder(name);
            for glyph in &group.glyphs {
                sink.add(&format!("{folder}/{}", glyph.crop_filename), &glyph.png)?;
            }
        }
        sink.finish()
    }

    /// Write the "grouped by label" bundle and finish the sink.
    pub fn write_label_bundle<S: ArchiveSink + ?Sized>(
        &self,
        output: &BatchOutput,
        sink: &mut S,
    ) -> Result<()> {
        for bucket in &output.buckets {
            let folder = &bucket.safe_label;
            sink.add(&format!("{folder}.tsv.txt"), self.label_tsv(bucket).as_bytes())?;
            sink.add(
                &format!("{folder}.metadata.json"),
                &to_json(&self.label_summary(bucket))?,
            )?;
            for entry in &bucket.entries {
                sink.add(&format!("{folder}/{}", entry.crop_filename), &entry.png)?;
            }
        }
        sink.finish()
    }
}

impl ReportBuilder {
    pub fn write_bundle<S: ArchiveSink + ?Sized>(
        &self,
        bundle: Bundle,
        output: &BatchOutput,
        sink: &mut S,
    ) -> Result<()> {
        match bundle {
            Bundle::ByImage => self.write_image_bundle(output, sink),
            Bundle::ByLabel => self.write_label_bundle(output, sink),
        }
    }

    /// Bundle packed as an in-memory zip archive.
    pub fn zip_bundle(&self, bundle: Bundle, output: &BatchOutput) -> Result<Vec<u8>> {
        let mut sink = ZipSink::new(Cursor::new(Vec::new()));
        self.write_bundle(bundle, output, &mut sink)?;
        sink.into_inner()
            .map(Cursor::into_inner)
            .ok_or_else(|| GlyphError::Archive(format!("{} was not finished", bundle.name())))
    }
}

fn label_stats(count: usize, finite: &[f32]) -> LabelStats {
    if finite.is_empty() {
        return LabelStats {
            count,
            avg_conf: None,
            min_conf: None,
            max_conf: None,
        };
    }
    let sum: f32 = finite.iter().sum();
    LabelStats {
        count,
        avg_conf: Some(sum / finite.len() as f32),
        min_conf: finite.iter().copied().reduce(f32::min),
        max_conf: finite.iter().copied().reduce(f32::max),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| GlyphError::Serialize(e.to_string()))
}
