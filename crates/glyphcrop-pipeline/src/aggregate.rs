//! Batch-wide grouping of crops by recognized label.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use glyphcrop_core::{Confidence, GlyphBox};

/// File-name stand-in for a blank label.
pub const BLANK_NAME: &str = "space";

/// Visible placeholder for whitespace inside labels and TSV cells.
pub const SPACE_GLYPH: char = '\u{2420}';

/// Characters that break paths on at least one platform.
pub const RESERVED_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Byte cap for a sanitized label. Leaves room for the `~N` suffix, the
/// source-name prefix and extensions within a 255-byte path component.
pub const MAX_LABEL_BYTES: usize = 96;

/// Byte cap for a source image name used as a path segment.
pub const MAX_SOURCE_BYTES: usize = 120;

/// Cut `s` to at most `max` bytes without splitting a character.
fn truncate_bytes(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

/// Grouping key of a bucket: trimmed text, or the blank sentinel.
///
/// `Blank` is its own variant, so no recognized text can ever collide with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BucketLabel {
    Blank,
    Text(String),
}

impl BucketLabel {
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            BucketLabel::Blank
        } else {
            BucketLabel::Text(trimmed.to_string())
        }
    }

    /// Normalized text; empty for the blank label.
    pub fn as_str(&self) -> &str {
        match self {
            BucketLabel::Blank => "",
            BucketLabel::Text(t) => t,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, BucketLabel::Blank)
    }
}

impl fmt::Display for BucketLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketLabel::Blank => write!(f, "<blank>"),
            BucketLabel::Text(t) => f.write_str(t),
        }
    }
}

/// Filename-safe form of a glyph label.
///
/// Trims, maps blank to [`BLANK_NAME`], shows inner whitespace as
/// [`SPACE_GLYPH`], replaces [`RESERVED_CHARS`] and control characters with
/// `_`, caps the UTF-8 length at [`MAX_LABEL_BYTES`] and turns an all-dots
/// name into underscores.
/// `sanitize(sanitize(x)) == sanitize(x)` for every `x`.
pub fn sanitize(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return BLANK_NAME.to_string();
    }
    let mut out: String = trimmed
        .chars()
        .map(|c| {
            if c.is_whitespace() {
                SPACE_GLYPH
            } else if RESERVED_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    truncate_bytes(&mut out, MAX_LABEL_BYTES);
    if out.chars().all(|c| c == '.') {
        out = "_".repeat(out.chars().count());
    }
    out
}

/// `text` with every whitespace character shown as [`SPACE_GLYPH`].
/// Used for TSV cells so tabs and newlines never split a row.
pub fn visible_whitespace(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_whitespace() { SPACE_GLYPH } else { c })
        .collect()
}

/// Source image name made safe to use as an archive path segment, at most
/// [`MAX_SOURCE_BYTES`] long.
pub fn safe_file_name(name: &str) -> String {
    let mut cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if RESERVED_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    truncate_bytes(&mut cleaned, MAX_SOURCE_BYTES);
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        format!("image{cleaned}").replace('.', "_")
    } else {
        cleaned
    }
}

/// One crop as recorded under its label.
#[derive(Debug, Clone)]
pub struct CropEntry {
    pub source_image: String,
    /// File name of the crop inside the label's folder.
    pub crop_filename: String,
    pub text: String,
    pub confidence: Confidence,
    /// Engine box.
    pub bbox: GlyphBox,
    /// Refined box the crop was cut from.
    pub crop_box: GlyphBox,
    pub png: Arc<[u8]>,
}

/// Every crop in the batch sharing one label, in recording order.
#[derive(Debug, Clone)]
pub struct CharBucket {
    pub label: BucketLabel,
    /// Unique folder name for this bucket.
    pub safe_label: String,
    pub entries: Vec<CropEntry>,
}

/// Groups crops by label across a batch.
///
/// Buckets are created lazily on first sight of a label and kept in first-seen
/// order. Owned by one batch and handed back to the caller when it ends.
///
/// Folder names are unique ignoring case, and no folder shares its name with
/// another bucket's `.tsv.txt` or `.metadata.json` file.
#[derive(Debug, Default)]
pub struct CharBucketAggregator {
    buckets: Vec<CharBucket>,
    index: HashMap<BucketLabel, usize>,
    /// Lowercased bundle paths claimed so far.
    reserved: HashSet<String>,
}

/// Top-level bundle paths a label folder occupies, lowercased.
fn bucket_paths(folder: &str) -> [String; 3] {
    let folder = folder.to_lowercase();
    [
        format!("{folder}.tsv.txt"),
        format!("{folder}.metadata.json"),
        folder,
    ]
}

impl CharBucketAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entry` to the bucket of `label`, creating it if needed.
    /// Returns the bucket's position.
    pub fn record(&mut self, label: &str, entry: CropEntry) -> usize {
        let key = BucketLabel::normalize(label);
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => self.create_bucket(key),
        };
        self.buckets[slot].entries.push(entry);
        slot
    }

    fn create_bucket(&mut self, label: BucketLabel) -> usize {
        let base = sanitize(label.as_str());
        let mut name = base.clone();
        let mut n = 2;
        while bucket_paths(&name).iter().any(|p| self.reserved.contains(p)) {
            name = format!("{base}~{n}");
            n += 1;
        }
        self.reserved.extend(bucket_paths(&name));

        tracing::debug!(label = %label, folder = %name, "new label bucket");

        let slot = self.buckets.len();
        self.index.insert(label.clone(), slot);
        self.buckets.push(CharBucket {
            label,
            safe_label: name,
            entries: Vec::new(),
        });
        slot
    }

    pub fn get(&self, label: &str) -> Option<&CharBucket> {
        self.index
            .get(&BucketLabel::normalize(label))
            .map(|&slot| &self.buckets[slot])
    }

    pub fn buckets(&self) -> &[CharBucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total number of recorded crops.
    pub fn entry_count(&self) -> usize {
        self.buckets.iter().map(|b| b.entries.len()).sum()
    }

    pub fn into_buckets(self) -> Vec<CharBucket> {
        self.buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(source: &str, text: &str) -> CropEntry {
        CropEntry {
            source_image: source.into(),
            crop_filename: format!("{source}__{text}.png"),
            text: text.into(),
            confidence: Confidence(90.0),
            bbox: GlyphBox::new(0, 0, 10, 10),
            crop_box: GlyphBox::new(0, 0, 12, 12),
            png: Arc::from(&b"png"[..]),
        }
    }

    #[test]
    fn same_trimmed_text_shares_bucket() {
        let mut agg = CharBucketAggregator::new();
        let a = agg.record("א", entry("p1.png", "א"));
        let b = agg.record(" א ", entry("p2.png", " א "));
        assert_eq!(a, b);
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.get("א").map(|b| b.entries.len()), Some(2));
    }

    #[test]
    fn empty_text_goes_to_blank_bucket() {
        let mut agg = CharBucketAggregator::new();
        agg.record("", entry("p1.png", ""));
        agg.record("  \t", entry("p1.png", "  \t"));
        assert_eq!(agg.len(), 1);
        let bucket = &agg.buckets()[0];
        assert!(bucket.label.is_blank());
        assert_eq!(bucket.safe_label, BLANK_NAME);
        assert_eq!(bucket.entries.len(), 2);
    }

    #[test]
    fn blank_sentinel_differs_from_literal_space_label() {
        let mut agg = CharBucketAggregator::new();
        let blank = agg.record("", entry("p.png", ""));
        let word = agg.record("space", entry("p.png", "space"));
        assert_ne!(blank, word);
        let names: Vec<_> = agg.buckets().iter().map(|b| b.safe_label.as_str()).collect();
        assert_eq!(names, ["space", "space~2"]);
    }

    #[test]
    fn different_texts_never_share() {
        let mut agg = CharBucketAggregator::new();
        for t in ["א", "ב", "A", "a", "a:b", "a*b"] {
            agg.record(t, entry("p.png", t));
        }
        assert_eq!(agg.len(), 6);
        assert!(agg.buckets().iter().all(|b| b.entries.len() == 1));
        // "a:b" and "a*b" sanitize alike but keep distinct folders.
        let folders: HashSet<_> = agg.buckets().iter().map(|b| b.safe_label.clone()).collect();
        assert_eq!(folders.len(), 6);
    }

    #[test]
    fn folders_differing_only_in_case_are_kept_apart() {
        let mut agg = CharBucketAggregator::new();
        agg.record("A", entry("p.png", "A"));
        agg.record("a", entry("p.png", "a"));
        agg.record("Ω", entry("p.png", "Ω"));
        agg.record("ω", entry("p.png", "ω"));
        let names: Vec<_> = agg.buckets().iter().map(|b| b.safe_label.as_str()).collect();
        assert_eq!(names, ["A", "a~2", "Ω", "ω~2"]);
    }

    #[test]
    fn folder_never_shadows_a_report_file() {
        let mut agg = CharBucketAggregator::new();
        agg.record("x", entry("p.png", "x"));
        agg.record("x.tsv.txt", entry("p.png", "x.tsv.txt"));
        agg.record("X.metadata.json", entry("p.png", "X.metadata.json"));
        let names: Vec<_> = agg.buckets().iter().map(|b| b.safe_label.as_str()).collect();
        assert_eq!(names, ["x", "x.tsv.txt~2", "X.metadata.json~2"]);

        let mut reversed = CharBucketAggregator::new();
        reversed.record("x.tsv.txt", entry("p.png", "x.tsv.txt"));
        reversed.record("x", entry("p.png", "x"));
        let names: Vec<_> = reversed.buckets().iter().map(|b| b.safe_label.as_str()).collect();
        assert_eq!(names, ["x.tsv.txt", "x~2"]);
    }

    #[test]
    fn buckets_keep_first_seen_order() {
        let mut agg = CharBucketAggregator::new();
        for t in ["ג", "א", "ג", "ב", "א"] {
            agg.record(t, entry("p.png", t));
        }
        let order: Vec<_> = agg.buckets().iter().map(|b| b.label.as_str().to_string()).collect();
        assert_eq!(order, ["ג", "א", "ב"]);
        assert_eq!(agg.entry_count(), 5);
    }

    #[test]
    fn sanitize_replaces_reserved_and_whitespace() {
        assert_eq!(sanitize(" a b "), "a\u{2420}b");
        assert_eq!(sanitize("a/b\\c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize(""), BLANK_NAME);
        assert_eq!(sanitize("\n"), BLANK_NAME);
        assert_eq!(sanitize(".."), "__");
        assert_eq!(sanitize("a\u{0007}b"), "a_b");
        assert_eq!(sanitize("שלום"), "שלום");
    }

    #[test]
    fn sanitize_is_idempotent_and_safe() {
        let long = "x".repeat(200);
        let samples = [
            "", " ", "א", " a  b ", "..", ".", "a.b", "a/b", "\\\\", "<>", "?*", "\"q\"", "\t\n",
            "space", "␠", "a\u{0000}b", long.as_str(), "__", "a \u{00A0}b",
        ];
        for s in samples {
            let once = sanitize(s);
            assert_eq!(sanitize(&once), once, "not idempotent for {s:?}");
            assert!(!once.chars().any(|c| RESERVED_CHARS.contains(&c)), "{once:?}");
            assert!(!once.chars().any(|c| c.is_whitespace() || c.is_control()), "{once:?}");
            assert!(once != "." && once != "..");
            assert!(!once.is_empty());
        }
    }

    #[test]
    fn long_names_are_capped_in_bytes() {
        let hebrew = "ש".repeat(100);
        let label = sanitize(&hebrew);
        assert!(label.len() <= MAX_LABEL_BYTES);
        assert_eq!(label, "ש".repeat(MAX_LABEL_BYTES / 2));

        let wide = "\u{1D11E}".repeat(64);
        let label = sanitize(&wide);
        assert!(label.len() <= MAX_LABEL_BYTES);
        assert_eq!(label.chars().count(), MAX_LABEL_BYTES / 4);
        assert_eq!(sanitize(&label), label);

        let odd = format!("a{}", "ש".repeat(100));
        assert_eq!(sanitize(&odd).len(), MAX_LABEL_BYTES - 1);

        let source = safe_file_name(&format!("{}.png", "é".repeat(200)));
        assert!(source.len() <= MAX_SOURCE_BYTES);
        assert!(source.starts_with('é'));
    }

    #[test]
    fn visible_whitespace_keeps_untrimmed_text() {
        assert_eq!(visible_whitespace(" a\tb "), "\u{2420}a\u{2420}b\u{2420}");
    }

    #[test]
    fn file_names_are_path_safe() {
        assert_eq!(safe_file_name("scan 01.png"), "scan 01.png");
        assert_eq!(safe_file_name("dir/page?.png"), "dir_page_.png");
        assert_eq!(safe_file_name(""), "image");
        assert_eq!(safe_file_name(".."), "image__");
    }
}
