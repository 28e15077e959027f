use std::fmt;

use serde::{Deserialize, Serialize};

/// Axis-aligned box in integer pixel coordinates, `x1`/`y1` exclusive.
///
/// Coordinates are signed so that padding a box at the image border can be
/// expressed before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GlyphBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl GlyphBox {
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Box from a top-left corner and a size.
    pub const fn from_xywh(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self::new(left, top, left.saturating_add(width), top.saturating_add(height))
    }

    /// Saturates at `i32::MIN`/`i32::MAX` for boxes spanning the whole range.
    pub fn width(&self) -> i32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> i32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn area(&self) -> i64 {
        self.width().max(0) as i64 * self.height().max(0) as i64
    }

    /// True when the box covers no pixel.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Whether `other` lies entirely inside this box.
    pub fn contains(&self, other: &GlyphBox) -> bool {
        other.x0 >= self.x0 && other.y0 >= self.y0 && other.x1 <= self.x1 && other.y1 <= self.y1
    }

    /// Intersection with `[0, max_w] x [0, max_h]`.
    pub fn clamp_to(&self, max_w: u32, max_h: u32) -> GlyphBox {
        let mw = max_w.min(i32::MAX as u32) as i32;
        let mh = max_h.min(i32::MAX as u32) as i32;
        GlyphBox {
            x0: self.x0.clamp(0, mw),
            y0: self.y0.clamp(0, mh),
            x1: self.x1.clamp(0, mw),
            y1: self.y1.clamp(0, mh),
        }
    }

    /// `{left, top, width, height}` view used in reports.
    pub fn to_rect(&self) -> PixelRect {
        PixelRect {
            left: self.x0,
            top: self.y0,
            width: self.width(),
            height: self.height(),
        }
    }
}

impl fmt::Display for GlyphBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})-({},{})", self.x0, self.y0, self.x1, self.y1)
    }
}

/// Box expressed as origin plus size, the shape written to metadata files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// Engine-reported certainty, nominally 0..=100.
///
/// NaN marks "no confidence available" and is kept distinct from a low
/// score: it is never coerced to zero and is rendered literally.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(pub f32);

impl Confidence {
    pub const UNAVAILABLE: Confidence = Confidence(f32::NAN);

    /// The score when it is a finite number.
    pub fn finite(self) -> Option<f32> {
        self.0.is_finite().then_some(self.0)
    }
}

impl From<f32> for Confidence {
    fn from(v: f32) -> Self {
        Confidence(v)
    }
}

impl fmt::Display for Confidence {
    /// One fractional digit for finite scores, the literal value otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.finite() {
            Some(v) => write!(f, "{v:.1}"),
            None => write!(f, "{}", self.0),
        }
    }
}

/// One recognized unit as produced by the recognition engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub text: String,
    pub confidence: Confidence,
    pub bbox: GlyphBox,
}

impl Detection {
    pub fn new(text: impl Into<String>, confidence: f32, bbox: GlyphBox) -> Self {
        Self {
            text: text.into(),
            confidence: Confidence(confidence),
            bbox,
        }
    }
}

/// Granularity at which the engine reports detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlyphLevel {
    /// Single characters.
    #[default]
    Symbol,
    /// Whole words.
    Word,
}

impl GlyphLevel {
    /// Tag used in report columns and artifact names.
    pub fn tag(self) -> &'static str {
        match self {
            GlyphLevel::Symbol => "symbols",
            GlyphLevel::Word => "words",
        }
    }
}

impl fmt::Display for GlyphLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Decoded raster image, row-major, `channels` bytes per pixel.
///
/// The pipeline decodes everything to RGBA (`channels == 4`); 1- and 3-channel
/// buffers are accepted for tests and callers that already hold gray/RGB data.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

impl RawImage {
    /// Wrap an RGBA buffer. Returns `None` if the length does not match.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == width as usize * height as usize * 4).then_some(Self {
            data,
            width,
            height,
            channels: 4,
        })
    }

    /// Solid-colour RGBA image.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            data,
            width,
            height,
            channels: 4,
        }
    }

    /// The whole image as a box.
    pub fn bounds(&self) -> GlyphBox {
        GlyphBox::new(0, 0, self.width as i32, self.height as i32)
    }

    /// RGB of the pixel at `(x, y)`. Gray buffers replicate the single channel.
    ///
    /// Panics if `(x, y)` is outside the image.
    pub fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        let c = self.channels as usize;
        let i = (y as usize * self.width as usize + x as usize) * c;
        if c >= 3 {
            [self.data[i], self.data[i + 1], self.data[i + 2]]
        } else {
            let v = self.data[i];
            [v, v, v]
        }
    }

    /// Overwrite the colour channels of every pixel inside `region`.
    pub fn fill_box(&mut self, region: GlyphBox, rgb: [u8; 3]) {
        let r = region.clamp_to(self.width, self.height);
        let c = self.channels as usize;
        for y in r.y0..r.y1 {
            for x in r.x0..r.x1 {
                let i = (y as usize * self.width as usize + x as usize) * c;
                for k in 0..c.min(3) {
                    self.data[i + k] = rgb[k];
                }
            }
        }
    }
}

/// An input image as received from the caller: a display name plus the
/// encoded file bytes.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub name: String,
    pub data: Vec<u8>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}
