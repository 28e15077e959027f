use glyphcrop_core::{GlyphBox, RawImage};
use serde::{Deserialize, Serialize};

use crate::expand::expand;
use crate::ink::scan_ink;

/// Turns the engine's coarse box into a crop box that hugs the glyph's ink.
///
/// Steps:
/// 1. pad the raw box by `pre_margin` (the engine box is often loose or offset)
/// 2. tighten to the ink inside the padded box, or keep the padded box when
///    there is no ink
/// 3. pad again by `post_margin` for a small visual border
/// 4. force at least one pixel on each axis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxRefiner {
    /// Padding applied before the ink scan, in pixels.
    pub pre_margin: i32,
    /// Padding applied around the tightened box, in pixels.
    pub post_margin: i32,
    /// Pixels with luminance below this are ink (0..=255, lower = tighter).
    pub lum_threshold: u8,
}

impl Default for BoxRefiner {
    fn default() -> Self {
        Self {
            pre_margin: 2,
            post_margin: 2,
            lum_threshold: 220,
        }
    }
}

impl BoxRefiner {
    pub fn with_margins(mut self, pre: i32, post: i32) -> Self {
        self.pre_margin = pre;
        self.post_margin = post;
        self
    }

    /// Final crop box for `raw`. Always non-empty and inside the image,
    /// unless the image itself has zero area.
    pub fn refine(&self, raw: GlyphBox, image: &RawImage) -> GlyphBox {
        let (w, h) = (image.width, image.height);

        let padded = expand(raw, self.pre_margin, w, h);
        let tight = match scan_ink(image, padded, self.lum_threshold) {
            Some(tight) => tight,
            None => {
                tracing::debug!(raw = %raw, padded = %padded, "no ink in region, keeping padded box");
                padded
            }
        };
        let repadded = expand(tight, self.post_margin, w, h);

        let fixed = min_extent(repadded, w, h);
        if fixed != repadded {
            tracing::debug!(from = %repadded, to = %fixed, "degenerate crop box widened");
        }
        fixed
    }
}

/// Widen a zero-length axis to one pixel, staying inside `[0, max]`.
fn min_extent(b: GlyphBox, max_w: u32, max_h: u32) -> GlyphBox {
    let (x0, x1) = one_pixel(b.x0, b.x1, max_w as i32);
    let (y0, y1) = one_pixel(b.y0, b.y1, max_h as i32);
    GlyphBox { x0, y0, x1, y1 }
}

fn one_pixel(lo: i32, hi: i32, max: i32) -> (i32, i32) {
    if hi > lo || max <= 0 {
        (lo, hi)
    } else if lo < max {
        (lo, lo + 1)
    } else {
        (max - 1, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> RawImage {
        RawImage::filled(100, 50, [255, 255, 255, 255])
    }

    #[test]
    fn tightens_loose_box_around_ink() {
        let mut img = page();
        img.fill_box(GlyphBox::new(30, 10, 36, 20), [0, 0, 0]);
        let refined = BoxRefiner::default().refine(GlyphBox::new(26, 6, 40, 24), &img);
        assert_eq!(refined, GlyphBox::new(28, 8, 38, 22));
    }

    #[test]
    fn recovers_offset_box() {
        // Engine box clips the left column of the glyph; the pre-margin recovers it.
        let mut img = page();
        img.fill_box(GlyphBox::new(30, 10, 36, 20), [0, 0, 0]);
        let refined = BoxRefiner::default().refine(GlyphBox::new(31, 11, 36, 20), &img);
        assert_eq!(refined, GlyphBox::new(28, 8, 38, 22));
    }

    #[test]
    fn falls_back_to_padded_box_without_ink() {
        let refined = BoxRefiner::default().refine(GlyphBox::new(20, 20, 25, 25), &page());
        assert_eq!(refined, GlyphBox::new(16, 16, 29, 29));
    }

    #[test]
    fn stays_inside_image_at_corner() {
        let mut img = page();
        img.fill_box(GlyphBox::new(2, 2, 8, 8), [0, 0, 0]);
        let refined = BoxRefiner::default().refine(GlyphBox::new(0, 0, 10, 10), &img);
        assert_eq!(refined, GlyphBox::new(0, 0, 10, 10));
        assert!(GlyphBox::new(0, 0, 12, 12).contains(&refined));
    }

    #[test]
    fn degenerate_box_gets_one_pixel() {
        let refiner = BoxRefiner::default().with_margins(0, 0);
        let refined = refiner.refine(GlyphBox::new(100, 50, 100, 50), &page());
        assert_eq!(refined, GlyphBox::new(99, 49, 100, 50));

        let refined = refiner.refine(GlyphBox::new(5, 5, 5, 5), &page());
        assert_eq!(refined, GlyphBox::new(5, 5, 6, 6));
    }

    #[test]
    fn zero_margins_return_exact_ink() {
        let mut img = page();
        img.fill_box(GlyphBox::new(40, 5, 41, 45), [10, 10, 10]);
        let refined = BoxRefiner::default()
            .with_margins(0, 0)
            .refine(GlyphBox::new(35, 0, 50, 50), &img);
        assert_eq!(refined, GlyphBox::new(40, 5, 41, 45));
    }
}
