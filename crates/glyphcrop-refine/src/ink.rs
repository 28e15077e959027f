use glyphcrop_core::{GlyphBox, RawImage};

/// Relative luminance (Rec. 709 weights) of an sRGB pixel, 0.0..=255.0.
#[inline]
pub fn luminance([r, g, b]: [u8; 3]) -> f32 {
    0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32
}

/// Tightest box around the "ink" pixels of `region`.
///
/// A pixel is ink when its luminance is strictly below `threshold`. Alpha is
/// ignored. The result is in image coordinates. `region` is clipped to the
/// image first; `None` means no pixel qualified (or the clipped region is
/// empty) and the caller has to choose a fallback box.
pub fn scan_ink(image: &RawImage, region: GlyphBox, threshold: u8) -> Option<GlyphBox> {
    let r = region.clamp_to(image.width, image.height);
    if r.is_empty() {
        return None;
    }

    let thr = threshold as f32;
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = -1;
    let mut max_y = -1;

    for y in r.y0..r.y1 {
        for x in r.x0..r.x1 {
            if luminance(image.rgb(x as u32, y as u32)) < thr {
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
            }
        }
    }

    if max_x < 0 {
        return None;
    }
    Some(GlyphBox::new(min_x, min_y, max_x + 1, max_y + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [u8; 4] = [255, 255, 255, 255];

    #[test]
    fn luminance_weights() {
        assert_eq!(luminance([0, 0, 0]), 0.0);
        assert!((luminance([255, 255, 255]) - 255.0).abs() < 1e-3);
        assert!(luminance([0, 255, 0]) > luminance([255, 0, 0]));
    }

    #[test]
    fn finds_exact_square() {
        let mut img = RawImage::filled(40, 30, WHITE);
        let square = GlyphBox::new(12, 8, 19, 15);
        img.fill_box(square, [0, 0, 0]);

        let found = scan_ink(&img, GlyphBox::new(5, 2, 30, 25), 220);
        assert_eq!(found, Some(square));
    }

    #[test]
    fn white_region_has_no_content() {
        let img = RawImage::filled(20, 20, WHITE);
        assert_eq!(scan_ink(&img, GlyphBox::new(0, 0, 20, 20), 220), None);
    }

    #[test]
    fn ink_outside_region_is_ignored() {
        let mut img = RawImage::filled(20, 20, WHITE);
        img.fill_box(GlyphBox::new(15, 15, 18, 18), [0, 0, 0]);
        assert_eq!(scan_ink(&img, GlyphBox::new(0, 0, 10, 10), 220), None);
    }

    #[test]
    fn threshold_is_strict() {
        let mut img = RawImage::filled(10, 10, WHITE);
        img.fill_box(GlyphBox::new(3, 3, 4, 4), [0, 0, 0]);
        assert_eq!(scan_ink(&img, img.bounds(), 0), None);
        assert_eq!(
            scan_ink(&img, img.bounds(), 1),
            Some(GlyphBox::new(3, 3, 4, 4))
        );
    }

    #[test]
    fn region_is_clipped_to_image() {
        let mut img = RawImage::filled(10, 10, WHITE);
        img.fill_box(GlyphBox::new(8, 8, 10, 10), [0, 0, 0]);
        assert_eq!(
            scan_ink(&img, GlyphBox::new(-5, -5, 50, 50), 220),
            Some(GlyphBox::new(8, 8, 10, 10))
        );
        assert_eq!(scan_ink(&img, GlyphBox::new(12, 12, 20, 20), 220), None);
    }

    #[test]
    fn light_gray_is_background() {
        let mut img = RawImage::filled(10, 10, WHITE);
        img.fill_box(GlyphBox::new(2, 2, 5, 5), [230, 230, 230]);
        img.fill_box(GlyphBox::new(6, 6, 7, 8), [30, 30, 30]);
        assert_eq!(
            scan_ink(&img, img.bounds(), 220),
            Some(GlyphBox::new(6, 6, 7, 8))
        );
    }
}
