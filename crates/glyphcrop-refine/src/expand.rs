use glyphcrop_core::GlyphBox;

/// Pad `bbox` by `margin` on every side and clamp to `[0, max_w] x [0, max_h]`.
///
/// A negative margin shrinks the box. If shrinking crosses the edges over,
/// the axis collapses to its midpoint, so `x1 >= x0` and `y1 >= y0` always
/// hold. Zero-size input stays zero-size.
pub fn expand(bbox: GlyphBox, margin: i32, max_w: u32, max_h: u32) -> GlyphBox {
    let padded = GlyphBox {
        x0: bbox.x0.saturating_sub(margin),
        y0: bbox.y0.saturating_sub(margin),
        x1: bbox.x1.saturating_add(margin),
        y1: bbox.y1.saturating_add(margin),
    }
    .clamp_to(max_w, max_h);

    let (x0, x1) = ordered(padded.x0, padded.x1);
    let (y0, y1) = ordered(padded.y0, padded.y1);
    GlyphBox { x0, y0, x1, y1 }
}

fn ordered(lo: i32, hi: i32) -> (i32, i32) {
    if hi >= lo {
        (lo, hi)
    } else {
        let mid = lo + (hi - lo) / 2;
        (mid, mid)
    }
}
