//! Raster I/O around the refinement stage: decode input files to RGBA,
//! cut crop regions, and encode crops as PNG.

use std::io::Cursor;

use glyphcrop_core::{GlyphBox, GlyphError, RawImage, Result};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};

/// Decode image bytes (PNG, JPEG, TIFF, ...) into an RGBA `RawImage`.
pub fn decode_rgba(data: &[u8]) -> Result<RawImage> {
    let img = image::load_from_memory(data).map_err(|e| GlyphError::ImageDecode(e.to_string()))?;
    let rgba = img.to_rgba8();
    let width = rgba.width();
    let height = rgba.height();
    if width == 0 || height == 0 {
        return Err(GlyphError::ImageDecode(format!(
            "image has zero area ({width}x{height})"
        )));
    }
    RawImage::from_rgba(width, height, rgba.into_raw())
        .ok_or_else(|| GlyphError::ImageDecode("RGBA buffer size mismatch".into()))
}

/// Copy the pixels of `bbox` (clipped to the image) into a new image.
///
/// Returns an empty (0x0) image when the clipped box covers nothing.
pub fn crop_region(page: &RawImage, bbox: GlyphBox) -> RawImage {
    let b = bbox.clamp_to(page.width, page.height);
    let channels = page.channels;
    if b.is_empty() {
        return RawImage {
            data: Vec::new(),
            width: 0,
            height: 0,
            channels,
        };
    }

    let (x0, y0) = (b.x0 as usize, b.y0 as usize);
    let w = b.width() as usize;
    let h = b.height() as usize;
    let c = channels as usize;
    let src_stride = page.width as usize * c;
    let dst_stride = w * c;
    let mut pixels = vec![0u8; h * dst_stride];

    for row in 0..h {
        let src_start = (y0 + row) * src_stride + x0 * c;
        let dst_start = row * dst_stride;
        pixels[dst_start..dst_start + dst_stride]
            .copy_from_slice(&page.data[src_start..src_start + dst_stride]);
    }

    RawImage {
        data: pixels,
        width: w as u32,
        height: h as u32,
        channels,
    }
}

/// Encode a 1-, 3- or 4-channel image as PNG.
pub fn encode_png(img: &RawImage) -> Result<Vec<u8>> {
    let mismatch = || {
        GlyphError::ImageEncode(format!(
            "buffer of {} bytes does not fit {}x{}x{}",
            img.data.len(),
            img.width,
            img.height,
            img.channels
        ))
    };

    let dynamic = match img.channels {
        4 => DynamicImage::ImageRgba8(
            RgbaImage::from_raw(img.width, img.height, img.data.clone()).ok_or_else(mismatch)?,
        ),
        3 => DynamicImage::ImageRgb8(
            RgbImage::from_raw(img.width, img.height, img.data.clone()).ok_or_else(mismatch)?,
        ),
        1 => DynamicImage::ImageLuma8(
            GrayImage::from_raw(img.width, img.height, img.data.clone()).ok_or_else(mismatch)?,
        ),
        n => {
            return Err(GlyphError::ImageEncode(format!(
                "unsupported channel count {n}"
            )))
        }
    };

    let mut out = Vec::new();
    dynamic
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| GlyphError::ImageEncode(e.to_string()))?;
    Ok(out)
}

/// Crop `bbox` out of `page` and encode it as PNG in one step.
pub fn crop_png(page: &RawImage, bbox: GlyphBox) -> Result<Vec<u8>> {
    encode_png(&crop_region(page, bbox))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: u32, h: u32) -> RawImage {
        let mut img = RawImage::filled(w, h, [255, 255, 255, 255]);
        for y in 0..h as i32 {
            for x in 0..w as i32 {
                if (x + y) % 2 == 0 {
                    img.fill_box(GlyphBox::new(x, y, x + 1, y + 1), [0, 0, 0]);
                }
            }
        }
        img
    }

    #[test]
    fn crop_copies_expected_pixels() {
        let img = checker(6, 4);
        let crop = crop_region(&img, GlyphBox::new(1, 1, 4, 3));
        assert_eq!((crop.width, crop.height), (3, 2));
        assert_eq!(crop.rgb(0, 0), img.rgb(1, 1));
        assert_eq!(crop.rgb(2, 1), img.rgb(3, 2));
    }

    #[test]
    fn crop_clips_to_page() {
        let img = checker(6, 4);
        let crop = crop_region(&img, GlyphBox::new(4, 2, 10, 10));
        assert_eq!((crop.width, crop.height), (2, 2));
        let empty = crop_region(&img, GlyphBox::new(8, 8, 9, 9));
        assert_eq!((empty.width, empty.height), (0, 0));
    }

    #[test]
    fn png_decodes_back_to_same_pixels() {
        let img = checker(5, 3);
        let png = encode_png(&img).unwrap();
        assert_eq!(&png[1..4], b"PNG");

        let decoded = decode_rgba(&png).unwrap();
        assert_eq!((decoded.width, decoded.height), (5, 3));
        assert_eq!(decoded.data, img.data);
    }

    #[test]
    fn encode_rejects_short_buffer() {
        let img = RawImage {
            data: vec![0; 5],
            width: 2,
            height: 2,
            channels: 3,
        };
        assert!(matches!(encode_png(&img), Err(GlyphError::ImageEncode(_))));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode_rgba(b"definitely not an image"),
            Err(GlyphError::ImageDecode(_))
        ));
    }
}
