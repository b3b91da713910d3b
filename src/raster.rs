//! Raster image watermarking
//!
//! The two lines are drawn onto a transparent layer the size of the image
//! (shadow first, then the main color) and that layer is alpha-composited over
//! the decoded picture, so glyph edges blend with whatever is underneath.
//!
//! Failures never reach the caller: the original bytes come back instead and
//! the outcome says so. See [`FAILURE_POLICY`].

use std::fmt;
use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};

use ab_glyph::PxScale;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use tracing::{debug, error, info, instrument};

use crate::error::{Error, FailurePolicy};
use crate::font::FontResource;
use crate::style::WatermarkStyle;
use crate::text::TextLines;

/// Image failures are swallowed and the input is returned unchanged
pub const FAILURE_POLICY: FailurePolicy = FailurePolicy::RecoverWithOriginal;

/// Smallest font size in pixels, however small the image
pub const MIN_FONT_SIZE: u32 = 24;

/// Font size is the shorter image side divided by this
pub const FONT_SIZE_DIVISOR: u32 = 25;

/// Gap between the lines as a fraction of the line height
pub const LINE_SPACING_RATIO: f32 = 0.3;

/// Quality used when re-encoding lossy (or unknown) formats as JPEG
pub const JPEG_QUALITY: u8 = 85;

/// Source formats written back in their own container, losslessly
const LOSSLESS_FORMATS: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
    ImageFormat::Tga,
    ImageFormat::Qoi,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Whether the returned bytes carry the watermark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutcome {
    Watermarked,
    /// Watermarking failed and the input bytes were returned as-is
    Unmodified,
}

/// Result of [`watermark_image`]
#[derive(Debug, Clone)]
pub struct RasterOutput {
    pub bytes: Vec<u8>,
    pub outcome: ImageOutcome,
}

/// Placement of one line, top-left corner of its text box in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePlacement {
    pub x: i32,
    pub y: f32,
    pub width: u32,
    pub height: u32,
}

/// Where both lines go on a given image
#[derive(Debug, Clone, PartialEq)]
pub struct RasterLayout {
    pub font_size: u32,
    pub line_height: f32,
    pub line_spacing: f32,
    pub lines: [LinePlacement; 2],
}

/// Stage at which watermarking an image failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Decode,
    Encode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Decode => "decode",
            Stage::Encode => "encode",
        };
        f.write_str(name)
    }
}

/// How the composited image is written back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reencode {
    Lossless(ImageFormat),
    Jpeg,
}

impl Reencode {
    fn for_source(format: ImageFormat) -> Self {
        if LOSSLESS_FORMATS.contains(&format) {
            Reencode::Lossless(format)
        } else {
            Reencode::Jpeg
        }
    }
}

/// Font size for an image: `max(24, floor(min(w, h) / 25))`
pub fn font_size_for(width: u32, height: u32) -> u32 {
    (width.min(height) / FONT_SIZE_DIVISOR).max(MIN_FONT_SIZE)
}

/// Compute where both lines are drawn.
///
/// Each line is centered horizontally on its own width; the two-line block is
/// centered vertically as a unit.
pub fn compute_layout(width: u32, height: u32, lines: &TextLines, font: &FontResource) -> RasterLayout {
    let font_size = font_size_for(width, height);
    let scale = PxScale::from(font_size as f32);

    let sizes = lines
        .as_array()
        .map(|line| text_size(scale, font.font(), line));

    let line_height = sizes.iter().map(|&(_, h)| h).max().unwrap_or(0) as f32;
    let line_spacing = line_height * LINE_SPACING_RATIO;
    let block_height = 2.0 * line_height + line_spacing;

    let center_y = (height / 2) as f32;
    let first_y = center_y - (block_height / 2.0).floor();
    let second_y = first_y + line_height + line_spacing;

    let place = |(w, h): (u32, u32), y: f32| LinePlacement {
        x: (width as i32 - w as i32).div_euclid(2),
        y,
        width: w,
        height: h,
    };

    RasterLayout {
        font_size,
        line_height,
        line_spacing,
        lines: [place(sizes[0], first_y), place(sizes[1], second_y)],
    }
}

/// Burn the two-line watermark into an encoded raster image.
///
/// Never fails: if anything goes wrong the input bytes are returned untouched
/// with [`ImageOutcome::Unmodified`], and the failure is logged.
#[instrument(skip_all, fields(input_len = bytes.len()))]
pub fn watermark_image(bytes: &[u8], lines: &TextLines, font: &FontResource) -> RasterOutput {
    let attempt = panic::catch_unwind(AssertUnwindSafe(|| try_watermark_image(bytes, lines, font)));
    settle(bytes, attempt)
}

/// Turn the outcome of one attempt into what the caller gets back
fn settle(bytes: &[u8], attempt: std::thread::Result<Attempt>) -> RasterOutput {
    match attempt {
        Ok(Ok(watermarked)) => RasterOutput {
            bytes: watermarked,
            outcome: ImageOutcome::Watermarked,
        },
        Ok(Err((stage, e))) => {
            error!(stage = %stage, error = %e, "image watermarking failed, returning original");
            unmodified(bytes)
        }
        Err(_) => {
            error!("image watermarking panicked, returning original");
            unmodified(bytes)
        }
    }
}

fn unmodified(bytes: &[u8]) -> RasterOutput {
    RasterOutput {
        bytes: bytes.to_vec(),
        outcome: ImageOutcome::Unmodified,
    }
}

type Attempt = std::result::Result<Vec<u8>, (Stage, Error)>;

/// Decode by signature; bytes without one are tried as TGA, which has none
pub fn decode(bytes: &[u8]) -> image::ImageResult<(DynamicImage, ImageFormat)> {
    let format = image::guess_format(bytes).unwrap_or(ImageFormat::Tga);
    let decoded = image::load_from_memory_with_format(bytes, format)?;
    Ok((decoded, format))
}

fn try_watermark_image(bytes: &[u8], lines: &TextLines, font: &FontResource) -> Attempt {
    let (decoded, source_format) = decode(bytes).map_err(|e| (Stage::Decode, e.into()))?;
    let has_alpha = decoded.color().has_alpha();

    let mut canvas = decoded.to_rgba8();
    let (width, height) = canvas.dimensions();

    let layout = compute_layout(width, height, lines, font);
    debug!(
        width,
        height,
        font_size = layout.font_size,
        line_height = layout.line_height,
        "image watermark layout"
    );

    let layer = render_layer(width, height, lines, &layout, font, &WatermarkStyle::RASTER);
    imageops::overlay(&mut canvas, &layer, 0, 0);

    let target = Reencode::for_source(source_format);
    let encoded = encode(canvas, has_alpha, target).map_err(|e| (Stage::Encode, e))?;

    info!(
        ?source_format,
        ?target,
        output_len = encoded.len(),
        "image watermarked"
    );
    Ok(encoded)
}

/// Draw both lines on a fully transparent layer
fn render_layer(
    width: u32,
    height: u32,
    lines: &TextLines,
    layout: &RasterLayout,
    font: &FontResource,
    style: &WatermarkStyle,
) -> RgbaImage {
    let mut layer = RgbaImage::new(width, height);
    let scale = PxScale::from(layout.font_size as f32);
    let offset = style.shadow_offset.round() as i32;

    for (text, place) in lines.as_array().into_iter().zip(layout.lines) {
        if text.is_empty() {
            continue;
        }
        let y = place.y.round() as i32;

        if let Some(shadow) = style.shadow {
            draw_text_mut(&mut layer, Rgba(shadow), place.x + offset, y + offset, scale, font.font(), text);
        }
        draw_text_mut(&mut layer, Rgba(style.fill), place.x, y, scale, font.font(), text);
    }

    layer
}

fn encode(canvas: RgbaImage, has_alpha: bool, target: Reencode) -> crate::Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());

    match target {
        Reencode::Lossless(format) => {
            let image = if has_alpha {
                DynamicImage::ImageRgba8(canvas)
            } else {
                DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
            };
            image.write_to(&mut out, format)?;
        }
        Reencode::Jpeg => {
            let flattened = DynamicImage::ImageRgba8(canvas).to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
            flattened.write_with_encoder(encoder)?;
        }
    }

    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    fn white_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        let mut out = Cursor::new(Vec::new());
        let img = if format == ImageFormat::Jpeg {
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(img).to_rgb8())
        } else {
            DynamicImage::ImageRgba8(img)
        };
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    fn lines() -> TextLines {
        TextLines::new("Jane Doe", "555-123-4567")
    }

    #[test]
    fn test_font_size_rule() {
        assert_eq!(font_size_for(100, 100), 24);
        assert_eq!(font_size_for(600, 599), 24);
        assert_eq!(font_size_for(1000, 2000), 40);
        assert_eq!(font_size_for(2500, 3000), 100);
        assert_eq!(font_size_for(1024, 768), 30);
    }

    #[test]
    fn test_layout_centers_block() {
        let font = FontResource::bundled().unwrap();
        let layout = compute_layout(1000, 800, &lines(), &font);

        assert_eq!(layout.font_size, 32);
        let [first, second] = layout.lines;
        assert!(first.width > 0 && second.width > 0);
        assert_eq!(first.x, (1000 - first.width as i32).div_euclid(2));
        assert_eq!(second.x, (1000 - second.width as i32).div_euclid(2));
        assert!((layout.line_spacing - 0.3 * layout.line_height).abs() < 1e-4);
        assert!((second.y - first.y - layout.line_height - layout.line_spacing).abs() < 1e-4);

        // block straddles the vertical center
        let block_bottom = second.y + layout.line_height;
        assert!(first.y < 400.0 && block_bottom > 400.0);
        assert!(((first.y + block_bottom) / 2.0 - 400.0).abs() <= 1.0);
    }

    #[test]
    fn test_layout_with_empty_second_line() {
        let font = FontResource::bundled().unwrap();
        let layout = compute_layout(500, 500, &TextLines::new("CONFIDENTIAL", ""), &font);
        assert_eq!(layout.lines[1].width, 0);
        assert_eq!(layout.lines[1].x, 250);
        assert!(layout.line_height > 0.0);
    }

    #[test]
    fn test_png_keeps_format_and_size() {
        let font = FontResource::bundled().unwrap();
        let input = white_image(400, 300, ImageFormat::Png);

        let output = watermark_image(&input, &lines(), &font);
        assert_eq!(output.outcome, ImageOutcome::Watermarked);
        assert_ne!(output.bytes, input);
        assert_eq!(image::guess_format(&output.bytes).unwrap(), ImageFormat::Png);

        let decoded = image::load_from_memory(&output.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (400, 300));
    }

    #[test]
    fn test_watermark_darkens_center() {
        let font = FontResource::bundled().unwrap();
        let input = white_image(400, 300, ImageFormat::Png);

        let output = watermark_image(&input, &lines(), &font);
        let decoded = image::load_from_memory(&output.bytes).unwrap().to_rgba8();

        let touched = decoded.pixels().filter(|p| p[0] < 255).count();
        assert!(touched > 0, "watermark should change some pixels");

        // corners stay untouched
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(decoded.get_pixel(399, 299), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_jpeg_reencodes_as_jpeg() {
        let font = FontResource::bundled().unwrap();
        let input = white_image(320, 240, ImageFormat::Jpeg);

        let output = watermark_image(&input, &lines(), &font);
        assert_eq!(output.outcome, ImageOutcome::Watermarked);
        assert_eq!(image::guess_format(&output.bytes).unwrap(), ImageFormat::Jpeg);
        assert_eq!(
            image::load_from_memory(&output.bytes).unwrap().dimensions(),
            (320, 240)
        );
    }

    #[test]
    fn test_garbage_returns_original_bytes() {
        let font = FontResource::bundled().unwrap();
        let input = b"this is not an image".to_vec();

        let output = watermark_image(&input, &lines(), &font);
        assert_eq!(output.outcome, ImageOutcome::Unmodified);
        assert_eq!(output.bytes, input);
    }

    #[test]
    fn test_truncated_png_returns_original_bytes() {
        let font = FontResource::bundled().unwrap();
        let mut input = white_image(64, 64, ImageFormat::Png);
        input.truncate(40);

        let output = watermark_image(&input, &lines(), &font);
        assert_eq!(output.outcome, ImageOutcome::Unmodified);
        assert_eq!(output.bytes, input);
    }

    #[test]
    fn test_reencode_target() {
        for format in [
            ImageFormat::Png,
            ImageFormat::Bmp,
            ImageFormat::Tiff,
            ImageFormat::Tga,
            ImageFormat::Qoi,
            ImageFormat::Gif,
            ImageFormat::WebP,
        ] {
            assert_eq!(Reencode::for_source(format), Reencode::Lossless(format));
        }
        assert_eq!(Reencode::for_source(ImageFormat::Jpeg), Reencode::Jpeg);
    }

    #[test]
    fn test_tga_without_signature_is_decoded() {
        let font = FontResource::bundled().unwrap();
        let input = white_image(200, 200, ImageFormat::Tga);
        assert!(image::guess_format(&input).is_err());

        let output = watermark_image(&input, &lines(), &font);
        assert_eq!(output.outcome, ImageOutcome::Watermarked);
        let decoded = image::load_from_memory_with_format(&output.bytes, ImageFormat::Tga).unwrap();
        assert_eq!(decoded.dimensions(), (200, 200));
    }

    #[test]
    fn test_shadow_under_fill_then_composited() {
        let font = FontResource::bundled().unwrap();
        let (width, height) = (1500, 1500);
        let text = TextLines::new("HIL", "");
        let layout = compute_layout(width, height, &text, &font);
        assert_eq!(layout.font_size, 60);

        let style = WatermarkStyle::RASTER;
        let fill_only = render_layer(
            width,
            height,
            &text,
            &layout,
            &font,
            &WatermarkStyle { shadow: None, ..style },
        );
        let layer = render_layer(width, height, &text, &layout, &font, &style);

        let input = white_image(width, height, ImageFormat::Png);
        let output = watermark_image(&input, &text, &font);
        let composited = image::load_from_memory(&output.bytes).unwrap().to_rgba8();

        let covered = |x: u32, y: u32| fill_only.get_pixel(x, y)[3] >= 101;
        let near = |a: u8, b: u8, tolerance: u8| a.abs_diff(b) <= tolerance;

        let mut fill_over_shadow = 0;
        let mut shadow_only = 0;
        for y in 1..height {
            for x in 1..width {
                let shadowed = covered(x - 1, y - 1);
                if covered(x, y) && shadowed {
                    // fully covered by both: fill is on top
                    let px = layer.get_pixel(x, y);
                    assert!(near(px[0], 128, 2) && near(px[3], 102, 2), "{:?} at {},{}", px, x, y);
                    let out = composited.get_pixel(x, y);
                    assert!((0..3).all(|c| near(out[c], 204, 2)), "{:?} at {},{}", out, x, y);
                    fill_over_shadow += 1;
                } else if fill_only.get_pixel(x, y)[3] == 0 {
                    // only the shadow: it copies the glyph's coverage from
                    // one pixel up-left, at the shadow color
                    let coverage = fill_only.get_pixel(x - 1, y - 1)[3] as f32 / 102.0;
                    let expected_alpha = (30.0 * coverage).round() as u8;
                    let px = layer.get_pixel(x, y);
                    assert!(near(px[0], 0, 2) && near(px[3], expected_alpha, 2), "{:?} at {},{}", px, x, y);

                    let expected = (255.0 * (1.0 - px[3] as f32 / 255.0)).round() as u8;
                    let out = composited.get_pixel(x, y);
                    assert!((0..3).all(|c| near(out[c], expected, 2)), "{:?} at {},{}", out, x, y);
                    if expected_alpha >= 20 {
                        assert!(out[0] < 240);
                        shadow_only += 1;
                    }
                }
            }
        }

        assert!(fill_over_shadow > 0);
        assert!(shadow_only > 0);
    }

    #[test]
    fn test_encode_failure_returns_original_bytes() {
        let original = white_image(8, 8, ImageFormat::Png);
        let err = encode(RgbaImage::new(8, 8), true, Reencode::Lossless(ImageFormat::Avif)).unwrap_err();

        let output = settle(&original, Ok(Err((Stage::Encode, err))));
        assert_eq!(output.outcome, ImageOutcome::Unmodified);
        assert_eq!(output.bytes, original);
    }

    #[test]
    fn test_panic_returns_original_bytes() {
        let original = b"input".to_vec();
        let output = settle(&original, Err(Box::new("renderer panicked")));
        assert_eq!(output.outcome, ImageOutcome::Unmodified);
        assert_eq!(output.bytes, original);
    }

    #[test]
    fn test_failure_policy() {
        assert_eq!(FAILURE_POLICY, FailurePolicy::RecoverWithOriginal);
    }
}
