//! Fixed watermark appearance
//!
//! The look of the watermark is not configurable: every document gets the
//! same gray, the same opacity and the same bold face.

/// RGBA color with 8-bit channels
pub type Rgba8 = [u8; 4];

/// Visual parameters for one renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatermarkStyle {
    /// Main text color including alpha
    pub fill: Rgba8,
    /// Drop shadow color including alpha, if the renderer draws one
    pub shadow: Option<Rgba8>,
    /// Shadow offset in output units (pixels for raster, points for PDF)
    pub shadow_offset: f32,
    /// Whether the bold face is used
    pub bold: bool,
}

impl WatermarkStyle {
    /// Mid-gray at ~40% opacity over a very faint black shadow, 1px down-right
    pub const RASTER: Self = Self {
        fill: [128, 128, 128, 102],
        shadow: Some([0, 0, 0, 30]),
        shadow_offset: 1.0,
        bold: true,
    };

    /// 50% gray at 40% opacity, no shadow
    pub const PDF: Self = Self {
        fill: [128, 128, 128, 102],
        shadow: None,
        shadow_offset: 0.0,
        bold: true,
    };

    /// Fill gray as a PDF `g` operand (0.0 black .. 1.0 white)
    pub fn fill_gray(&self) -> f32 {
        let [r, g, b, _] = self.fill;
        (r as f32 + g as f32 + b as f32) / (3.0 * 255.0)
    }

    /// Fill alpha as a PDF `ca` operand
    pub fn fill_alpha(&self) -> f32 {
        self.fill[3] as f32 / 255.0
    }
}
