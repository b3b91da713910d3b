//! Watermark font resolution
//!
//! The font is resolved exactly once, before any document is processed, from
//! an ordered list of candidate files. If none of them can be used we fall
//! back to the DejaVu Sans Bold face compiled into the binary, so output never
//! depends on which fonts happen to be installed on the host unless the
//! operator asks for it.

use std::fmt;
use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontArc, FontVec, GlyphId};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Bundled fallback face
const BUNDLED_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans-Bold.ttf");

/// Bold sans-serif faces commonly found on Linux, macOS and Windows hosts
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:/Windows/Fonts/arialbd.ttf",
];

/// Where the active font came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontOrigin {
    /// Loaded from a candidate file
    File(PathBuf),
    /// The face compiled into the binary
    Bundled,
}

impl fmt::Display for FontOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontOrigin::File(path) => write!(f, "{}", path.display()),
            FontOrigin::Bundled => write!(f, "bundled DejaVu Sans Bold"),
        }
    }
}

/// Immutable font handle shared by both renderers
#[derive(Clone)]
pub struct FontResource {
    font: FontArc,
    origin: FontOrigin,
}

impl fmt::Debug for FontResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontResource")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl FontResource {
    /// The face compiled into the binary
    pub fn bundled() -> Result<Self> {
        let font = FontArc::try_from_slice(BUNDLED_FONT)
            .map_err(|e| Error::Font(format!("bundled font is unusable: {}", e)))?;

        Ok(Self {
            font,
            origin: FontOrigin::Bundled,
        })
    }

    /// Load a TrueType/OpenType file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let data = std::fs::read(path)?;
        let font = FontVec::try_from_vec(data)
            .map_err(|e| Error::Font(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            font: FontArc::new(font),
            origin: FontOrigin::File(path.to_path_buf()),
        })
    }

    /// Pick the first usable candidate, or the bundled face if none works.
    ///
    /// Only a broken bundled face is an error; unusable candidates are logged
    /// and skipped.
    pub fn resolve<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        for candidate in candidates {
            let path = candidate.as_ref();
            match Self::from_file(path) {
                Ok(resource) => {
                    info!(font = %resource.origin, "watermark font loaded");
                    return Ok(resource);
                }
                Err(Error::FileNotFound(_)) => {
                    debug!(path = %path.display(), "font candidate not present");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unusable font candidate");
                }
            }
        }

        let resource = Self::bundled()?;
        info!(font = %resource.origin, "no font candidate usable, using fallback");
        Ok(resource)
    }

    /// The loaded face
    pub fn font(&self) -> &FontArc {
        &self.font
    }

    pub fn origin(&self) -> &FontOrigin {
        &self.origin
    }

    /// Design units per em (1000 or 2048 for most faces)
    pub fn units_per_em(&self) -> f32 {
        self.font.units_per_em().unwrap_or(1000.0)
    }

    /// Horizontal advance of `text` in font units, kerning included
    pub fn advance_units(&self, text: &str) -> f32 {
        let mut width = 0.0;
        let mut previous: Option<GlyphId> = None;

        for c in text.chars() {
            let glyph = self.font.glyph_id(c);
            if let Some(prev) = previous {
                width += self.font.kern_unscaled(prev, glyph);
            }
            width += self.font.h_advance_unscaled(glyph);
            previous = Some(glyph);
        }

        width
    }

    /// Width of `text` at `size` (points or pixels, same unit out)
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        self.advance_units(text) * size / self.units_per_em()
    }
}
