//! Watermark overlay layout and drawing for PDF pages
//!
//! An overlay is a page-sized drawing containing only the watermark. Glyphs
//! are drawn as filled outlines rather than text operators, so the mark is
//! part of the page graphics and cannot be selected or extracted as text.
//!
//! Coordinates are PDF user space: origin at the bottom-left of the page,
//! Y increasing upward.

use ab_glyph::{Font, GlyphId, OutlineCurve, Point};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::font::FontResource;
use crate::style::WatermarkStyle;
use crate::text::TextLines;

/// Font size in points, independent of the page size
pub const FONT_SIZE: f32 = 40.0;

/// Distance between the two baselines as a multiple of the font size
pub const LINE_SPACING_FACTOR: f32 = 1.2;

/// Page size the default overlay is computed for (A4 in points)
pub const BASELINE_PAGE: PageSize = PageSize {
    width: 595.276,
    height: 841.89,
};

/// Name of the transparency state inside the overlay's resources
const GRAPHICS_STATE: &str = "WmGS";

/// Page width and height in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// One positioned line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedLine {
    /// Left edge of the line
    pub x: f32,
    /// Baseline
    pub baseline: f32,
    /// Advance width at [`FONT_SIZE`]
    pub width: f32,
}

/// Positions of both lines on a page of a given size
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLayout {
    pub page: PageSize,
    pub font_size: f32,
    pub lines: [PlacedLine; 2],
}

impl OverlayLayout {
    /// Center the block of the wider line horizontally, center each line
    /// within that block, and put the baselines half a line spacing above
    /// and below the vertical center.
    pub fn compute(page: PageSize, lines: &TextLines, font: &FontResource) -> Self {
        let widths = lines.as_array().map(|line| font.text_width(line, FONT_SIZE));
        let block_width = widths[0].max(widths[1]);
        let block_x = (page.width - block_width) / 2.0;

        let center_y = page.height / 2.0;
        let spacing = FONT_SIZE * LINE_SPACING_FACTOR;
        let baselines = [center_y + spacing / 2.0, center_y - spacing / 2.0];

        let place = |i: usize| PlacedLine {
            x: block_x + (block_width - widths[i]) / 2.0,
            baseline: baselines[i],
            width: widths[i],
        };

        Self {
            page,
            font_size: FONT_SIZE,
            lines: [place(0), place(1)],
        }
    }
}

/// A ready-to-embed overlay: its layout and the drawing operators
#[derive(Debug, Clone)]
pub struct Overlay {
    pub layout: OverlayLayout,
    pub content: Vec<u8>,
}

impl Overlay {
    pub fn build(page: PageSize, lines: &TextLines, font: &FontResource, style: &WatermarkStyle) -> Self {
        let layout = OverlayLayout::compute(page, lines, font);
        let content = overlay_content(&layout, lines, font, style);
        Self { layout, content }
    }

    /// Add the overlay to `doc` as a Form XObject and return its id
    pub fn embed(&self, doc: &mut Document, style: &WatermarkStyle) -> ObjectId {
        let mut graphics_state = Dictionary::new();
        graphics_state.set("Type", Object::Name(b"ExtGState".to_vec()));
        graphics_state.set("ca", Object::Real(style.fill_alpha()));
        graphics_state.set("CA", Object::Real(style.fill_alpha()));

        let mut states = Dictionary::new();
        states.set(GRAPHICS_STATE, Object::Dictionary(graphics_state));

        let mut resources = Dictionary::new();
        resources.set("ExtGState", Object::Dictionary(states));

        let mut xobject_dict = Dictionary::new();
        xobject_dict.set("Type", Object::Name(b"XObject".to_vec()));
        xobject_dict.set("Subtype", Object::Name(b"Form".to_vec()));
        xobject_dict.set("FormType", Object::Integer(1));
        xobject_dict.set(
            "BBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(self.layout.page.width),
                Object::Real(self.layout.page.height),
            ]),
        );
        xobject_dict.set(
            "Matrix",
            Object::Array(vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
            ]),
        );
        xobject_dict.set("Resources", Object::Dictionary(resources));

        doc.add_object(Stream::new(xobject_dict, self.content.clone()))
    }
}

/// Format a number for a content stream: at most 3 decimals, no trailing zeros
pub(crate) fn fmt_num(value: f32) -> String {
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" || s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Generate the operators that fill both lines' glyph outlines
fn overlay_content(
    layout: &OverlayLayout,
    lines: &TextLines,
    font: &FontResource,
    style: &WatermarkStyle,
) -> Vec<u8> {
    let mut content = String::new();
    let scale = layout.font_size / font.units_per_em();

    content.push_str("q\n");
    content.push_str(&format!("/{} gs\n", GRAPHICS_STATE));
    content.push_str(&format!("{} g\n", fmt_num(style.fill_gray())));

    for (text, place) in lines.as_array().into_iter().zip(layout.lines) {
        if text.is_empty() {
            continue;
        }

        // Work in font units; cm maps them onto the baseline at the font size
        content.push_str("q\n");
        content.push_str(&format!(
            "{} 0 0 {} {} {} cm\n",
            fmt_num_precise(scale),
            fmt_num_precise(scale),
            fmt_num(place.x),
            fmt_num(place.baseline)
        ));

        if append_glyph_paths(&mut content, text, font) {
            content.push_str("f\n");
        }
        content.push_str("Q\n");
    }

    content.push_str("Q\n");
    content.into_bytes()
}

/// Scale factors are small (40/2048), keep more precision for them
fn fmt_num_precise(value: f32) -> String {
    let s = format!("{:.6}", value);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Append path construction operators for every glyph of `text`.
///
/// Returns whether any path was started.
fn append_glyph_paths(content: &mut String, text: &str, font: &FontResource) -> bool {
    let face = font.font();
    let mut pen_x = 0.0;
    let mut previous: Option<GlyphId> = None;
    let mut any_path = false;

    for c in text.chars() {
        let glyph = face.glyph_id(c);
        if let Some(prev) = previous {
            pen_x += face.kern_unscaled(prev, glyph);
        }

        if let Some(outline) = face.outline(glyph) {
            let mut cursor: Option<Point> = None;
            for curve in &outline.curves {
                let (start, end) = curve_endpoints(curve);
                if cursor != Some(start) {
                    if cursor.is_some() {
                        content.push_str("h\n");
                    }
                    content.push_str(&format!("{} {} m\n", fmt_num(start.x + pen_x), fmt_num(start.y)));
                    any_path = true;
                }
                append_segment(content, curve, pen_x);
                cursor = Some(end);
            }
            if cursor.is_some() {
                content.push_str("h\n");
            }
        }

        pen_x += face.h_advance_unscaled(glyph);
        previous = Some(glyph);
    }

    any_path
}

fn curve_endpoints(curve: &OutlineCurve) -> (Point, Point) {
    match *curve {
        OutlineCurve::Line(p0, p1) => (p0, p1),
        OutlineCurve::Quad(p0, _, p2) => (p0, p2),
        OutlineCurve::Cubic(p0, _, _, p3) => (p0, p3),
    }
}

fn append_segment(content: &mut String, curve: &OutlineCurve, dx: f32) {
    let x = |p: Point| fmt_num(p.x + dx);
    let y = |p: Point| fmt_num(p.y);

    match *curve {
        OutlineCurve::Line(_, p1) => {
            content.push_str(&format!("{} {} l\n", x(p1), y(p1)));
        }
        OutlineCurve::Quad(p0, c, p2) => {
            // Degree elevation: quadratic control point to two cubic ones
            let c1 = Point {
                x: p0.x + 2.0 / 3.0 * (c.x - p0.x),
                y: p0.y + 2.0 / 3.0 * (c.y - p0.y),
            };
            let c2 = Point {
                x: p2.x + 2.0 / 3.0 * (c.x - p2.x),
                y: p2.y + 2.0 / 3.0 * (c.y - p2.y),
            };
            content.push_str(&format!(
                "{} {} {} {} {} {} c\n",
                x(c1),
                y(c1),
                x(c2),
                y(c2),
                x(p2),
                y(p2)
            ));
        }
        OutlineCurve::Cubic(_, c1, c2, p3) => {
            content.push_str(&format!(
                "{} {} {} {} {} {} c\n",
                x(c1),
                y(c1),
                x(c2),
                y(c2),
                x(p3),
                y(p3)
            ));
        }
    }
}
