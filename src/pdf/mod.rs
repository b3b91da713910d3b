//! PDF watermarking
//!
//! Every page gets the two-line watermark drawn on top of its existing
//! content. Unlike images, failures here are returned to the caller: a PDF
//! that cannot be watermarked produces no document at all.

pub mod metadata;
pub mod overlay;
pub mod page;

use lopdf::{Document, ObjectId};
use tracing::{debug, info, instrument};

use crate::error::{Error, FailurePolicy, Result};
use crate::font::FontResource;
use crate::style::WatermarkStyle;
use crate::text::TextLines;

// Re-export commonly used items
pub use metadata::{count_pages, extract_metadata, PdfMetadata};
pub use overlay::{Overlay, OverlayLayout, PageSize, BASELINE_PAGE};
pub use page::{media_box, PageBox};

/// PDF failures reach the caller
pub const FAILURE_POLICY: FailurePolicy = FailurePolicy::Propagate;

/// Burn the two-line watermark into every page of an in-memory PDF.
///
/// Pages whose MediaBox is exactly the baseline size all draw the same
/// precomputed overlay object; any other page gets an overlay laid out for
/// its own size. Page count, order and boxes are left as they were.
#[instrument(skip_all, fields(input_len = bytes.len()))]
pub fn watermark_pdf(bytes: &[u8], lines: &TextLines, font: &FontResource) -> Result<Vec<u8>> {
    let style = WatermarkStyle::PDF;
    let mut doc = Document::load_mem(bytes)?;

    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if page_ids.is_empty() {
        return Err(Error::EmptyPdf);
    }

    let baseline = Overlay::build(BASELINE_PAGE, lines, font, &style);
    let mut baseline_id: Option<ObjectId> = None;
    let mut custom_overlays = 0usize;

    for (index, page_id) in page_ids.iter().copied().enumerate() {
        let page_box = media_box(&doc, page_id)?;
        let size = page_box.size();

        let xobject_id = if size == BASELINE_PAGE {
            *baseline_id.get_or_insert_with(|| baseline.embed(&mut doc, &style))
        } else {
            custom_overlays += 1;
            Overlay::build(size, lines, font, &style).embed(&mut doc, &style)
        };

        debug!(
            page = index + 1,
            width = size.width,
            height = size.height,
            baseline = size == BASELINE_PAGE,
            "stamping page"
        );
        page::stamp_page(&mut doc, page_id, xobject_id, &page_box)?;
    }

    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;

    info!(
        pages = page_ids.len(),
        custom_overlays,
        output_len = out.len(),
        "pdf watermarked"
    );
    Ok(out)
}
