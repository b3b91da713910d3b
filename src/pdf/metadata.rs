//! PDF metadata extraction

use lopdf::{Document, Object};

use super::page::{media_box, PageBox};
use crate::error::{Error, Result};

/// PDF metadata
#[derive(Debug, Clone)]
pub struct PdfMetadata {
    /// Number of pages in the PDF
    pub page_count: usize,
    /// Document title (if present)
    pub title: Option<String>,
    /// Document author (if present)
    pub author: Option<String>,
    /// MediaBox of every page, in page order
    pub page_boxes: Vec<PageBox>,
}

/// Read a text entry from the Info dictionary
fn info_string(doc: &Document, key: &[u8]) -> Option<String> {
    let info = match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };

    let bytes = info.get(key).ok()?.as_str().ok()?;
    String::from_utf8(bytes.to_vec()).ok()
}

/// Extract metadata from an in-memory PDF
pub fn extract_metadata(bytes: &[u8]) -> Result<PdfMetadata> {
    let doc = Document::load_mem(bytes)?;

    let page_boxes = doc
        .get_pages()
        .into_values()
        .map(|page_id| media_box(&doc, page_id))
        .collect::<Result<Vec<_>>>()?;

    if page_boxes.is_empty() {
        return Err(Error::EmptyPdf);
    }

    Ok(PdfMetadata {
        page_count: page_boxes.len(),
        title: info_string(&doc, b"Title"),
        author: info_string(&doc, b"Author"),
        page_boxes,
    })
}

/// Count the pages of an in-memory PDF
pub fn count_pages(bytes: &[u8]) -> Result<usize> {
    let doc = Document::load_mem(bytes)?;
    match doc.get_pages().len() {
        0 => Err(Error::EmptyPdf),
        n => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Dictionary, StringFormat};

    fn titled_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                let mut page = Dictionary::new();
                page.set("Type", Object::Name(b"Page".to_vec()));
                page.set("Parent", Object::Reference(pages_id));
                page.set("MediaBox", Object::Array(vec![Object::Integer(0), Object::Integer(0), Object::Integer(300), Object::Integer(400)]));
                Object::Reference(doc.add_object(Object::Dictionary(page)))
            })
            .collect();

        let mut tree = Dictionary::new();
        tree.set("Type", Object::Name(b"Pages".to_vec()));
        tree.set("Count", Object::Integer(kids.len() as i64));
        tree.set("Kids", Object::Array(kids));
        doc.objects.insert(pages_id, Object::Dictionary(tree));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(Object::Dictionary(catalog));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut info = Dictionary::new();
        info.set("Title", Object::String(b"Quarterly Report".to_vec(), StringFormat::Literal));
        let info_id = doc.add_object(Object::Dictionary(info));
        doc.trailer.set("Info", Object::Reference(info_id));

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_extract_metadata() {
        let meta = extract_metadata(&titled_pdf(3)).unwrap();
        assert_eq!(meta.page_count, 3);
        assert_eq!(meta.title.as_deref(), Some("Quarterly Report"));
        assert_eq!(meta.author, None);
        assert!(meta.page_boxes.iter().all(|b| b.width() == 300.0 && b.height() == 400.0));
    }

    #[test]
    fn test_count_pages() {
        assert_eq!(count_pages(&titled_pdf(2)).unwrap(), 2);
        assert!(matches!(count_pages(&titled_pdf(0)), Err(Error::EmptyPdf)));
    }

    #[test]
    fn test_garbage_is_a_pdf_error() {
        assert!(matches!(extract_metadata(b"not a pdf"), Err(Error::Pdf(_))));
    }
}
