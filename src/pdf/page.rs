//! Page-level helpers: page boxes, resources and content streams
//!
//! Page attributes such as `MediaBox` and `Resources` may live on the page
//! itself or be inherited from any ancestor `Pages` node, and almost any
//! value may be an indirect reference. Everything here resolves both.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use super::overlay::{fmt_num, PageSize};
use crate::error::{Error, Result};

/// Guard against cyclic or absurdly deep page trees
const MAX_TREE_DEPTH: usize = 64;

/// Prefix for the names we register overlays under in `/XObject`
const XOBJECT_PREFIX: &str = "Wm";

/// A page's MediaBox, normalized so that (x0, y0) is the lower-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageBox {
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn size(&self) -> PageSize {
        PageSize {
            width: self.width(),
            height: self.height(),
        }
    }
}

/// Follow a reference, or return the object itself
fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Result<&'a Object> {
    match object {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

/// Look up an inheritable page attribute on the page or its ancestors
fn inherited_attribute<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Result<Option<&'a Object>> {
    let mut node = doc.get_dictionary(page_id)?;

    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Ok(Some(resolve(doc, value)?));
        }
        match node.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => node = doc.get_dictionary(*parent_id)?,
            _ => return Ok(None),
        }
    }

    Err(Error::InvalidPdf(format!(
        "page tree above {:?} is cyclic or deeper than {} levels",
        page_id, MAX_TREE_DEPTH
    )))
}

/// Read a page's MediaBox
pub fn media_box(doc: &Document, page_id: ObjectId) -> Result<PageBox> {
    let value = inherited_attribute(doc, page_id, b"MediaBox")?
        .ok_or_else(|| Error::InvalidPdf(format!("page {:?} has no MediaBox", page_id)))?;

    let array = value
        .as_array()
        .map_err(|_| Error::InvalidPdf(format!("MediaBox of page {:?} is not an array", page_id)))?;

    if array.len() != 4 {
        return Err(Error::InvalidPdf(format!(
            "MediaBox of page {:?} has {} entries",
            page_id,
            array.len()
        )));
    }

    let mut coords = [0.0f32; 4];
    for (slot, entry) in coords.iter_mut().zip(array) {
        *slot = resolve(doc, entry)?.as_float()?;
    }
    let [ax, ay, bx, by] = coords;

    Ok(PageBox {
        x0: ax.min(bx),
        y0: ay.min(by),
        x1: ax.max(bx),
        y1: ay.max(by),
    })
}

/// The resources that apply to a page, as an owned dictionary
fn effective_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    match inherited_attribute(doc, page_id, b"Resources")? {
        Some(Object::Dictionary(dict)) => Ok(dict.clone()),
        _ => Ok(Dictionary::new()),
    }
}

/// First `Wm<n>` name not already taken in `dict`
fn unused_name(dict: &Dictionary) -> String {
    let mut n = 0;
    loop {
        let name = format!("{}{}", XOBJECT_PREFIX, n);
        if !dict.has(name.as_bytes()) {
            return name;
        }
        n += 1;
    }
}

/// Register a Form XObject in the page's own Resources and return the name
/// it was registered under.
///
/// The page gets a direct Resources dictionary (a copy of whatever it used,
/// inherited or referenced) so other pages sharing those resources are not
/// affected.
fn add_xobject_to_page_resources(doc: &mut Document, page_id: ObjectId, xobject_id: ObjectId) -> Result<String> {
    let mut resources = effective_resources(doc, page_id)?;

    let mut xobjects = match resources.get(b"XObject") {
        Ok(existing) => match resolve(doc, existing)? {
            Object::Dictionary(dict) => dict.clone(),
            _ => Dictionary::new(),
        },
        Err(_) => Dictionary::new(),
    };

    let name = unused_name(&xobjects);
    xobjects.set(name.clone(), Object::Reference(xobject_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    doc.get_dictionary_mut(page_id)?
        .set("Resources", Object::Dictionary(resources));

    Ok(name)
}

/// The page's content streams as a list of references (possibly empty)
fn content_references(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page = doc.get_dictionary(page_id)?;

    let contents = match page.get(b"Contents") {
        Ok(contents) => contents,
        Err(_) => return Ok(Vec::new()),
    };

    match contents {
        Object::Array(items) => Ok(items.clone()),
        Object::Reference(id) => match doc.get_object(*id)? {
            // An indirect array of streams
            Object::Array(items) => Ok(items.clone()),
            _ => Ok(vec![Object::Reference(*id)]),
        },
        _ => Ok(Vec::new()),
    }
}

/// Draw a Form XObject over everything already on the page.
///
/// Existing content is isolated in `q`/`Q` so any transformation it leaves
/// behind does not move the overlay; the overlay is then translated to the
/// MediaBox origin and invoked last, so it renders on top.
pub fn stamp_page(doc: &mut Document, page_id: ObjectId, xobject_id: ObjectId, page_box: &PageBox) -> Result<()> {
    let name = add_xobject_to_page_resources(doc, page_id, xobject_id)?;
    let mut contents = content_references(doc, page_id)?;

    let invoke = format!(
        "q 1 0 0 1 {} {} cm /{} Do Q\n",
        fmt_num(page_box.x0),
        fmt_num(page_box.y0),
        name
    );

    if contents.is_empty() {
        let invoke_id = doc.add_object(Stream::new(Dictionary::new(), invoke.into_bytes()));
        contents.push(Object::Reference(invoke_id));
    } else {
        let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let invoke_id = doc.add_object(Stream::new(
            Dictionary::new(),
            format!("Q\n{}", invoke).into_bytes(),
        ));
        contents.insert(0, Object::Reference(save_id));
        contents.push(Object::Reference(invoke_id));
    }

    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Array(contents));

    Ok(())
}
