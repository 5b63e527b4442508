//! Paginated document adapter (PDF).
//!
//! Every page is its own canvas sized from its visible box. The watermark is
//! rasterized into a transparent overlay, embedded as an RGB image XObject
//! with a soft mask, and painted over the existing page content. Original
//! content streams are kept untouched and wrapped in `q`/`Q` so their
//! graphics state cannot leak into the overlay.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use rayon::prelude::*;
use std::collections::HashMap;
use std::io::Write;

use super::{DocumentKind, FormatAdapter, RenderRequest, RenderedDocument};
use crate::constants::{
    FALLBACK_PAGE_SIZE_PT, MAX_OVERLAY_SIDE, OVERLAY_PIXELS_PER_POINT, PAGE_CORNER_MARGIN,
};
use crate::error::{Result, WatermarkError};
use crate::watermark::{CanvasSize, OverlayCanvas, RenderSettings};

/// Limit when walking the page tree for inherited attributes.
const MAX_TREE_DEPTH: usize = 64;

const OVERLAY_NAME_PREFIX: &str = "WmkOverlay";

pub struct PdfAdapter;

/// Visible rectangle of a page in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PageBox {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl PageBox {
    /// Overlay size in pixels and the pixels-per-point it was derived with.
    fn overlay_size(&self) -> (CanvasSize, f32) {
        let longest = self.width.max(self.height).max(1.0);
        let scale = OVERLAY_PIXELS_PER_POINT.min(MAX_OVERLAY_SIDE as f32 / longest);
        let size = CanvasSize::new(
            (self.width * scale).ceil().max(1.0) as u32,
            (self.height * scale).ceil().max(1.0) as u32,
        );
        (size, scale)
    }

    /// Identity used to share overlays between equally sized pages.
    fn key(&self) -> (u32, u32) {
        (self.width.to_bits(), self.height.to_bits())
    }
}

/// Overlay pixels split into the streams an image XObject needs.
struct EncodedOverlay {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    alpha: Vec<u8>,
    blocks: usize,
}

impl FormatAdapter for PdfAdapter {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Pdf
    }

    fn render(&self, input: &[u8], request: &RenderRequest<'_>) -> Result<RenderedDocument> {
        let mut doc = Document::load_mem(input)?;
        if doc.is_encrypted() {
            return Err(WatermarkError::RenderFailed(
                "encrypted PDF documents are not supported".to_string(),
            ));
        }

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(WatermarkError::RenderFailed(
                "PDF document has no pages".to_string(),
            ));
        }

        let boxes: Vec<PageBox> = pages.iter().map(|id| page_box(&doc, *id)).collect();

        let mut unique: Vec<PageBox> = Vec::new();
        for page_box in &boxes {
            if !unique.iter().any(|u| u.key() == page_box.key()) {
                unique.push(*page_box);
            }
        }

        let overlays: Vec<EncodedOverlay> = unique
            .par_iter()
            .map(|page_box| render_overlay(page_box, request))
            .collect::<Result<_>>()?;

        let mut xobjects: HashMap<(u32, u32), ObjectId> = HashMap::new();
        for (page_box, overlay) in unique.iter().zip(&overlays) {
            xobjects.insert(page_box.key(), embed_overlay(&mut doc, overlay));
        }

        let save_state = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        for (page_id, page_box) in pages.iter().zip(&boxes) {
            let image_id = xobjects.get(&page_box.key()).copied().ok_or_else(|| {
                WatermarkError::RenderFailed("missing overlay for page".to_string())
            })?;
            stamp_page(&mut doc, *page_id, page_box, image_id, save_state)?;
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;

        tracing::debug!(
            pages = pages.len(),
            overlays = overlays.len(),
            blocks = overlays.iter().map(|o| o.blocks).sum::<usize>(),
            "Watermarked PDF document"
        );

        Ok(RenderedDocument {
            bytes,
            content_type: "application/pdf",
            extension: "pdf",
            canvases: pages.len(),
        })
    }
}

fn render_overlay(page_box: &PageBox, request: &RenderRequest<'_>) -> Result<EncodedOverlay> {
    let (size, scale) = page_box.overlay_size();
    let margin = (PAGE_CORNER_MARGIN * scale).round() as u32;
    let settings = RenderSettings::from_config(request.config, scale, margin);

    let mut canvas = OverlayCanvas::new(request.renderer.font(), size);
    let blocks = request.renderer.render(&mut canvas, &settings)?;
    let layer = canvas.into_layer();

    let pixels = (layer.width() * layer.height()) as usize;
    let mut rgb = Vec::with_capacity(pixels * 3);
    let mut alpha = Vec::with_capacity(pixels);
    for pixel in layer.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel[3]);
    }

    Ok(EncodedOverlay {
        width: layer.width(),
        height: layer.height(),
        rgb: deflate(&rgb)?,
        alpha: deflate(&alpha)?,
        blocks,
    })
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| WatermarkError::render("overlay compression", e))?;
    encoder
        .finish()
        .map_err(|e| WatermarkError::render("overlay compression", e))
}

/// Add the overlay image and its soft mask. Returns the image object id.
fn embed_overlay(doc: &mut Document, overlay: &EncodedOverlay) -> ObjectId {
    let image_dict = |color_space: &str| {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"XObject".to_vec()));
        dict.set("Subtype", Object::Name(b"Image".to_vec()));
        dict.set("Width", Object::Integer(overlay.width as i64));
        dict.set("Height", Object::Integer(overlay.height as i64));
        dict.set("ColorSpace", Object::Name(color_space.as_bytes().to_vec()));
        dict.set("BitsPerComponent", Object::Integer(8));
        dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
        dict
    };

    let mut mask = Stream::new(image_dict("DeviceGray"), overlay.alpha.clone());
    mask.allows_compression = false;
    let mask_id = doc.add_object(mask);

    let mut dict = image_dict("DeviceRGB");
    dict.set("SMask", Object::Reference(mask_id));
    let mut image = Stream::new(dict, overlay.rgb.clone());
    image.allows_compression = false;
    doc.add_object(image)
}

/// Register the overlay in the page resources and paint it last.
fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    page_box: &PageBox,
    image_id: ObjectId,
    save_state: ObjectId,
) -> Result<()> {
    let mut resources = inherited(doc, page_id, b"Resources")
        .and_then(|obj| resolve_dict(doc, obj))
        .cloned()
        .unwrap_or_default();
    let mut xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
        .cloned()
        .unwrap_or_default();

    let mut index = 0;
    let name = loop {
        let candidate = format!("{}{}", OVERLAY_NAME_PREFIX, index);
        if !xobjects.has(candidate.as_bytes()) {
            break candidate;
        }
        index += 1;
    };
    xobjects.set(name.as_bytes().to_vec(), Object::Reference(image_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    let paint = format!(
        "Q\nq\n{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
        fmt_num(page_box.width),
        fmt_num(page_box.height),
        fmt_num(page_box.x),
        fmt_num(page_box.y),
        name
    );
    let paint_id = doc.add_object(Stream::new(Dictionary::new(), paint.into_bytes()));

    let mut contents = vec![Object::Reference(save_state)];
    contents.extend(content_streams(doc, page_id)?);
    contents.push(Object::Reference(paint_id));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;

    page.set("Contents", Object::Array(contents));
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// The page's existing content streams, in paint order.
///
/// `Contents` may hold a stream reference, a direct array, or a reference to
/// an array of stream references.
fn content_streams(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let streams = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(parts)) => parts.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(parts)) => parts.clone(),
        _ => Vec::new(),
    };
    Ok(streams)
}

/// Look up a page attribute, following `Parent` links for inheritable keys.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, obj)?.as_dict().ok()
}

/// CropBox if present, otherwise MediaBox, otherwise US Letter.
fn page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    [b"CropBox".as_slice(), b"MediaBox".as_slice()]
        .iter()
        .find_map(|key| {
            let obj = inherited(doc, page_id, key)?;
            parse_rect(doc, resolve(doc, obj)?)
        })
        .unwrap_or(PageBox {
            x: 0.0,
            y: 0.0,
            width: FALLBACK_PAGE_SIZE_PT.0,
            height: FALLBACK_PAGE_SIZE_PT.1,
        })
}

fn parse_rect(doc: &Document, obj: &Object) -> Option<PageBox> {
    let values: Vec<f32> = obj
        .as_array()
        .ok()?
        .iter()
        .filter_map(|v| number(resolve(doc, v)?))
        .collect();
    if values.len() != 4 {
        return None;
    }

    let (x0, x1) = (values[0].min(values[2]), values[0].max(values[2]));
    let (y0, y1) = (values[1].min(values[3]), values[1].max(values[3]));
    let (width, height) = (x1 - x0, y1 - y0);
    if !(width.is_finite() && height.is_finite()) || width < 1.0 || height < 1.0 {
        return None;
    }
    Some(PageBox {
        x: x0,
        y: y0,
        width,
        height,
    })
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn fmt_num(value: f32) -> String {
    let text = format!("{:.4}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
