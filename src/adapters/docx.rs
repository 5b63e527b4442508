//! Flowed document adapter (DOCX).
//!
//! Word documents have no fixed pages, so the watermark is rendered once as a
//! page-sized transparent PNG and anchored behind the text in every header a
//! section shows: default, first page (with `titlePg`) and even pages (with
//! `evenAndOddHeaders` in the settings part). Existing headers get the drawing
//! appended. Any of those a section lacks, or references through a dangling
//! relationship, is pointed at a shared header part that only carries the
//! watermark.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashSet;
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::encoder::{EncoderFactory, OutputFormat};
use super::{DocumentKind, FormatAdapter, RenderRequest, RenderedDocument};
use crate::constants::{FLOWED_OVERLAY_PAGE_PT, OVERLAY_PIXELS_PER_POINT, PAGE_CORNER_MARGIN};
use crate::error::{Result, WatermarkError};
use crate::watermark::{CanvasSize, OverlayCanvas, RenderSettings};

const DOCUMENT_PART: &str = "word/document.xml";
const DOCUMENT_RELS: &str = "word/_rels/document.xml.rels";
const SETTINGS_PART: &str = "word/settings.xml";
const CONTENT_TYPES: &str = "[Content_Types].xml";
const SHARED_HEADER_PART: &str = "word/header_watermark.xml";
const MEDIA_STEM: &str = "word/media/watermark";

const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PACKAGE_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const WORDML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const DRAWING_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const DRAWINGML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const PICTURE_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

const HEADER_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const HEADER_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml";

const EMU_PER_POINT: i64 = 12_700;
/// First drawing id used for inserted pictures.
const DRAWING_ID_BASE: u32 = 7_000;

pub struct DocxAdapter;

impl FormatAdapter for DocxAdapter {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Docx
    }

    fn render(&self, input: &[u8], request: &RenderRequest<'_>) -> Result<RenderedDocument> {
        let mut package = Package::read(input)?;
        let document = package
            .get(DOCUMENT_PART)
            .ok_or_else(|| WatermarkError::render("docx", "missing word/document.xml"))?
            .to_vec();
        let content_types = package
            .get(CONTENT_TYPES)
            .ok_or_else(|| WatermarkError::render("docx", "missing [Content_Types].xml"))?
            .to_vec();
        let mut document_rels = package
            .get(DOCUMENT_RELS)
            .map(<[u8]>::to_vec)
            .unwrap_or_else(empty_relationships);

        let relationships = read_relationships(&document_rels)?;
        let shared_rid = unique_id(relationships.iter().map(|r| r.id.as_str()), "rIdWmkHeader");
        let known_headers: HashSet<String> = relationships
            .iter()
            .filter(|r| package.get(&resolve_target(&r.target)).is_some())
            .map(|r| r.id.clone())
            .collect();
        let even_and_odd = match package.get(SETTINGS_PART) {
            Some(settings) => even_and_odd_headers(settings)?,
            None => false,
        };
        let sections = rewrite_sections(
            &document,
            &SectionContext {
                shared_rid: &shared_rid,
                known_headers: &known_headers,
                even_and_odd,
            },
        )?;

        let media_part = package.unique_name(MEDIA_STEM, "png");
        let media_target = media_part.trim_start_matches("word/").to_string();
        package.put(&media_part, render_overlay(request)?);

        let mut drawings = 0u32;
        let mut stamped = HashSet::new();
        for rid in &sections.headers {
            let Some(part) = relationships
                .iter()
                .find(|r| &r.id == rid)
                .map(|r| resolve_target(&r.target))
            else {
                continue;
            };
            if !stamped.insert(part.clone()) {
                continue;
            }
            let Some(header) = package.get(&part).map(<[u8]>::to_vec) else {
                continue;
            };

            drawings += 1;
            let rels_part = rels_part_for(&part);
            let rels = package
                .get(&rels_part)
                .map(<[u8]>::to_vec)
                .unwrap_or_else(empty_relationships);
            let existing = read_relationships(&rels)?;
            let image_rid = unique_id(existing.iter().map(|r| r.id.as_str()), "rIdWmkImage");

            let rels = insert_before_close(
                &rels,
                b"Relationships",
                &relationship_xml(&image_rid, IMAGE_REL_TYPE, &media_target),
            )?;
            let header = insert_before_close(
                &header,
                b"hdr",
                &drawing_paragraph(&image_rid, DRAWING_ID_BASE + drawings),
            )?;
            package.put(&part, header);
            package.put(&rels_part, rels);
        }

        let mut shared_header = None;
        if sections.injected > 0 {
            drawings += 1;
            let part = package.unique_name(SHARED_HEADER_PART.trim_end_matches(".xml"), "xml");
            let image_rid = "rIdWmkImage";
            let rels = insert_before_close(
                &empty_relationships(),
                b"Relationships",
                &relationship_xml(image_rid, IMAGE_REL_TYPE, &media_target),
            )?;
            package.put(&part, shared_header_xml(image_rid, DRAWING_ID_BASE + drawings));
            package.put(&rels_part_for(&part), rels);

            document_rels = insert_before_close(
                &document_rels,
                b"Relationships",
                &relationship_xml(&shared_rid, HEADER_REL_TYPE, part.trim_start_matches("word/")),
            )?;
            shared_header = Some(part);
        }

        package.put(
            CONTENT_TYPES,
            update_content_types(&content_types, shared_header.as_deref())?,
        );
        package.put(DOCUMENT_RELS, document_rels);
        package.put(DOCUMENT_PART, sections.xml);

        tracing::debug!(
            sections = sections.count,
            existing_headers = stamped.len(),
            injected = sections.injected,
            "Watermarked DOCX document"
        );

        Ok(RenderedDocument {
            bytes: package.write()?,
            content_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            extension: "docx",
            canvases: sections.count,
        })
    }
}

/// Render the shared page-sized overlay as PNG.
fn render_overlay(request: &RenderRequest<'_>) -> Result<Vec<u8>> {
    let scale = OVERLAY_PIXELS_PER_POINT;
    let (width_pt, height_pt) = FLOWED_OVERLAY_PAGE_PT;
    let size = CanvasSize::new(
        (width_pt * scale).round() as u32,
        (height_pt * scale).round() as u32,
    );
    let margin = (PAGE_CORNER_MARGIN * scale).round() as u32;
    let settings = RenderSettings::from_config(request.config, scale, margin);

    let mut canvas = OverlayCanvas::new(request.renderer.font(), size);
    request.renderer.render(&mut canvas, &settings)?;
    Ok(EncoderFactory::create(OutputFormat::Png)
        .encode(canvas.layer())?
        .data)
}

/// Archive entries in their original order.
struct Package {
    entries: Vec<(String, Vec<u8>)>,
}

impl Package {
    fn read(input: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(input))?;
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| WatermarkError::render("docx container", e))?;
            entries.push((file.name().to_string(), data));
        }
        Ok(Self { entries })
    }

    fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    fn put(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = data,
            None => self.entries.push((name.to_string(), data)),
        }
    }

    /// `{stem}.{ext}`, or `{stem}{n}.{ext}` if taken.
    fn unique_name(&self, stem: &str, extension: &str) -> String {
        let mut name = format!("{}.{}", stem, extension);
        let mut n = 1;
        while self.get(&name).is_some() {
            name = format!("{}{}.{}", stem, n, extension);
            n += 1;
        }
        name
    }

    fn write(self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in &self.entries {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(data)
                .map_err(|e| WatermarkError::render("docx container", e))?;
        }
        Ok(zip.finish()?.into_inner())
    }
}

#[derive(Debug)]
struct Relationship {
    id: String,
    target: String,
}

/// Which pages of a section a header applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderKind {
    Default,
    First,
    Even,
}

impl HeaderKind {
    fn parse(value: &[u8]) -> Option<Self> {
        match value {
            b"default" => Some(Self::Default),
            b"first" => Some(Self::First),
            b"even" => Some(Self::Even),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::First => "first",
            Self::Even => "even",
        }
    }
}

/// What the section rewrite needs to know about the rest of the package.
struct SectionContext<'a> {
    shared_rid: &'a str,
    /// Relationship ids that resolve to a part present in the package
    known_headers: &'a HashSet<String>,
    /// Even pages use their own header
    even_and_odd: bool,
}

impl SectionContext<'_> {
    /// Header kinds a section shows but has no usable reference for.
    fn missing(&self, present: &[HeaderKind], title_page: bool) -> Vec<HeaderKind> {
        let mut needed = vec![HeaderKind::Default];
        if title_page {
            needed.push(HeaderKind::First);
        }
        if self.even_and_odd {
            needed.push(HeaderKind::Even);
        }
        needed.retain(|kind| !present.contains(kind));
        needed
    }
}

/// Result of rewriting the main document part.
struct SectionRewrite {
    xml: Vec<u8>,
    /// Sections seen, including a body-level one added for the final section
    count: usize,
    /// Relationship ids of existing headers of every kind
    headers: Vec<String>,
    /// Sections pointed at the shared watermark header
    injected: usize,
}

/// Make every header a section shows carry the watermark, reusing existing
/// headers and pointing the rest at the shared one.
fn rewrite_sections(xml: &[u8], context: &SectionContext<'_>) -> Result<SectionRewrite> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 512));
    let mut buf = Vec::new();

    let mut result = SectionRewrite {
        xml: Vec::new(),
        count: 0,
        headers: Vec::new(),
        injected: 0,
    };

    let mut level = 0usize;
    let mut body_level = None;
    let mut body_section_seen = false;

    let mut section: Option<Vec<Event<'static>>> = None;
    let mut section_depth = 0usize;
    let mut present: Vec<HeaderKind> = Vec::new();
    let mut title_page = false;
    // Set while dropping the children of a dangling header reference
    let mut dropping = false;

    loop {
        let event = reader.read_event_into(&mut buf)?.into_owned();
        buf.clear();

        if section.is_some() {
            let mut keep = !dropping;
            match &event {
                Event::Start(e) | Event::Empty(e) if section_depth == 1 => {
                    match e.local_name().as_ref() {
                        b"headerReference" => {
                            if let Some((kind, rid)) = header_reference_of(e) {
                                if context.known_headers.contains(&rid) {
                                    present.push(kind);
                                    result.headers.push(rid);
                                } else {
                                    tracing::warn!(
                                        rid = %rid,
                                        kind = kind.as_str(),
                                        "Header relationship is dangling, replacing it"
                                    );
                                    keep = false;
                                    dropping = matches!(event, Event::Start(_));
                                }
                            }
                        }
                        b"titlePg" => title_page = is_on(e),
                        _ => {}
                    }
                }
                _ => {}
            }
            match &event {
                Event::Start(_) => section_depth += 1,
                Event::End(_) => {
                    section_depth -= 1;
                    if dropping && section_depth == 1 {
                        dropping = false;
                    }
                }
                Event::Eof => {
                    return Err(WatermarkError::render(
                        "docx xml",
                        "unterminated section properties",
                    ))
                }
                _ => {}
            }
            if keep {
                if let Some(events) = section.as_mut() {
                    events.push(event);
                }
            }
            if section_depth == 0 {
                if let Some(events) = section.take() {
                    level -= 1;
                    result.count += 1;
                    let missing = context.missing(&present, title_page);
                    if !missing.is_empty() {
                        result.injected += 1;
                    }
                    let mut events = events.into_iter();
                    if let Some(start) = events.next() {
                        emit(&mut writer, start)?;
                    }
                    for kind in missing {
                        emit(
                            &mut writer,
                            Event::Empty(header_reference(context.shared_rid, kind)),
                        )?;
                    }
                    for event in events {
                        emit(&mut writer, event)?;
                    }
                    present.clear();
                    title_page = false;
                }
            }
            continue;
        }

        match event {
            Event::Start(e) if is_section(&e) => {
                if body_level == Some(level) {
                    body_section_seen = true;
                }
                level += 1;
                section_depth = 1;
                section = Some(vec![Event::Start(e)]);
            }
            Event::Empty(e) if is_section(&e) => {
                if body_level == Some(level) {
                    body_section_seen = true;
                }
                result.count += 1;
                result.injected += 1;
                let end = e.to_end().into_owned();
                emit(&mut writer, Event::Start(e))?;
                emit_shared_references(&mut writer, context)?;
                emit(&mut writer, Event::End(end))?;
            }
            Event::Start(e) => {
                level += 1;
                if e.local_name().as_ref() == b"body" {
                    body_level = Some(level);
                }
                emit(&mut writer, Event::Start(e))?;
            }
            Event::End(e) => {
                if body_level == Some(level) && !body_section_seen {
                    // The final section has no properties of its own
                    result.count += 1;
                    result.injected += 1;
                    emit(&mut writer, Event::Start(BytesStart::new("w:sectPr")))?;
                    emit_shared_references(&mut writer, context)?;
                    emit(&mut writer, Event::End(BytesEnd::new("w:sectPr")))?;
                    body_section_seen = true;
                }
                level = level.saturating_sub(1);
                emit(&mut writer, Event::End(e))?;
            }
            Event::Eof => break,
            other => emit(&mut writer, other)?,
        }
    }

    if body_level.is_none() {
        return Err(WatermarkError::render("docx xml", "document has no body"));
    }

    result.xml = writer.into_inner();
    Ok(result)
}

/// Shared header references for a section that has none of its own.
fn emit_shared_references(
    writer: &mut Writer<Vec<u8>>,
    context: &SectionContext<'_>,
) -> Result<()> {
    for kind in context.missing(&[], false) {
        emit(writer, Event::Empty(header_reference(context.shared_rid, kind)))?;
    }
    Ok(())
}

fn is_section(e: &BytesStart<'_>) -> bool {
    e.local_name().as_ref() == b"sectPr"
}

/// Kind and relationship id of a `headerReference`. A missing `type` means
/// the default header.
fn header_reference_of(e: &BytesStart<'_>) -> Option<(HeaderKind, String)> {
    let mut kind = Some(HeaderKind::Default);
    let mut id = None;
    for attr in e.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"type" => kind = HeaderKind::parse(attr.value.as_ref()),
            b"id" => id = Some(String::from_utf8_lossy(&attr.value).into_owned()),
            _ => {}
        }
    }
    Some((kind?, id?))
}

/// On/off toggle: present without `val`, or with a `val` other than false.
fn is_on(e: &BytesStart<'_>) -> bool {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == b"val")
        .map_or(true, |attr| {
            !matches!(attr.value.as_ref(), b"0" | b"false" | b"off")
        })
}

/// Whether the settings part turns on separate even page headers.
fn even_and_odd_headers(settings: &[u8]) -> Result<bool> {
    let mut reader = Reader::from_reader(settings);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"evenAndOddHeaders" =>
            {
                return Ok(is_on(e));
            }
            Event::Eof => return Ok(false),
            _ => {}
        }
        buf.clear();
    }
}

fn header_reference(rid: &str, kind: HeaderKind) -> BytesStart<'static> {
    let mut element = BytesStart::new("w:headerReference");
    element.push_attribute(("xmlns:r", REL_NS));
    element.push_attribute(("w:type", kind.as_str()));
    element.push_attribute(("r:id", rid));
    element
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| WatermarkError::render("docx xml", e))
}

/// Copy `xml`, writing `fragment` right before the close of the first
/// `parent` element (matched by local name).
fn insert_before_close(xml: &[u8], parent: &[u8], fragment: &str) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + fragment.len()));
    let mut buf = Vec::new();
    let mut inserted = false;

    loop {
        let event = reader.read_event_into(&mut buf)?.into_owned();
        buf.clear();
        match event {
            Event::End(e) if !inserted && e.local_name().as_ref() == parent => {
                writer.get_mut().extend_from_slice(fragment.as_bytes());
                inserted = true;
                emit(&mut writer, Event::End(e))?;
            }
            Event::Empty(e) if !inserted && e.local_name().as_ref() == parent => {
                let end = e.to_end().into_owned();
                emit(&mut writer, Event::Start(e))?;
                writer.get_mut().extend_from_slice(fragment.as_bytes());
                inserted = true;
                emit(&mut writer, Event::End(end))?;
            }
            Event::Eof => break,
            other => emit(&mut writer, other)?,
        }
    }

    if !inserted {
        return Err(WatermarkError::render(
            "docx xml",
            format!("element {} not found", String::from_utf8_lossy(parent)),
        ));
    }
    Ok(writer.into_inner())
}

/// Values of `attribute` on every `element` (both matched by local name).
fn attribute_values(xml: &[u8], element: &[u8], attribute: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut values = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == element => {
                if let Some(attr) = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.local_name().as_ref() == attribute)
                {
                    values.push(String::from_utf8_lossy(&attr.value).into_owned());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(values)
}

fn read_relationships(xml: &[u8]) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut relationships = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).into_owned();
                    match attr.key.as_ref() {
                        b"Id" => id = Some(value),
                        b"Target" => target = Some(value),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    relationships.push(Relationship { id, target });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(relationships)
}

/// Package path of a relationship target declared from `word/`.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("word/{}", target.trim_start_matches("./")),
    }
}

/// `word/header1.xml` -> `word/_rels/header1.xml.rels`
fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

fn unique_id<'a>(existing: impl Iterator<Item = &'a str>, base: &str) -> String {
    let taken: HashSet<&str> = existing.collect();
    if !taken.contains(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{}{}", base, n))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}

fn empty_relationships() -> Vec<u8> {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{}"></Relationships>"#,
        PACKAGE_REL_NS
    )
    .into_bytes()
}

fn relationship_xml(id: &str, rel_type: &str, target: &str) -> String {
    format!(
        r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
        id, rel_type, target
    )
}

fn update_content_types(xml: &[u8], header_part: Option<&str>) -> Result<Vec<u8>> {
    let defaults = attribute_values(xml, b"Default", b"Extension")?;
    let mut fragment = String::new();
    if !defaults.iter().any(|ext| ext.eq_ignore_ascii_case("png")) {
        fragment.push_str(r#"<Default Extension="png" ContentType="image/png"/>"#);
    }
    if let Some(part) = header_part {
        fragment.push_str(&format!(
            r#"<Override PartName="/{}" ContentType="{}"/>"#,
            part, HEADER_CONTENT_TYPE
        ));
    }
    if fragment.is_empty() {
        return Ok(xml.to_vec());
    }
    insert_before_close(xml, b"Types", &fragment)
}

fn shared_header_xml(image_rid: &str, drawing_id: u32) -> Vec<u8> {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:hdr xmlns:w="{}" xmlns:r="{}">{}</w:hdr>"#,
        WORDML_NS,
        REL_NS,
        drawing_paragraph(image_rid, drawing_id)
    )
    .into_bytes()
}

/// Paragraph holding a page-sized picture anchored behind the text.
fn drawing_paragraph(image_rid: &str, drawing_id: u32) -> String {
    let cx = (FLOWED_OVERLAY_PAGE_PT.0 as i64) * EMU_PER_POINT;
    let cy = (FLOWED_OVERLAY_PAGE_PT.1 as i64) * EMU_PER_POINT;
    format!(
        concat!(
            r#"<w:p><w:r><w:drawing xmlns:wp="{wp}" xmlns:a="{a}" xmlns:pic="{pic}" xmlns:r="{r}">"#,
            r#"<wp:anchor distT="0" distB="0" distL="0" distR="0" simplePos="0" relativeHeight="0" behindDoc="1" locked="1" layoutInCell="1" allowOverlap="1">"#,
            r#"<wp:simplePos x="0" y="0"/>"#,
            r#"<wp:positionH relativeFrom="page"><wp:posOffset>0</wp:posOffset></wp:positionH>"#,
            r#"<wp:positionV relativeFrom="page"><wp:posOffset>0</wp:posOffset></wp:positionV>"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/><wp:effectExtent l="0" t="0" r="0" b="0"/><wp:wrapNone/>"#,
            r#"<wp:docPr id="{id}" name="Watermark {id}"/><wp:cNvGraphicFramePr/>"#,
            r#"<a:graphic><a:graphicData uri="{pic}"><pic:pic>"#,
            r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="watermark.png"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rid}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:anchor></w:drawing></w:r></w:p>"#,
        ),
        wp = DRAWING_NS,
        a = DRAWINGML_NS,
        pic = PICTURE_NS,
        r = REL_NS,
        cx = cx,
        cy = cy,
        id = drawing_id,
        rid = image_rid,
    )
}
