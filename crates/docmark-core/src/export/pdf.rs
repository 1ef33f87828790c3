//! PDF re-authoring: draws placed elements into a fresh copy of the
//! original bytes and fills/flattens detected form fields.
//!
//! Stored PDF-point positions are authoritative; nothing here re-measures
//! the DOM. Stored coordinates use a top-left origin, so every draw flips
//! through the page MediaBox height.

use std::io::Write;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use lopdf::{Dictionary, Object, ObjectId, Stream, StringFormat};

use crate::coords::flip_to_writer;
use crate::document::PdfDocument;
use crate::elements::{FontStyle, FontWeight, SignatureElement, TextElement};
use crate::error::DocMarkError;
use crate::export::ExportOutcome;
use crate::forms::{FormFieldType, FormTracker};

/// Parse hex color string (e.g., "#FF0000" or "FF0000") to RGB floats
/// (0-1 range). Anything malformed, including non-ASCII input that would
/// break byte slicing, falls back to black.
pub(crate) fn parse_hex_color(color: &str) -> (f32, f32, f32) {
    let hex = color.trim_start_matches('#');
    if hex.len() >= 6 && hex.is_ascii() {
        let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0) as f32 / 255.0;
        let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0) as f32 / 255.0;
        let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0) as f32 / 255.0;
        (r, g, b)
    } else {
        (0.0, 0.0, 0.0)
    }
}

/// Escape special characters for PDF string literals
fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            _ if c.is_ascii() => c.to_string(),
            _ => "?".to_string(),
        })
        .collect()
}

/// Map a CSS font family plus weight/style flags to a PDF standard-14
/// font name for maximum viewer compatibility.
pub(crate) fn pdf_font_name(family: &str, weight: FontWeight, style: FontStyle) -> &'static str {
    let lower = family.to_lowercase();
    let base = if lower == "serif"
        || lower.contains("times")
        || lower.contains("georgia")
        || lower.contains("garamond")
    {
        "Times"
    } else if lower == "monospace"
        || lower.contains("courier")
        || lower.contains("mono")
        || lower.contains("consolas")
        || lower.contains("monaco")
    {
        "Courier"
    } else {
        "Helvetica"
    };

    let bold = weight == FontWeight::Bold;
    let italic = style == FontStyle::Italic;
    match base {
        "Times" => match (bold, italic) {
            (true, true) => "Times-BoldItalic",
            (true, false) => "Times-Bold",
            (false, true) => "Times-Italic",
            (false, false) => "Times-Roman",
        },
        "Courier" => match (bold, italic) {
            (true, true) => "Courier-BoldOblique",
            (true, false) => "Courier-Bold",
            (false, true) => "Courier-Oblique",
            (false, false) => "Courier",
        },
        _ => match (bold, italic) {
            (true, true) => "Helvetica-BoldOblique",
            (true, false) => "Helvetica-Bold",
            (false, true) => "Helvetica-Oblique",
            (false, false) => "Helvetica",
        },
    }
}

/// Decode a PDF text string: UTF-16BE when BOM-prefixed, UTF-8 otherwise
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&utf16)
    } else {
        String::from_utf8_lossy(bytes).to_string()
    }
}

/// Re-author the original PDF bytes with all placed elements drawn in and
/// detected form-field values applied.
///
/// Per-element image failures are collected in the outcome's `skipped` list
/// rather than aborting the whole export.
pub fn export_pdf(
    original: &[u8],
    text_elements: &[TextElement],
    signature_elements: &[SignatureElement],
    forms: &FormTracker,
    flatten_forms: bool,
) -> Result<ExportOutcome, DocMarkError> {
    let mut pdf = PdfDocument::from_bytes(original.to_vec())?;
    let pages: Vec<(u32, ObjectId)> = pdf.doc.get_pages().into_iter().collect();
    let mut skipped = Vec::new();

    // Fill form values before drawing so the redundant text pass can pick
    // up the widget rects.
    let value_draws = apply_form_values(&mut pdf, forms);

    for (page_num, page_id) in &pages {
        let media_box = pdf.page_dimensions(*page_num)?;
        let mut ops = String::new();
        let mut fonts: Vec<&'static str> = Vec::new();
        let mut images: Vec<(String, ObjectId)> = Vec::new();
        let mut gstates: Vec<(String, ObjectId)> = Vec::new();

        for el in text_elements.iter().filter(|e| e.page == *page_num) {
            let font = pdf_font_name(&el.font_family, el.font_weight, el.font_style);
            if !fonts.contains(&font) {
                fonts.push(font);
            }
            ops.push_str(&text_ops(el, font, media_box));
        }

        for el in signature_elements.iter().filter(|e| e.page == *page_num) {
            let image = match decode_signature_image(&el.image_data) {
                Ok(image) => image,
                Err(_) => {
                    skipped.push(el.id.clone());
                    continue;
                }
            };

            let smask_id = image
                .smask
                .map(|stream| pdf.doc.add_object(Object::Stream(stream)));
            let mut dict = image.xobject.dict.clone();
            if let Some(id) = smask_id {
                dict.set("SMask", Object::Reference(id));
            }
            let image_id = pdf
                .doc
                .add_object(Object::Stream(Stream::new(dict, image.xobject.content)));
            let image_name = format!("DmSig{}", images.len());

            let gs_name = if el.opacity < 1.0 {
                let mut gs = Dictionary::new();
                gs.set("Type", Object::Name(b"ExtGState".to_vec()));
                gs.set("CA", Object::Real(el.opacity as f32));
                gs.set("ca", Object::Real(el.opacity as f32));
                let gs_id = pdf.doc.add_object(Object::Dictionary(gs));
                let name = format!("DmGs{}", gstates.len());
                gstates.push((name.clone(), gs_id));
                Some(name)
            } else {
                None
            };

            ops.push_str(&image_ops(el, &image_name, gs_name.as_deref(), media_box));
            images.push((image_name, image_id));
        }

        for (rect, value) in value_draws
            .iter()
            .filter(|(p, _, _)| p == page_num)
            .map(|(_, r, v)| (r, v))
        {
            if !fonts.contains(&"Helvetica") {
                fonts.push("Helvetica");
            }
            ops.push_str(&field_value_ops(rect, value));
        }

        if ops.is_empty() && fonts.is_empty() {
            continue;
        }

        for font in fonts {
            let mut f = Dictionary::new();
            f.set("Type", Object::Name(b"Font".to_vec()));
            f.set("Subtype", Object::Name(b"Type1".to_vec()));
            f.set("BaseFont", Object::Name(font.as_bytes().to_vec()));
            add_page_resource(
                pdf.doc_mut(),
                *page_id,
                "Font",
                &format!("Dm{}", font),
                Object::Dictionary(f),
            )?;
        }
        for (name, id) in images {
            add_page_resource(pdf.doc_mut(), *page_id, "XObject", &name, Object::Reference(id))?;
        }
        for (name, id) in gstates {
            add_page_resource(
                pdf.doc_mut(),
                *page_id,
                "ExtGState",
                &name,
                Object::Reference(id),
            )?;
        }

        wrap_page_content(pdf.doc_mut(), *page_id, ops)?;
    }

    if flatten_forms {
        flatten_acroform(&mut pdf, &pages);
    }

    let bytes = pdf.save_to_bytes()?;
    Ok(ExportOutcome { bytes, skipped })
}

/// Content operators for a text element.
///
/// Stored y is the top of the text box in top-left space; the drawn
/// baseline sits one font-size below it, flipped into bottom-left space.
fn text_ops(el: &TextElement, font: &str, media_box: [f64; 4]) -> String {
    let (r, g, b) = parse_hex_color(&el.color);
    let x = media_box[0] + el.x;
    let y = flip_to_writer(media_box, el.y, el.font_size);
    format!(
        "q\nBT\n/Dm{} {} Tf\n{} {} {} rg\n{} {} Td\n({}) Tj\nET\nQ\n",
        font,
        el.font_size,
        r,
        g,
        b,
        x,
        y,
        escape_pdf_string(&el.content)
    )
}

/// Content operators for a signature image: rotate about the element
/// center, then place the unit image square at the flipped rect.
fn image_ops(
    el: &SignatureElement,
    image_name: &str,
    gs_name: Option<&str>,
    media_box: [f64; 4],
) -> String {
    let x = media_box[0] + el.x;
    let y = flip_to_writer(media_box, el.y, el.height);
    let cx = x + el.width / 2.0;
    let cy = y + el.height / 2.0;
    // Screen rotation is clockwise with y down; PDF angles are
    // counter-clockwise with y up, so negate.
    let theta = (-el.rotation).to_radians();
    let (sin, cos) = theta.sin_cos();

    let mut ops = String::from("q\n");
    if let Some(gs) = gs_name {
        ops.push_str(&format!("/{} gs\n", gs));
    }
    if el.rotation != 0.0 {
        ops.push_str(&format!("1 0 0 1 {} {} cm\n", cx, cy));
        ops.push_str(&format!("{} {} {} {} 0 0 cm\n", cos, sin, -sin, cos));
        ops.push_str(&format!("1 0 0 1 {} {} cm\n", -cx, -cy));
    }
    ops.push_str(&format!(
        "{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
        el.width, el.height, x, y, image_name
    ));
    ops
}

/// Redundant visual pass for a filled form field: draw the value as plain
/// text inside the widget rect so the output looks right even where a
/// viewer ignores the updated field value.
fn field_value_ops(rect: &[f64; 4], value: &str) -> String {
    let [x1, y1, x2, y2] = *rect;
    let height = (y2 - y1).abs();
    let font_size = (height - 4.0).clamp(6.0, 12.0);
    format!(
        "q\nBT\n/DmHelvetica {} Tf\n0 0 0 rg\n{} {} Td\n({}) Tj\nET\nQ\n",
        font_size,
        x1.min(x2) + 2.0,
        y1.min(y2) + 2.0,
        escape_pdf_string(value)
    )
}

struct DecodedImage {
    xobject: Stream,
    smask: Option<Stream>,
}

/// Decode a signature payload (base64, with or without a data-URL prefix)
/// into an image XObject. PNG is decoded to raw samples and recompressed
/// with FlateDecode; JPEG falls back to direct DCTDecode embedding.
fn decode_signature_image(payload: &str) -> Result<DecodedImage, DocMarkError> {
    let b64 = match payload.find("base64,") {
        Some(idx) => &payload[idx + 7..],
        None => payload,
    };
    let bytes = BASE64
        .decode(b64.trim())
        .map_err(|e| DocMarkError::ImageError(e.to_string()))?;

    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        decode_png(&bytes)
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        decode_jpeg(&bytes)
    } else {
        Err(DocMarkError::ImageError("Unknown image format".to_string()))
    }
}

fn decode_png(bytes: &[u8]) -> Result<DecodedImage, DocMarkError> {
    let mut decoder = png::Decoder::new(std::io::Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| DocMarkError::ImageError(e.to_string()))?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| DocMarkError::ImageError(e.to_string()))?;
    buf.truncate(info.buffer_size());

    let (width, height) = (info.width, info.height);
    let pixel_count = (width as usize) * (height as usize);

    // Split samples into color and (optional) alpha planes
    let (color, color_space, alpha): (Vec<u8>, &[u8], Option<Vec<u8>>) = match info.color_type {
        png::ColorType::Rgb => (buf, b"DeviceRGB", None),
        png::ColorType::Grayscale => (buf, b"DeviceGray", None),
        png::ColorType::Rgba => {
            let mut rgb = Vec::with_capacity(pixel_count * 3);
            let mut a = Vec::with_capacity(pixel_count);
            for px in buf.chunks_exact(4) {
                rgb.extend_from_slice(&px[0..3]);
                a.push(px[3]);
            }
            (rgb, b"DeviceRGB", Some(a))
        }
        png::ColorType::GrayscaleAlpha => {
            let mut gray = Vec::with_capacity(pixel_count);
            let mut a = Vec::with_capacity(pixel_count);
            for px in buf.chunks_exact(2) {
                gray.push(px[0]);
                a.push(px[1]);
            }
            (gray, b"DeviceGray", Some(a))
        }
        other => {
            return Err(DocMarkError::ImageError(format!(
                "Unsupported PNG color type: {:?}",
                other
            )))
        }
    };

    let xobject = Stream::new(
        image_dict(width, height, color_space, b"FlateDecode"),
        zlib_compress(&color)?,
    );

    let smask = match alpha {
        Some(a) => {
            let dict = image_dict(width, height, b"DeviceGray", b"FlateDecode");
            Some(Stream::new(dict, zlib_compress(&a)?))
        }
        None => None,
    };

    Ok(DecodedImage { xobject, smask })
}

/// JPEG can be embedded as-is under DCTDecode; only the SOF header needs
/// parsing for dimensions and component count.
fn decode_jpeg(bytes: &[u8]) -> Result<DecodedImage, DocMarkError> {
    let mut i = 2;
    while i + 10 < bytes.len() {
        if bytes[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = bytes[i + 1];
        if (0xC0..=0xCF).contains(&marker) && marker != 0xC4 && marker != 0xC8 && marker != 0xCC {
            let height = u16::from_be_bytes([bytes[i + 5], bytes[i + 6]]) as u32;
            let width = u16::from_be_bytes([bytes[i + 7], bytes[i + 8]]) as u32;
            let color_space: &[u8] = if bytes[i + 9] == 1 {
                b"DeviceGray"
            } else {
                b"DeviceRGB"
            };
            return Ok(DecodedImage {
                xobject: Stream::new(
                    image_dict(width, height, color_space, b"DCTDecode"),
                    bytes.to_vec(),
                ),
                smask: None,
            });
        }
        let length = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
        if length < 2 {
            break;
        }
        i += 2 + length;
    }
    Err(DocMarkError::ImageError(
        "Could not parse JPEG header".to_string(),
    ))
}

fn image_dict(width: u32, height: u32, color_space: &[u8], filter: &[u8]) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(filter.to_vec()));
    dict
}

fn zlib_compress(data: &[u8]) -> Result<Vec<u8>, DocMarkError> {
    let mut encoder =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| DocMarkError::ImageError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| DocMarkError::ImageError(e.to_string()))
}

/// Wrap the page's existing content in q/Q and append our operators so
/// leaked graphics state from the original streams cannot shift our draws.
fn wrap_page_content(
    doc: &mut lopdf::Document,
    page_id: ObjectId,
    ops: String,
) -> Result<(), DocMarkError> {
    let prefix_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        b"q\n".to_vec(),
    )));
    let suffix_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        format!("Q\n{}", ops).into_bytes(),
    )));

    let existing: Vec<Object> = {
        let page = doc
            .get_object(page_id)
            .map_err(|e| DocMarkError::ExportError(e.to_string()))?;
        let page_dict = page
            .as_dict()
            .map_err(|_| DocMarkError::ExportError("Page is not a dictionary".to_string()))?;
        match page_dict.get(b"Contents") {
            Ok(Object::Array(arr)) => arr.clone(),
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Array(arr)) => arr.clone(),
                _ => vec![Object::Reference(*id)],
            },
            _ => Vec::new(),
        }
    };

    let mut contents = vec![Object::Reference(prefix_id)];
    contents.extend(existing);
    contents.push(Object::Reference(suffix_id));

    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| DocMarkError::ExportError(e.to_string()))?
        .as_dict_mut()
        .map_err(|_| DocMarkError::ExportError("Page is not a dictionary".to_string()))?;
    page.set("Contents", Object::Array(contents));
    Ok(())
}

/// Add a named entry under a page's Resources category (Font, XObject,
/// ExtGState), resolving referenced resource dictionaries and creating
/// missing ones.
fn add_page_resource(
    doc: &mut lopdf::Document,
    page_id: ObjectId,
    category: &str,
    name: &str,
    value: Object,
) -> Result<(), DocMarkError> {
    // Locate the resources dictionary (inline or referenced); inherit a
    // copy of the parent's when the page has none.
    let (resources_ref, inherited) = {
        let page = doc
            .get_object(page_id)
            .map_err(|e| DocMarkError::ExportError(e.to_string()))?;
        let page_dict = page
            .as_dict()
            .map_err(|_| DocMarkError::ExportError("Page is not a dictionary".to_string()))?;
        match page_dict.get(b"Resources") {
            Ok(Object::Reference(id)) => (Some(*id), None),
            Ok(Object::Dictionary(_)) => (None, None),
            _ => {
                let inherited = page_dict
                    .get(b"Parent")
                    .ok()
                    .and_then(|p| p.as_reference().ok())
                    .and_then(|pid| doc.get_object(pid).ok())
                    .and_then(|p| p.as_dict().ok())
                    .and_then(|pd| pd.get(b"Resources").ok())
                    .and_then(|res| match res {
                        Object::Dictionary(d) => Some(d.clone()),
                        Object::Reference(rid) => doc
                            .get_object(*rid)
                            .ok()
                            .and_then(|o| o.as_dict().ok())
                            .cloned(),
                        _ => None,
                    });
                (None, Some(inherited.unwrap_or_default()))
            }
        }
    };

    // The category dict itself may be an indirect object
    let category_ref = {
        let resources = match resources_ref {
            Some(id) => doc
                .get_object(id)
                .ok()
                .and_then(|o| o.as_dict().ok())
                .cloned(),
            None => doc
                .get_object(page_id)
                .ok()
                .and_then(|o| o.as_dict().ok())
                .and_then(|d| d.get(b"Resources").ok())
                .and_then(|r| match r {
                    Object::Dictionary(d) => Some(d.clone()),
                    _ => None,
                }),
        };
        resources
            .as_ref()
            .and_then(|r| r.get(category.as_bytes()).ok())
            .and_then(|c| c.as_reference().ok())
    };

    if let Some(cat_id) = category_ref {
        let cat = doc
            .get_object_mut(cat_id)
            .map_err(|e| DocMarkError::ExportError(e.to_string()))?
            .as_dict_mut()
            .map_err(|_| {
                DocMarkError::ExportError(format!("{} resource is not a dictionary", category))
            })?;
        cat.set(name, value);
        return Ok(());
    }

    let resources: &mut Dictionary = match resources_ref {
        Some(id) => doc
            .get_object_mut(id)
            .map_err(|e| DocMarkError::ExportError(e.to_string()))?
            .as_dict_mut()
            .map_err(|_| DocMarkError::ExportError("Resources is not a dictionary".to_string()))?,
        None => {
            let page = doc
                .get_object_mut(page_id)
                .map_err(|e| DocMarkError::ExportError(e.to_string()))?
                .as_dict_mut()
                .map_err(|_| {
                    DocMarkError::ExportError("Page is not a dictionary".to_string())
                })?;
            if let Some(inherited) = inherited {
                page.set("Resources", Object::Dictionary(inherited));
            }
            match page.get_mut(b"Resources") {
                Ok(Object::Dictionary(d)) => d,
                _ => {
                    return Err(DocMarkError::ExportError(
                        "Resources is not a dictionary".to_string(),
                    ))
                }
            }
        }
    };

    match resources.get_mut(category.as_bytes()) {
        Ok(Object::Dictionary(cat)) => {
            cat.set(name, value);
        }
        _ => {
            let mut cat = Dictionary::new();
            cat.set(name, value);
            resources.set(category, Object::Dictionary(cat));
        }
    }
    Ok(())
}

/// Walk every page's widget annotations, match them against the tracked
/// DOM fields by name, and set their values. Returns the widget rects and
/// values for the redundant visual pass.
fn apply_form_values(pdf: &mut PdfDocument, forms: &FormTracker) -> Vec<(u32, [f64; 4], String)> {
    let pages: Vec<(u32, ObjectId)> = pdf.doc.get_pages().into_iter().collect();
    let mut draws = Vec::new();
    let mut touched_any = false;

    for (page_num, page_id) in &pages {
        for annot_id in page_annotations(&pdf.doc, *page_id) {
            let Some((name, field_type, rect, target_id)) = widget_info(&pdf.doc, annot_id) else {
                continue;
            };
            let Some(field) = forms.match_field(&name) else {
                continue;
            };
            if field.value.is_empty() {
                continue;
            }

            let Ok(target) = pdf.doc.get_object_mut(target_id) else {
                continue;
            };
            let Ok(dict) = target.as_dict_mut() else {
                continue;
            };

            match field_type.as_slice() {
                b"Btn" => {
                    let on = matches!(
                        field.value.to_lowercase().as_str(),
                        "true" | "on" | "yes" | "checked" | "1"
                    );
                    let state: &[u8] = if on { b"Yes" } else { b"Off" };
                    dict.set("V", Object::Name(state.to_vec()));
                    dict.set("AS", Object::Name(state.to_vec()));
                    if on {
                        if let Some(rect) = rect {
                            draws.push((*page_num, rect, "X".to_string()));
                        }
                    }
                }
                _ => {
                    dict.set(
                        "V",
                        Object::String(field.value.clone().into_bytes(), StringFormat::Literal),
                    );
                    if field.field_type != FormFieldType::Checkbox {
                        if let Some(rect) = rect {
                            draws.push((*page_num, rect, field.value.clone()));
                        }
                    }
                }
            }
            touched_any = true;
        }
    }

    if touched_any {
        set_need_appearances(&mut pdf.doc);
    }
    draws
}

/// Collect a page's annotation object ids (Annots may be inline or a ref)
fn page_annotations(doc: &lopdf::Document, page_id: ObjectId) -> Vec<ObjectId> {
    let Ok(page) = doc.get_object(page_id) else {
        return Vec::new();
    };
    let Ok(page_dict) = page.as_dict() else {
        return Vec::new();
    };
    let annots = match page_dict.get(b"Annots") {
        Ok(Object::Array(arr)) => arr.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(arr)) => arr.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    annots
        .iter()
        .filter_map(|o| o.as_reference().ok())
        .collect()
}

/// For a Widget annotation, resolve its field name, field type, rect, and
/// the object id that carries /V (the widget itself, or its parent field
/// when the terminal field is split from the widget).
fn widget_info(
    doc: &lopdf::Document,
    annot_id: ObjectId,
) -> Option<(String, Vec<u8>, Option<[f64; 4]>, ObjectId)> {
    let dict = doc.get_object(annot_id).ok()?.as_dict().ok()?;
    let subtype = dict.get(b"Subtype").ok()?.as_name().ok()?;
    if subtype != b"Widget" {
        return None;
    }

    let rect = dict.get(b"Rect").ok().and_then(|r| parse_rect(doc, r));

    if let Ok(name) = dict.get(b"T").and_then(|t| t.as_str()) {
        let ft = dict
            .get(b"FT")
            .and_then(|f| f.as_name())
            .unwrap_or(b"Tx")
            .to_vec();
        return Some((decode_pdf_string(name), ft, rect, annot_id));
    }

    // Widget split from its field: name and FT live on the parent
    let parent_id = dict.get(b"Parent").ok()?.as_reference().ok()?;
    let parent = doc.get_object(parent_id).ok()?.as_dict().ok()?;
    let name = parent.get(b"T").ok()?.as_str().ok()?;
    let ft = parent
        .get(b"FT")
        .and_then(|f| f.as_name())
        .unwrap_or(b"Tx")
        .to_vec();
    Some((decode_pdf_string(name), ft, rect, parent_id))
}

fn parse_rect(doc: &lopdf::Document, obj: &Object) -> Option<[f64; 4]> {
    let arr = match obj {
        Object::Array(a) => a.clone(),
        Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok()?.clone(),
        _ => return None,
    };
    if arr.len() != 4 {
        return None;
    }
    let mut values = [0.0f64; 4];
    for (i, o) in arr.iter().enumerate() {
        values[i] = match o {
            Object::Integer(n) => *n as f64,
            Object::Real(r) => *r as f64,
            _ => return None,
        };
    }
    Some(values)
}

fn set_need_appearances(doc: &mut lopdf::Document) {
    let acroform_ref = doc
        .catalog()
        .ok()
        .and_then(|c| c.get(b"AcroForm").ok())
        .and_then(|a| a.as_reference().ok());

    if let Some(id) = acroform_ref {
        if let Ok(obj) = doc.get_object_mut(id) {
            if let Ok(dict) = obj.as_dict_mut() {
                dict.set("NeedAppearances", Object::Boolean(true));
            }
        }
    } else if let Ok(catalog) = doc.catalog_mut() {
        if let Ok(Object::Dictionary(dict)) = catalog.get_mut(b"AcroForm") {
            dict.set("NeedAppearances", Object::Boolean(true));
        }
    }
}

/// Bake the filled values in: strip every Widget annotation from the pages
/// and drop the AcroForm from the catalog. The values were already drawn
/// as page content by the redundant text pass.
fn flatten_acroform(pdf: &mut PdfDocument, pages: &[(u32, ObjectId)]) {
    for (_, page_id) in pages {
        let keep: Vec<Object> = page_annotations(&pdf.doc, *page_id)
            .into_iter()
            .filter(|annot_id| {
                pdf.doc
                    .get_object(*annot_id)
                    .ok()
                    .and_then(|o| o.as_dict().ok())
                    .and_then(|d| d.get(b"Subtype").ok())
                    .and_then(|s| s.as_name().ok())
                    .map(|s| s != b"Widget")
                    .unwrap_or(true)
            })
            .map(Object::Reference)
            .collect();

        if let Ok(page) = pdf.doc.get_object_mut(*page_id) {
            if let Ok(dict) = page.as_dict_mut() {
                if keep.is_empty() {
                    dict.remove(b"Annots");
                } else {
                    dict.set("Annots", Object::Array(keep));
                }
            }
        }
    }

    if let Ok(catalog) = pdf.doc.catalog_mut() {
        catalog.remove(b"AcroForm");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::FormField;
    use lopdf::{dictionary, Document};

    fn create_test_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        });
        if let Ok(page) = doc.get_object_mut(page_id) {
            if let Ok(dict) = page.as_dict_mut() {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn create_form_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let widget_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::String(b"name".to_vec(), StringFormat::Literal),
            "Rect" => vec![100.into(), 700.into(), 300.into(), 720.into()],
        });
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Annots" => vec![Object::Reference(widget_id)],
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        });
        if let Ok(page) = doc.get_object_mut(page_id) {
            if let Ok(dict) = page.as_dict_mut() {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
        let acroform_id = doc.add_object(dictionary! {
            "Fields" => vec![Object::Reference(widget_id)],
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
            "AcroForm" => Object::Reference(acroform_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn page_content(bytes: &[u8]) -> String {
        let doc = Document::load_mem(bytes).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).to_string()
    }

    fn tiny_png_data_url() -> String {
        let mut png_bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_bytes, 2, 2);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer
                .write_image_data(&[
                    0, 0, 0, 255, 255, 255, 255, 0, //
                    128, 128, 128, 200, 0, 0, 255, 255,
                ])
                .unwrap();
        }
        format!("data:image/png;base64,{}", BASE64.encode(&png_bytes))
    }

    #[test]
    fn test_export_no_elements_round_trips() {
        let pdf = create_test_pdf();
        let out = export_pdf(&pdf, &[], &[], &FormTracker::new(), false).unwrap();
        assert!(out.bytes.starts_with(b"%PDF-"));
        assert!(out.skipped.is_empty());
        assert_eq!(Document::load_mem(&out.bytes).unwrap().get_pages().len(), 1);
    }

    #[test]
    fn test_export_text_draws_hello_at_flipped_position() {
        let pdf = create_test_pdf();
        let mut el = TextElement::new(50.0, 50.0, 1);
        el.content = "Hello".to_string();
        el.font_size = 16.0;

        let out = export_pdf(&pdf, &[el], &[], &FormTracker::new(), false).unwrap();
        let content = page_content(&out.bytes);
        assert!(content.contains("(Hello) Tj"), "content: {}", content);
        // Baseline: 792 - (50 + 16) = 726
        assert!(content.contains("50 726 Td"), "content: {}", content);
        assert!(content.contains("/DmHelvetica 16 Tf"), "content: {}", content);

        // Reconvert the drawn baseline through the flip: top-left y must
        // land back within a few points of the stored position.
        let recovered_y: f64 = 792.0 - 726.0 - 16.0;
        assert!((recovered_y - 50.0).abs() < 2.0);
    }

    #[test]
    fn test_export_text_color_and_font_variant() {
        let pdf = create_test_pdf();
        let mut el = TextElement::new(10.0, 10.0, 1);
        el.font_family = "Georgia".to_string();
        el.font_weight = FontWeight::Bold;
        el.color = "#FF0000".to_string();

        let out = export_pdf(&pdf, &[el], &[], &FormTracker::new(), false).unwrap();
        let content = page_content(&out.bytes);
        assert!(content.contains("/DmTimes-Bold"), "content: {}", content);
        assert!(content.contains("1 0 0 rg"), "content: {}", content);
    }

    #[test]
    fn test_export_escapes_parentheses() {
        let pdf = create_test_pdf();
        let mut el = TextElement::new(10.0, 10.0, 1);
        el.content = "a(b)c".to_string();
        let out = export_pdf(&pdf, &[el], &[], &FormTracker::new(), false).unwrap();
        assert!(page_content(&out.bytes).contains("(a\\(b\\)c) Tj"));
    }

    #[test]
    fn test_export_png_signature_embeds_image_with_smask() {
        let pdf = create_test_pdf();
        let sig = SignatureElement::new(tiny_png_data_url(), 100.0, 200.0, 1);
        let out = export_pdf(&pdf, &[], &[sig], &FormTracker::new(), false).unwrap();
        assert!(out.skipped.is_empty());

        let doc = Document::load_mem(&out.bytes).unwrap();
        let image = doc
            .objects
            .values()
            .filter_map(|o| match o {
                Object::Stream(s) => Some(s),
                _ => None,
            })
            .find(|s| {
                s.dict
                    .get(b"Subtype")
                    .and_then(|v| v.as_name())
                    .map(|n| n == b"Image")
                    .unwrap_or(false)
                    && s.dict.get(b"SMask").is_ok()
            });
        assert!(image.is_some(), "expected an image XObject with an SMask");

        let content = page_content(&out.bytes);
        assert!(content.contains("/DmSig0 Do"), "content: {}", content);
        // Flipped rect: y = 792 - 200 - 80 = 512
        assert!(content.contains("200 0 0 80 100 512 cm"), "content: {}", content);
    }

    #[test]
    fn test_export_rotated_translucent_signature_ops() {
        let pdf = create_test_pdf();
        let mut sig = SignatureElement::new(tiny_png_data_url(), 0.0, 0.0, 1);
        sig.set_rotation(90.0);
        sig.set_opacity(0.5);
        let out = export_pdf(&pdf, &[], &[sig], &FormTracker::new(), false).unwrap();
        let content = page_content(&out.bytes);
        assert!(content.contains("/DmGs0 gs"), "content: {}", content);
        // Rotation matrix present (three chained cm before the placement cm)
        assert!(content.matches(" cm").count() >= 4, "content: {}", content);
    }

    #[test]
    fn test_export_undecodable_signature_is_skipped_not_fatal() {
        let pdf = create_test_pdf();
        let sig = SignatureElement::new("!!not base64!!".to_string(), 0.0, 0.0, 1);
        let sig_id = sig.id.clone();
        let mut el = TextElement::new(10.0, 10.0, 1);
        el.content = "Kept".to_string();

        let out = export_pdf(&pdf, &[el], &[sig], &FormTracker::new(), false).unwrap();
        assert_eq!(out.skipped, vec![sig_id]);
        assert!(page_content(&out.bytes).contains("(Kept) Tj"));
    }

    #[test]
    fn test_form_fill_sets_value_and_need_appearances() {
        let pdf = create_form_pdf();
        let mut forms = FormTracker::new();
        forms.sync(vec![FormField {
            id: "f1".to_string(),
            name: "name".to_string(),
            field_type: FormFieldType::Text,
            value: "Ada".to_string(),
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 20.0,
            page: 1,
            options: Vec::new(),
        }]);

        let out = export_pdf(&pdf, &[], &[], &forms, false).unwrap();
        let doc = Document::load_mem(&out.bytes).unwrap();

        let filled = doc.objects.values().any(|o| {
            o.as_dict()
                .ok()
                .and_then(|d| d.get(b"V").ok())
                .and_then(|v| v.as_str().ok())
                .map(|v| v == b"Ada")
                .unwrap_or(false)
        });
        assert!(filled, "widget /V should be set");

        let need_appearances = doc.objects.values().any(|o| {
            o.as_dict()
                .ok()
                .and_then(|d| d.get(b"NeedAppearances").ok())
                .and_then(|v| v.as_bool().ok())
                .unwrap_or(false)
        });
        assert!(need_appearances);

        // Redundant visual pass draws the value at the widget rect
        assert!(page_content(&out.bytes).contains("(Ada) Tj"));
    }

    #[test]
    fn test_form_fill_fuzzy_name_match() {
        let pdf = create_form_pdf();
        let mut forms = FormTracker::new();
        forms.sync(vec![FormField {
            id: "f1".to_string(),
            name: "applicant_name_1".to_string(),
            field_type: FormFieldType::Text,
            value: "Grace".to_string(),
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 20.0,
            page: 1,
            options: Vec::new(),
        }]);

        // PDF field "name" is a substring of the tracked name
        let out = export_pdf(&pdf, &[], &[], &forms, false).unwrap();
        assert!(page_content(&out.bytes).contains("(Grace) Tj"));
    }

    #[test]
    fn test_flatten_removes_widgets_and_acroform() {
        let pdf = create_form_pdf();
        let mut forms = FormTracker::new();
        forms.sync(vec![FormField {
            id: "f1".to_string(),
            name: "name".to_string(),
            field_type: FormFieldType::Text,
            value: "Ada".to_string(),
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 20.0,
            page: 1,
            options: Vec::new(),
        }]);

        let out = export_pdf(&pdf, &[], &[], &forms, true).unwrap();
        let doc = Document::load_mem(&out.bytes).unwrap();

        assert!(doc.catalog().unwrap().get(b"AcroForm").is_err());
        let page_id = *doc.get_pages().get(&1).unwrap();
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        assert!(page.get(b"Annots").is_err(), "widgets should be stripped");
        // The baked value survives as page content
        assert!(page_content(&out.bytes).contains("(Ada) Tj"));
    }

    #[test]
    fn test_unmatched_field_left_unfilled() {
        let pdf = create_form_pdf();
        let mut forms = FormTracker::new();
        forms.sync(vec![FormField {
            id: "f1".to_string(),
            name: "zipcode".to_string(),
            field_type: FormFieldType::Text,
            value: "90210".to_string(),
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 20.0,
            page: 1,
            options: Vec::new(),
        }]);

        let out = export_pdf(&pdf, &[], &[], &forms, false).unwrap();
        let doc = Document::load_mem(&out.bytes).unwrap();
        let filled = doc
            .objects
            .values()
            .any(|o| o.as_dict().ok().map(|d| d.has(b"V")).unwrap_or(false));
        assert!(!filled, "no field should have been filled");
    }

    #[test]
    fn test_pdf_font_name_mapping() {
        assert_eq!(
            pdf_font_name("serif", FontWeight::Normal, FontStyle::Normal),
            "Times-Roman"
        );
        assert_eq!(
            pdf_font_name("Times New Roman", FontWeight::Bold, FontStyle::Italic),
            "Times-BoldItalic"
        );
        assert_eq!(
            pdf_font_name("monospace", FontWeight::Normal, FontStyle::Normal),
            "Courier"
        );
        assert_eq!(
            pdf_font_name("Courier New", FontWeight::Bold, FontStyle::Normal),
            "Courier-Bold"
        );
        assert_eq!(
            pdf_font_name("Arial", FontWeight::Normal, FontStyle::Normal),
            "Helvetica"
        );
        assert_eq!(
            pdf_font_name("Arial", FontWeight::Bold, FontStyle::Italic),
            "Helvetica-BoldOblique"
        );
        assert_eq!(
            pdf_font_name("Comic Sans MS", FontWeight::Normal, FontStyle::Italic),
            "Helvetica-Oblique"
        );
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FF0000"), (1.0, 0.0, 0.0));
        assert_eq!(parse_hex_color("00FF00"), (0.0, 1.0, 0.0));
        assert_eq!(parse_hex_color("#zzz"), (0.0, 0.0, 0.0));
        let (r, g, b) = parse_hex_color("#808080");
        assert!((r - 0.50196).abs() < 0.001);
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn test_parse_hex_color_non_ascii_falls_back_to_black() {
        // Six bytes but not six ASCII chars; must not panic on slicing
        assert_eq!(parse_hex_color("🎨ab"), (0.0, 0.0, 0.0));
        assert_eq!(parse_hex_color("# красн"), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_export_with_non_ascii_color_draws_black() {
        let pdf = create_test_pdf();
        let mut el = TextElement::new(50.0, 50.0, 1);
        el.content = "Hi".to_string();
        el.color = "🎨ab".to_string();
        let out = export_pdf(&pdf, &[el], &[], &FormTracker::new(), false).unwrap();
        let content = page_content(&out.bytes);
        assert!(content.contains("0 0 0 rg"));
    }

    #[test]
    fn test_escape_pdf_string() {
        assert_eq!(escape_pdf_string("a(b)c\\d"), "a\\(b\\)c\\\\d");
        assert_eq!(escape_pdf_string("héllo"), "h?llo");
    }

    #[test]
    fn test_decode_jpeg_header() {
        let jpeg = vec![
            0xFF, 0xD8, // SOI
            0xFF, 0xC0, // SOF0
            0x00, 0x11, // length
            0x08, // precision
            0x00, 0x64, // height 100
            0x00, 0xC8, // width 200
            0x03, // components
            0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01, 0xFF, 0xD9,
        ];
        let image = decode_jpeg(&jpeg).unwrap();
        assert_eq!(image.xobject.dict.get(b"Width").unwrap().as_i64().unwrap(), 200);
        assert_eq!(image.xobject.dict.get(b"Height").unwrap().as_i64().unwrap(), 100);
        assert_eq!(
            image.xobject.dict.get(b"Filter").unwrap().as_name().unwrap(),
            b"DCTDecode"
        );
        assert!(image.smask.is_none());
    }

    #[test]
    fn test_decode_signature_rejects_unknown_format() {
        let payload = BASE64.encode([0u8; 32]);
        assert!(matches!(
            decode_signature_image(&payload),
            Err(DocMarkError::ImageError(_))
        ));
    }

    #[test]
    fn test_decode_pdf_string_utf16() {
        let mut bytes = vec![0xFE, 0xFF];
        for c in "name".encode_utf16() {
            bytes.extend_from_slice(&c.to_be_bytes());
        }
        assert_eq!(decode_pdf_string(&bytes), "name");
        assert_eq!(decode_pdf_string(b"plain"), "plain");
    }
}
