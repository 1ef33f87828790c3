//! PDF parsing and manipulation using lopdf

use lopdf::{Document, Object, ObjectId};

use crate::error::DocMarkError;

/// Wrapper around lopdf::Document for WASM-friendly operations
pub struct PdfDocument {
    pub(crate) doc: Document,
    bytes: Vec<u8>,
}

impl PdfDocument {
    /// Load a PDF from raw bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, DocMarkError> {
        let doc =
            Document::load_mem(&bytes).map_err(|e| DocMarkError::ParseError(e.to_string()))?;
        Ok(Self { doc, bytes })
    }

    /// Get the raw bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Get the number of pages
    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// Get page object ID for a given page number (1-indexed)
    pub fn page_id(&self, page_num: u32) -> Option<ObjectId> {
        self.doc.get_pages().get(&page_num).copied()
    }

    /// Get page dimensions (MediaBox) as [x, y, width, height]
    pub fn page_dimensions(&self, page_num: u32) -> Result<[f64; 4], DocMarkError> {
        let page_id = self
            .page_id(page_num)
            .ok_or(DocMarkError::PageNotFound(page_num))?;

        let page = self
            .doc
            .get_object(page_id)
            .map_err(|e| DocMarkError::ParseError(e.to_string()))?;

        let page_dict = page
            .as_dict()
            .map_err(|_| DocMarkError::ParseError("Page is not a dictionary".to_string()))?;

        self.get_media_box(page_dict)
    }

    /// Extract MediaBox from page dictionary, traversing parent if needed
    fn get_media_box(&self, page_dict: &lopdf::Dictionary) -> Result<[f64; 4], DocMarkError> {
        if let Ok(media_box) = page_dict.get(b"MediaBox") {
            return self.parse_rect(media_box);
        }

        if let Ok(parent_ref) = page_dict.get(b"Parent") {
            if let Ok(parent_id) = parent_ref.as_reference() {
                if let Ok(parent) = self.doc.get_object(parent_id) {
                    if let Ok(parent_dict) = parent.as_dict() {
                        if let Ok(media_box) = parent_dict.get(b"MediaBox") {
                            return self.parse_rect(media_box);
                        }
                    }
                }
            }
        }

        // Default to US Letter size
        Ok([0.0, 0.0, 612.0, 792.0])
    }

    /// Parse a PDF rectangle array into [x, y, width, height]
    fn parse_rect(&self, obj: &Object) -> Result<[f64; 4], DocMarkError> {
        let arr = match obj {
            Object::Array(a) => a,
            Object::Reference(id) => {
                let resolved = self
                    .doc
                    .get_object(*id)
                    .map_err(|e| DocMarkError::ParseError(e.to_string()))?;
                resolved.as_array().map_err(|_| {
                    DocMarkError::ParseError("MediaBox reference is not an array".to_string())
                })?
            }
            _ => {
                return Err(DocMarkError::ParseError(
                    "MediaBox is not an array".to_string(),
                ))
            }
        };

        if arr.len() != 4 {
            return Err(DocMarkError::ParseError(format!(
                "MediaBox has {} elements, expected 4",
                arr.len()
            )));
        }

        let mut values = [0.0f64; 4];
        for (i, obj) in arr.iter().enumerate() {
            values[i] = self.extract_number(obj)?;
        }

        // Convert from [x1, y1, x2, y2] to [x, y, width, height]
        Ok([
            values[0],
            values[1],
            values[2] - values[0],
            values[3] - values[1],
        ])
    }

    /// Extract a number from a PDF object
    fn extract_number(&self, obj: &Object) -> Result<f64, DocMarkError> {
        match obj {
            Object::Integer(i) => Ok(*i as f64),
            Object::Real(r) => Ok(*r as f64),
            Object::Reference(id) => {
                let resolved = self
                    .doc
                    .get_object(*id)
                    .map_err(|e| DocMarkError::ParseError(e.to_string()))?;
                self.extract_number(resolved)
            }
            _ => Err(DocMarkError::ParseError(
                "Expected number in rectangle".to_string(),
            )),
        }
    }

    /// Get mutable access to the internal document
    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Save the document to bytes
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, DocMarkError> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| DocMarkError::ExportError(e.to_string()))?;
        self.bytes = buffer.clone();
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pdf() -> Vec<u8> {
        use lopdf::{dictionary, Document, Object};

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

    #[test]
    fn test_from_bytes_valid_pdf() {
        let pdf = PdfDocument::from_bytes(test_pdf()).unwrap();
        assert_eq!(pdf.page_count(), 1);
    }

    #[test]
    fn test_from_bytes_html_fails() {
        // Regression guard for HTML served in place of a PDF (e.g. an SPA
        // fallback response handed to the file loader)
        let html = b"<!DOCTYPE html><html><body>Not a PDF</body></html>";
        assert!(PdfDocument::from_bytes(html.to_vec()).is_err());
    }

    #[test]
    fn test_from_bytes_empty_fails() {
        assert!(PdfDocument::from_bytes(vec![]).is_err());
    }

    #[test]
    fn test_from_bytes_garbage_fails() {
        assert!(PdfDocument::from_bytes(vec![0u8; 100]).is_err());
    }

    #[test]
    fn test_page_dimensions_letter() {
        let pdf = PdfDocument::from_bytes(test_pdf()).unwrap();
        let dims = pdf.page_dimensions(1).unwrap();
        assert_eq!(dims, [0.0, 0.0, 612.0, 792.0]);
    }

    #[test]
    fn test_page_dimensions_missing_page() {
        let pdf = PdfDocument::from_bytes(test_pdf()).unwrap();
        assert!(matches!(
            pdf.page_dimensions(9),
            Err(DocMarkError::PageNotFound(9))
        ));
    }

    #[test]
    fn test_media_box_from_parent() {
        use lopdf::{dictionary, Document, Object};

        // Page with no MediaBox of its own; the Pages parent carries it
        let mut doc = Document::with_version("1.7");
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
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

        let pdf = PdfDocument::from_bytes(buffer).unwrap();
        let dims = pdf.page_dimensions(1).unwrap();
        assert_eq!(dims, [0.0, 0.0, 595.0, 842.0]);
    }

    #[test]
    fn test_parse_rect_array() {
        let doc = lopdf::Document::new();
        let pdf = PdfDocument { doc, bytes: vec![] };

        let arr = lopdf::Object::Array(vec![
            lopdf::Object::Integer(0),
            lopdf::Object::Integer(0),
            lopdf::Object::Integer(612),
            lopdf::Object::Integer(792),
        ]);

        let dims = pdf.parse_rect(&arr).unwrap();
        assert_eq!(dims[2], 612.0);
        assert_eq!(dims[3], 792.0);
    }

    #[test]
    fn test_extract_number() {
        let doc = lopdf::Document::new();
        let pdf = PdfDocument { doc, bytes: vec![] };

        assert_eq!(
            pdf.extract_number(&lopdf::Object::Integer(42)).unwrap(),
            42.0
        );
        assert!(
            (pdf.extract_number(&lopdf::Object::Real(1.234)).unwrap() - 1.234).abs() < 0.001
        );
    }
}
