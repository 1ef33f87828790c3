//! Structured data exports: the project JSON snapshot and the flat text CSV.
//!
//! Both paths read the element collections without mutating them. Signature
//! image payloads are truncated in the project export so the file stays
//! readable; the full payload only travels through the PDF export path.

use chrono::Utc;
use serde::Serialize;

use crate::elements::{SignatureElement, TextElement};
use crate::error::DocMarkError;

/// Length at which a signature's base64 payload is cut in the project export
const IMAGE_PREVIEW_LEN: usize = 64;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectExport<'a> {
    file_name: &'a str,
    exported_at: i64,
    page_count: u32,
    text_elements: &'a [TextElement],
    signatures: Vec<SignatureSummary<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignatureSummary<'a> {
    id: &'a str,
    image_data: String,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    rotation: f64,
    color: &'a str,
    opacity: f64,
    page: u32,
    created_at: i64,
}

impl<'a> SignatureSummary<'a> {
    fn from_element(el: &'a SignatureElement) -> Self {
        Self {
            id: &el.id,
            image_data: truncate_payload(&el.image_data),
            x: el.x,
            y: el.y,
            width: el.width,
            height: el.height,
            rotation: el.rotation,
            color: &el.color,
            opacity: el.opacity,
            page: el.page,
            created_at: el.created_at,
        }
    }
}

fn truncate_payload(data: &str) -> String {
    if data.len() <= IMAGE_PREVIEW_LEN {
        data.to_string()
    } else {
        let cut = data
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|&i| i <= IMAGE_PREVIEW_LEN)
            .last()
            .unwrap_or(0);
        format!("{}...", &data[..cut])
    }
}

/// Serialize the session's annotations to a pretty-printed project JSON
pub fn export_project_json(
    file_name: &str,
    page_count: u32,
    text_elements: &[TextElement],
    signature_elements: &[SignatureElement],
) -> Result<String, DocMarkError> {
    let project = ProjectExport {
        file_name,
        exported_at: Utc::now().timestamp_millis(),
        page_count,
        text_elements,
        signatures: signature_elements
            .iter()
            .map(SignatureSummary::from_element)
            .collect(),
    };
    serde_json::to_string_pretty(&project)
        .map_err(|e| DocMarkError::SerializationError(e.to_string()))
}

/// Serialize the text elements to CSV, one row per element
pub fn export_text_csv(text_elements: &[TextElement]) -> String {
    let mut out =
        String::from("id,content,x,y,fontSize,fontFamily,color,fontWeight,fontStyle,page\n");
    for el in text_elements {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            csv_field(&el.id),
            csv_field(&el.content),
            el.x,
            el.y,
            el.font_size,
            csv_field(&el.font_family),
            csv_field(&el.color),
            el.font_weight.as_str(),
            el.font_style.as_str(),
            el.page,
        ));
    }
    out
}

/// Quote a field when it contains a comma, quote, or newline; internal quotes
/// are doubled
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_at(content: &str, x: f64, y: f64) -> TextElement {
        let mut el = TextElement::new(x, y, 1);
        el.content = content.to_string();
        el
    }

    #[test]
    fn test_project_json_shape() {
        let texts = vec![text_at("Hello", 50.0, 50.0)];
        let sigs = vec![SignatureElement::new("a".repeat(500), 10.0, 20.0, 1)];
        let json = export_project_json("form.pdf", 3, &texts, &sigs).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["fileName"], "form.pdf");
        assert_eq!(value["pageCount"], 3);
        assert!(value["exportedAt"].as_i64().unwrap() > 0);
        assert_eq!(value["textElements"][0]["content"], "Hello");
        assert_eq!(value["signatures"][0]["x"], 10.0);
    }

    #[test]
    fn test_project_json_truncates_image_payload() {
        let sigs = vec![SignatureElement::new("x".repeat(2000), 0.0, 0.0, 1)];
        let json = export_project_json("a.pdf", 1, &[], &sigs).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let payload = value["signatures"][0]["imageData"].as_str().unwrap();
        assert!(payload.len() < 100, "payload kept short, got {}", payload.len());
        assert!(payload.ends_with("..."));
    }

    #[test]
    fn test_project_json_keeps_short_payload_intact() {
        let sigs = vec![SignatureElement::new("short".to_string(), 0.0, 0.0, 1)];
        let json = export_project_json("a.pdf", 1, &[], &sigs).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["signatures"][0]["imageData"], "short");
    }

    #[test]
    fn test_csv_header_and_rows() {
        let texts = vec![text_at("Hello", 50.0, 60.0)];
        let csv = export_text_csv(&texts);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,content,x,y,fontSize,fontFamily,color,fontWeight,fontStyle,page"
        );
        let row = lines.next().unwrap();
        assert!(row.contains(",Hello,50,60,16,Arial,#000000,normal,normal,1"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_csv_quotes_commas_and_doubles_quotes() {
        let texts = vec![text_at("Hello, \"world\"", 0.0, 0.0)];
        let csv = export_text_csv(&texts);
        assert!(csv.contains("\"Hello, \"\"world\"\"\""), "got: {}", csv);
    }

    #[test]
    fn test_csv_quotes_newlines() {
        let texts = vec![text_at("line1\nline2", 0.0, 0.0)];
        let csv = export_text_csv(&texts);
        assert!(csv.contains("\"line1\nline2\""), "got: {}", csv);
    }

    #[test]
    fn test_csv_empty_collection_is_header_only() {
        let csv = export_text_csv(&[]);
        assert_eq!(csv.lines().count(), 1);
    }
}
