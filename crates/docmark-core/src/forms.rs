//! Detected form fields and the merge tracker fed by DOM scanning.
//!
//! Fields are discovered by scanning the rendered page's interactive
//! widgets, not by parsing the PDF's AcroForm directly; the names seen in
//! the DOM are matched against PDF field names heuristically at export.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFieldType {
    Text,
    Textarea,
    Checkbox,
    Radio,
    Select,
    Button,
}

impl FormFieldType {
    /// Infer the field type from a DOM tag name and input type attribute
    pub fn from_dom(tag: &str, input_type: Option<&str>) -> Self {
        match tag.to_lowercase().as_str() {
            "textarea" => FormFieldType::Textarea,
            "select" => FormFieldType::Select,
            _ => match input_type.map(str::to_lowercase).as_deref() {
                Some("checkbox") => FormFieldType::Checkbox,
                Some("radio") => FormFieldType::Radio,
                Some("button") | Some("submit") | Some("reset") => FormFieldType::Button,
                _ => FormFieldType::Text,
            },
        }
    }
}

/// A form widget detected in the rendered page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: String,
    pub name: String,
    pub field_type: FormFieldType,
    pub value: String,
    /// Position/size in page-relative pixels as rendered
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub page: u32,
    /// Choices for select fields, empty otherwise
    #[serde(default)]
    pub options: Vec<String>,
}

/// Tracks the detected fields across repeated scans.
///
/// The scanner and the user both write values; whichever update fires last
/// wins, which is the direct-manipulation semantics the UI wants.
#[derive(Debug, Clone, Default)]
pub struct FormTracker {
    fields: Vec<FormField>,
}

impl FormTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a fresh scan result: update known fields in place, add new
    /// ones, and drop fields that disappeared from the page.
    pub fn sync(&mut self, scanned: Vec<FormField>) {
        self.fields.retain(|f| scanned.iter().any(|s| s.id == f.id));
        for field in scanned {
            if let Some(existing) = self.fields.iter_mut().find(|f| f.id == field.id) {
                *existing = field;
            } else {
                self.fields.push(field);
            }
        }
    }

    /// User edit path; mirrors a change typed into the live widget
    pub fn set_value(&mut self, id: &str, value: String) {
        if let Some(field) = self.fields.iter_mut().find(|f| f.id == id) {
            field.value = value;
        }
    }

    pub fn get(&self, id: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn fields_for_page(&self, page: u32) -> Vec<&FormField> {
        self.fields.iter().filter(|f| f.page == page).collect()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Find the tracked field for a PDF form field name.
    ///
    /// Three tiers: exact match, then case-insensitive, then substring
    /// containment in either direction. Returns None when no tier matches;
    /// the PDF field is simply left unfilled.
    pub fn match_field(&self, pdf_name: &str) -> Option<&FormField> {
        if let Some(field) = self.fields.iter().find(|f| f.name == pdf_name) {
            return Some(field);
        }

        let lower = pdf_name.to_lowercase();
        if let Some(field) = self
            .fields
            .iter()
            .find(|f| f.name.to_lowercase() == lower)
        {
            return Some(field);
        }

        self.fields.iter().find(|f| {
            let name = f.name.to_lowercase();
            !name.is_empty() && (name.contains(&lower) || lower.contains(&name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn field(id: &str, name: &str, value: &str) -> FormField {
        FormField {
            id: id.to_string(),
            name: name.to_string(),
            field_type: FormFieldType::Text,
            value: value.to_string(),
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 20.0,
            page: 1,
            options: Vec::new(),
        }
    }

    #[test]
    fn test_from_dom_inference() {
        assert_eq!(FormFieldType::from_dom("textarea", None), FormFieldType::Textarea);
        assert_eq!(FormFieldType::from_dom("select", None), FormFieldType::Select);
        assert_eq!(
            FormFieldType::from_dom("input", Some("checkbox")),
            FormFieldType::Checkbox
        );
        assert_eq!(
            FormFieldType::from_dom("input", Some("radio")),
            FormFieldType::Radio
        );
        assert_eq!(
            FormFieldType::from_dom("input", Some("submit")),
            FormFieldType::Button
        );
        assert_eq!(FormFieldType::from_dom("input", Some("text")), FormFieldType::Text);
        assert_eq!(FormFieldType::from_dom("input", None), FormFieldType::Text);
    }

    #[test]
    fn test_sync_adds_updates_and_removes() {
        let mut tracker = FormTracker::new();
        tracker.sync(vec![field("a", "name", ""), field("b", "email", "")]);
        assert_eq!(tracker.fields().len(), 2);

        // "b" disappears, "a" gets a value from the live widget, "c" appears
        tracker.sync(vec![field("a", "name", "Ada"), field("c", "phone", "")]);
        assert_eq!(tracker.fields().len(), 2);
        assert_eq!(tracker.get("a").unwrap().value, "Ada");
        assert!(tracker.get("b").is_none());
        assert!(tracker.get("c").is_some());
    }

    #[test]
    fn test_last_write_wins_between_scan_and_user() {
        let mut tracker = FormTracker::new();
        tracker.sync(vec![field("a", "name", "")]);
        tracker.set_value("a", "typed".to_string());
        assert_eq!(tracker.get("a").unwrap().value, "typed");
        // A later scan carrying the widget's live value overwrites
        tracker.sync(vec![field("a", "name", "typed more")]);
        assert_eq!(tracker.get("a").unwrap().value, "typed more");
    }

    #[test]
    fn test_match_exact_beats_fuzzy() {
        let mut tracker = FormTracker::new();
        tracker.sync(vec![
            field("a", "Name", "wrong"),
            field("b", "name", "right"),
        ]);
        assert_eq!(tracker.match_field("name").unwrap().id, "b");
    }

    #[test]
    fn test_match_case_insensitive() {
        let mut tracker = FormTracker::new();
        tracker.sync(vec![field("a", "FullName", "v")]);
        assert_eq!(tracker.match_field("fullname").unwrap().id, "a");
    }

    #[test]
    fn test_match_substring_either_direction() {
        let mut tracker = FormTracker::new();
        tracker.sync(vec![field("a", "applicant_name", "v")]);
        // PDF name contained in tracked name
        assert_eq!(tracker.match_field("name").unwrap().id, "a");

        let mut tracker = FormTracker::new();
        tracker.sync(vec![field("b", "name", "v")]);
        // Tracked name contained in PDF name
        assert_eq!(tracker.match_field("applicant_name_1").unwrap().id, "b");
    }

    #[test]
    fn test_match_none_when_unrelated() {
        let mut tracker = FormTracker::new();
        tracker.sync(vec![field("a", "email", "v")]);
        assert!(tracker.match_field("zipcode").is_none());
    }

    #[test]
    fn test_fields_for_page() {
        let mut tracker = FormTracker::new();
        let mut f2 = field("b", "x", "");
        f2.page = 2;
        tracker.sync(vec![field("a", "x", ""), f2]);
        assert_eq!(tracker.fields_for_page(1).len(), 1);
        assert_eq!(tracker.fields_for_page(2).len(), 1);
    }
}
