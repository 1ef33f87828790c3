//! Editing session state: loaded document metadata, element collections,
//! tool mode, selection, and keyboard shortcuts.

use serde::{Deserialize, Serialize};

use crate::elements::{SavedSignature, SignatureElement, TextElement};

/// Offset applied to duplicated elements, in screen pixels. Converted to
/// PDF points through the current display scale at duplication time.
pub const DUPLICATE_OFFSET_PX: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolMode {
    Select,
    Text,
    Signature,
}

impl ToolMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolMode::Select => "select",
            ToolMode::Text => "text",
            ToolMode::Signature => "signature",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "select" => Some(ToolMode::Select),
            "text" => Some(ToolMode::Text),
            "signature" => Some(ToolMode::Signature),
            _ => None,
        }
    }
}

/// The currently selected element. Text and signature selection are
/// mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Selection {
    Text(String),
    Signature(String),
}

impl Selection {
    pub fn id(&self) -> &str {
        match self {
            Selection::Text(id) | Selection::Signature(id) => id,
        }
    }
}

/// The working document: original bytes plus all editing state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfSession {
    pub file_name: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub page_count: u32,
    pub current_page: u32,
    pub zoom: f64,
    pub text_elements: Vec<TextElement>,
    pub signature_elements: Vec<SignatureElement>,
    tool: ToolMode,
    selection: Option<Selection>,
    /// Id of the text element in inline-edit mode; implies selection
    editing: Option<String>,
}

impl PdfSession {
    pub fn new(file_name: String, bytes: Vec<u8>, page_count: u32) -> Self {
        Self {
            file_name,
            bytes,
            page_count: page_count.max(1),
            current_page: 1,
            zoom: 1.0,
            text_elements: Vec::new(),
            signature_elements: Vec::new(),
            tool: ToolMode::Select,
            selection: None,
            editing: None,
        }
    }

    pub fn tool(&self) -> ToolMode {
        self.tool
    }

    pub fn set_tool(&mut self, tool: ToolMode) {
        self.tool = tool;
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom > 0.0 {
            self.zoom = zoom;
        }
    }

    pub fn set_current_page(&mut self, page: u32) {
        self.current_page = page.clamp(1, self.page_count);
    }

    /// Place a new text element at a PDF point on the current page.
    /// Arms back to the select tool so a second click does not place again.
    pub fn place_text(&mut self, x: f64, y: f64) -> String {
        let element = TextElement::new(x, y, self.current_page);
        let id = element.id.clone();
        self.text_elements.push(element);
        self.selection = Some(Selection::Text(id.clone()));
        self.editing = None;
        self.tool = ToolMode::Select;
        id
    }

    /// Place a new signature element at a PDF point on the current page
    pub fn place_signature(&mut self, image_data: String, x: f64, y: f64) -> String {
        let element = SignatureElement::new(image_data, x, y, self.current_page);
        let id = element.id.clone();
        self.signature_elements.push(element);
        self.selection = Some(Selection::Signature(id.clone()));
        self.editing = None;
        self.tool = ToolMode::Select;
        id
    }

    /// Place a signature from the saved library at the default position
    pub fn place_saved_signature(&mut self, saved: &SavedSignature) -> String {
        let element = SignatureElement::from_saved(saved, self.current_page);
        let id = element.id.clone();
        self.signature_elements.push(element);
        self.selection = Some(Selection::Signature(id.clone()));
        self.editing = None;
        self.tool = ToolMode::Select;
        id
    }

    pub fn text_element(&self, id: &str) -> Option<&TextElement> {
        self.text_elements.iter().find(|e| e.id == id)
    }

    pub fn text_element_mut(&mut self, id: &str) -> Option<&mut TextElement> {
        self.text_elements.iter_mut().find(|e| e.id == id)
    }

    pub fn signature_element(&self, id: &str) -> Option<&SignatureElement> {
        self.signature_elements.iter().find(|e| e.id == id)
    }

    pub fn signature_element_mut(&mut self, id: &str) -> Option<&mut SignatureElement> {
        self.signature_elements.iter_mut().find(|e| e.id == id)
    }

    pub fn text_elements_for_page(&self, page: u32) -> Vec<&TextElement> {
        self.text_elements.iter().filter(|e| e.page == page).collect()
    }

    pub fn signature_elements_for_page(&self, page: u32) -> Vec<&SignatureElement> {
        self.signature_elements
            .iter()
            .filter(|e| e.page == page)
            .collect()
    }

    pub fn select_text(&mut self, id: &str) {
        if self.text_element(id).is_some() {
            self.selection = Some(Selection::Text(id.to_string()));
            if self.editing.as_deref() != Some(id) {
                self.editing = None;
            }
        }
    }

    pub fn select_signature(&mut self, id: &str) {
        if self.signature_element(id).is_some() {
            self.selection = Some(Selection::Signature(id.to_string()));
            self.editing = None;
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
        self.editing = None;
    }

    /// Enter inline-edit mode for a text element (implies selecting it)
    pub fn begin_edit(&mut self, id: &str) {
        if self.text_element(id).is_some() {
            self.selection = Some(Selection::Text(id.to_string()));
            self.editing = Some(id.to_string());
        }
    }

    /// Leave edit mode. Content edits are applied live, so commit and cancel
    /// both just drop the editing flag.
    pub fn end_edit(&mut self) {
        self.editing = None;
    }

    pub fn set_text_content(&mut self, id: &str, content: String) {
        if let Some(el) = self.text_element_mut(id) {
            el.content = content;
        }
    }

    /// Move any element (text or signature) to a new PDF point
    pub fn move_element(&mut self, id: &str, x: f64, y: f64) {
        if let Some(el) = self.text_element_mut(id) {
            el.x = x;
            el.y = y;
        } else if let Some(el) = self.signature_element_mut(id) {
            el.x = x;
            el.y = y;
        }
    }

    /// Delete an element, clearing selection/edit state that pointed at it
    pub fn delete_element(&mut self, id: &str) {
        self.text_elements.retain(|e| e.id != id);
        self.signature_elements.retain(|e| e.id != id);
        if self.selection.as_ref().map(Selection::id) == Some(id) {
            self.selection = None;
        }
        if self.editing.as_deref() == Some(id) {
            self.editing = None;
        }
    }

    pub fn delete_selected(&mut self) {
        if let Some(sel) = self.selection.clone() {
            self.delete_element(sel.id());
        }
    }

    /// Duplicate the selected element, offset by a fixed screen-pixel delta
    /// converted through `scale`. The duplicate becomes the new selection.
    pub fn duplicate_selected(&mut self, scale: f64) -> Option<String> {
        let delta = if scale > 0.0 {
            DUPLICATE_OFFSET_PX / scale
        } else {
            DUPLICATE_OFFSET_PX
        };
        match self.selection.clone()? {
            Selection::Text(id) => {
                let dup = self.text_element(&id)?.duplicate(delta);
                let new_id = dup.id.clone();
                self.text_elements.push(dup);
                self.selection = Some(Selection::Text(new_id.clone()));
                self.editing = None;
                Some(new_id)
            }
            Selection::Signature(id) => {
                let dup = self.signature_element(&id)?.duplicate(delta);
                let new_id = dup.id.clone();
                self.signature_elements.push(dup);
                self.selection = Some(Selection::Signature(new_id.clone()));
                Some(new_id)
            }
        }
    }

    /// Handle a document-global keyboard shortcut.
    ///
    /// `modifier` is ctrl or cmd; `typing` suppresses shortcuts while a text
    /// input has focus or an element is inline-editing — except Escape,
    /// which always cancels edit mode and forces the select tool. `scale`
    /// is the composed display scale, used for the duplicate offset.
    /// Returns true when the key was consumed.
    pub fn handle_key(&mut self, key: &str, modifier: bool, typing: bool, scale: f64) -> bool {
        if key == "Escape" {
            self.tool = ToolMode::Select;
            self.clear_selection();
            return true;
        }
        if typing || self.editing.is_some() {
            return false;
        }
        match (key, modifier) {
            ("v", false) => {
                self.tool = ToolMode::Select;
                true
            }
            ("t", false) => {
                self.tool = ToolMode::Text;
                true
            }
            ("s", false) => {
                self.tool = ToolMode::Signature;
                true
            }
            ("d", true) => {
                self.duplicate_selected(scale);
                true
            }
            _ => false,
        }
    }
}
