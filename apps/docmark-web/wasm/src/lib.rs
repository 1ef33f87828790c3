//! DocMark - browser-based PDF annotation.
//!
//! Thin DOM-facing facade over docmark-core: session state, pointer
//! gestures, form scanning, and the export paths, exposed to JavaScript
//! through wasm-bindgen.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use js_sys::{Function, Uint8Array};
use wasm_bindgen::prelude::*;
use web_sys::{Element, HtmlCanvasElement};

pub mod overlay;
pub mod raster;
pub mod scanner;
pub mod storage;
pub mod viewer;

use docmark_core::{
    export_pdf, export_project_json, export_text_csv, DragGesture, PageTransform, PdfDocument,
    PdfSession, ResizeGesture, ResizeHandle, RotateGesture, SavedSignature, Selection,
    SignatureLibrary, ToolMode,
};
use docmark_core::forms::FormTracker;
use overlay::OverlayManager;
use scanner::FormScanner;
use viewer::PdfViewer;

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    web_sys::console::log_1(&"DocMark WASM initialized".into());
}

/// Initialize pdf.js. Must be called once before loading documents.
#[wasm_bindgen(js_name = initPdfJs)]
pub async fn init_pdf_js() -> Result<(), JsValue> {
    viewer::init_pdf_js().await
}

enum ActiveGesture {
    Drag { id: String, gesture: DragGesture },
    Resize { id: String, gesture: ResizeGesture },
    Rotate { id: String, gesture: RotateGesture },
}

/// Main application state
#[wasm_bindgen]
pub struct DocMark {
    session: Option<PdfSession>,
    document: Option<PdfDocument>,
    viewer: PdfViewer,
    overlay: Option<OverlayManager>,
    transforms: HashMap<u32, PageTransform>,
    forms: Rc<RefCell<FormTracker>>,
    scanner: Option<FormScanner>,
    library: SignatureLibrary,
    notifier: Option<Function>,
    gesture: Option<ActiveGesture>,
}

impl Default for DocMark {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl DocMark {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            session: None,
            document: None,
            viewer: PdfViewer::new(),
            overlay: OverlayManager::new().ok(),
            transforms: HashMap::new(),
            forms: Rc::new(RefCell::new(FormTracker::new())),
            scanner: None,
            library: storage::load_library(),
            notifier: None,
            gesture: None,
        }
    }

    /// Register the toast callback. Receives (level, message) where level is
    /// "info", "success", "warning", or "error".
    #[wasm_bindgen(js_name = setNotifier)]
    pub fn set_notifier(&mut self, callback: Function) {
        self.notifier = Some(callback);
    }

    /// Load a PDF. Resets all session state, including any running form
    /// scanner from a previous document.
    #[wasm_bindgen(js_name = loadPdf)]
    pub async fn load_pdf(&mut self, file_name: String, bytes: Vec<u8>) -> Result<JsValue, JsValue> {
        let document = PdfDocument::from_bytes(bytes.clone())
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.viewer.load(&bytes).await?;

        let page_count = document.page_count();
        self.transforms.clear();
        for page in 1..=page_count {
            let [_, _, width, height] = document
                .page_dimensions(page)
                .map_err(|e| JsValue::from_str(&e.to_string()))?;
            self.transforms.insert(page, PageTransform::new(width, height));
        }

        self.scanner = None;
        self.forms.borrow_mut().clear();
        self.gesture = None;
        self.session = Some(PdfSession::new(file_name.clone(), bytes, page_count));
        self.document = Some(document);

        let info = js_sys::Object::new();
        js_sys::Reflect::set(&info, &"pageCount".into(), &page_count.into())?;
        js_sys::Reflect::set(&info, &"fileName".into(), &file_name.into())?;
        Ok(info.into())
    }

    #[wasm_bindgen(js_name = pageCount)]
    pub fn page_count(&self) -> u32 {
        self.session.as_ref().map(|s| s.page_count).unwrap_or(0)
    }

    /// Render a page through pdf.js and recompute that page's coordinate
    /// transform from the completed render's real size
    #[wasm_bindgen(js_name = renderPage)]
    pub async fn render_page(
        &mut self,
        page_num: u32,
        canvas: HtmlCanvasElement,
        scale: f64,
    ) -> Result<JsValue, JsValue> {
        let rendered = self.viewer.render_page(page_num, &canvas, scale).await?;

        let zoom = self.session.as_ref().map(|s| s.zoom).unwrap_or(1.0);
        if let Some(transform) = self.transforms.get_mut(&page_num) {
            transform.recompute(
                transform.pdf_width,
                transform.pdf_height,
                rendered.width / zoom,
                rendered.height / zoom,
                zoom,
            );
        }

        let info = js_sys::Object::new();
        js_sys::Reflect::set(&info, &"width".into(), &rendered.width.into())?;
        js_sys::Reflect::set(&info, &"height".into(), &rendered.height.into())?;
        Ok(info.into())
    }

    #[wasm_bindgen(js_name = setZoom)]
    pub fn set_zoom(&mut self, zoom: f64) {
        if let Some(session) = self.session.as_mut() {
            session.set_zoom(zoom);
        }
    }

    #[wasm_bindgen(js_name = setCurrentPage)]
    pub fn set_current_page(&mut self, page: u32) {
        if let Some(session) = self.session.as_mut() {
            session.set_current_page(page);
        }
    }

    #[wasm_bindgen(js_name = currentPage)]
    pub fn current_page(&self) -> u32 {
        self.session.as_ref().map(|s| s.current_page).unwrap_or(1)
    }

    #[wasm_bindgen(js_name = setTool)]
    pub fn set_tool(&mut self, tool: &str) -> Result<(), JsValue> {
        let mode = ToolMode::parse(tool)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown tool: {}", tool)))?;
        if let Some(session) = self.session.as_mut() {
            session.set_tool(mode);
        }
        Ok(())
    }

    #[wasm_bindgen(js_name = tool)]
    pub fn tool(&self) -> String {
        self.session
            .as_ref()
            .map(|s| s.tool().as_str().to_string())
            .unwrap_or_else(|| "select".to_string())
    }

    /// Handle a document-level keydown. Returns true when the key was
    /// consumed and the default action should be prevented.
    #[wasm_bindgen(js_name = handleKey)]
    pub fn handle_key(&mut self, key: &str, modifier: bool, typing: bool) -> bool {
        let scale = self.current_scale();
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if (key == "Delete" || key == "Backspace") && !typing && session.editing().is_none() {
            session.delete_selected();
            return true;
        }
        session.handle_key(key, modifier, typing, scale)
    }

    /// Place a text element at a click position (screen pixels within the
    /// page container). Returns the new element's id.
    #[wasm_bindgen(js_name = placeText)]
    pub fn place_text(&mut self, screen_x: f64, screen_y: f64) -> Result<String, JsValue> {
        let (x, y) = self.screen_to_pdf(screen_x, screen_y)?;
        let session = self.session_mut()?;
        Ok(session.place_text(x, y))
    }

    /// Place a signature image at a click position
    #[wasm_bindgen(js_name = placeSignature)]
    pub fn place_signature(
        &mut self,
        image_data: String,
        screen_x: f64,
        screen_y: f64,
    ) -> Result<String, JsValue> {
        let (x, y) = self.screen_to_pdf(screen_x, screen_y)?;
        let session = self.session_mut()?;
        Ok(session.place_signature(image_data, x, y))
    }

    #[wasm_bindgen(js_name = selectElement)]
    pub fn select_element(&mut self, id: &str) {
        if let Some(session) = self.session.as_mut() {
            if session.text_element(id).is_some() {
                session.select_text(id);
            } else {
                session.select_signature(id);
            }
        }
    }

    #[wasm_bindgen(js_name = clearSelection)]
    pub fn clear_selection(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.clear_selection();
        }
    }

    #[wasm_bindgen(js_name = selectionJson)]
    pub fn selection_json(&self) -> Result<String, JsValue> {
        let selection: Option<&Selection> = self.session.as_ref().and_then(|s| s.selection());
        serde_json::to_string(&selection).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = beginEdit)]
    pub fn begin_edit(&mut self, id: &str) {
        if let Some(session) = self.session.as_mut() {
            session.begin_edit(id);
        }
    }

    #[wasm_bindgen(js_name = endEdit)]
    pub fn end_edit(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.end_edit();
        }
    }

    #[wasm_bindgen(js_name = setTextContent)]
    pub fn set_text_content(&mut self, id: &str, content: String) {
        if let Some(session) = self.session.as_mut() {
            session.set_text_content(id, content);
        }
    }

    #[wasm_bindgen(js_name = setFontSize)]
    pub fn set_font_size(&mut self, id: &str, size: f64) {
        if let Some(el) = self.text_mut(id) {
            if size > 0.0 {
                el.font_size = size;
            }
        }
    }

    #[wasm_bindgen(js_name = setFontFamily)]
    pub fn set_font_family(&mut self, id: &str, family: String) {
        if let Some(el) = self.text_mut(id) {
            el.font_family = family;
        }
    }

    #[wasm_bindgen(js_name = setTextColor)]
    pub fn set_text_color(&mut self, id: &str, color: String) {
        if let Some(el) = self.text_mut(id) {
            el.color = color;
        }
    }

    #[wasm_bindgen(js_name = toggleBold)]
    pub fn toggle_bold(&mut self, id: &str) {
        use docmark_core::elements::FontWeight;
        if let Some(el) = self.text_mut(id) {
            el.font_weight = match el.font_weight {
                FontWeight::Normal => FontWeight::Bold,
                FontWeight::Bold => FontWeight::Normal,
            };
        }
    }

    #[wasm_bindgen(js_name = toggleItalic)]
    pub fn toggle_italic(&mut self, id: &str) {
        use docmark_core::elements::FontStyle;
        if let Some(el) = self.text_mut(id) {
            el.font_style = match el.font_style {
                FontStyle::Normal => FontStyle::Italic,
                FontStyle::Italic => FontStyle::Normal,
            };
        }
    }

    #[wasm_bindgen(js_name = setSignatureOpacity)]
    pub fn set_signature_opacity(&mut self, id: &str, opacity: f64) {
        if let Some(session) = self.session.as_mut() {
            if let Some(el) = session.signature_element_mut(id) {
                el.set_opacity(opacity);
            }
        }
    }

    #[wasm_bindgen(js_name = deleteSelected)]
    pub fn delete_selected(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.delete_selected();
        }
    }

    #[wasm_bindgen(js_name = deleteElement)]
    pub fn delete_element(&mut self, id: &str) {
        if let Some(session) = self.session.as_mut() {
            session.delete_element(id);
        }
    }

    /// Duplicate the selected element. Returns the new id, or null when
    /// nothing is selected.
    #[wasm_bindgen(js_name = duplicateSelected)]
    pub fn duplicate_selected(&mut self) -> Option<String> {
        let scale = self.current_scale();
        self.session.as_mut()?.duplicate_selected(scale)
    }

    // -- pointer gestures ---------------------------------------------------

    /// Begin dragging an element. Pointer positions are screen pixels
    /// relative to the page container.
    #[wasm_bindgen(js_name = beginDrag)]
    pub fn begin_drag(&mut self, id: &str, pointer_x: f64, pointer_y: f64) -> Result<(), JsValue> {
        let session = self.session_ref()?;
        let (origin, size) = if let Some(el) = session.text_element(id) {
            ((el.x, el.y), (0.0, el.font_size))
        } else if let Some(el) = session.signature_element(id) {
            ((el.x, el.y), (el.width, el.height))
        } else {
            return Err(JsValue::from_str(&format!("Unknown element: {}", id)));
        };
        self.gesture = Some(ActiveGesture::Drag {
            id: id.to_string(),
            gesture: DragGesture::new(origin, size, (pointer_x, pointer_y)),
        });
        Ok(())
    }

    /// Begin resizing a signature from one of the eight handles
    /// ("nw", "n", "ne", "e", "se", "s", "sw", "w")
    #[wasm_bindgen(js_name = beginResize)]
    pub fn begin_resize(
        &mut self,
        id: &str,
        handle: &str,
        pointer_x: f64,
        pointer_y: f64,
    ) -> Result<(), JsValue> {
        let handle = ResizeHandle::parse(handle)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown resize handle: {}", handle)))?;
        let session = self.session_ref()?;
        let el = session
            .signature_element(id)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown signature: {}", id)))?;
        self.gesture = Some(ActiveGesture::Resize {
            id: id.to_string(),
            gesture: ResizeGesture::new(
                handle,
                (el.x, el.y, el.width, el.height),
                (pointer_x, pointer_y),
            ),
        });
        Ok(())
    }

    /// Begin rotating a signature around its center
    #[wasm_bindgen(js_name = beginRotate)]
    pub fn begin_rotate(&mut self, id: &str, pointer_x: f64, pointer_y: f64) -> Result<(), JsValue> {
        let session = self.session_ref()?;
        let el = session
            .signature_element(id)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown signature: {}", id)))?;
        let transform = self
            .transforms
            .get(&el.page)
            .ok_or_else(|| JsValue::from_str("Page not rendered"))?;
        let (cx, cy) = transform.to_screen(el.x + el.width / 2.0, el.y + el.height / 2.0);
        self.gesture = Some(ActiveGesture::Rotate {
            id: id.to_string(),
            gesture: RotateGesture::new((cx, cy), (pointer_x, pointer_y), el.rotation),
        });
        Ok(())
    }

    /// Advance the active gesture to the current pointer position.
    /// `snap` applies the 15-degree rotation snap.
    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, pointer_x: f64, pointer_y: f64, snap: bool) {
        let Some(gesture) = self.gesture.as_ref() else {
            return;
        };
        let pointer = (pointer_x, pointer_y);
        match gesture {
            ActiveGesture::Drag { id, gesture } => {
                let id = id.clone();
                let Some(transform) = self.transform_for_element(&id) else {
                    return;
                };
                let (x, y) = gesture.position_at(pointer, &transform);
                if let Some(session) = self.session.as_mut() {
                    session.move_element(&id, x, y);
                }
            }
            ActiveGesture::Resize { id, gesture } => {
                let id = id.clone();
                let Some(transform) = self.transform_for_element(&id) else {
                    return;
                };
                let (x, y, w, h) = gesture.rect_at(pointer, &transform);
                if let Some(session) = self.session.as_mut() {
                    if let Some(el) = session.signature_element_mut(&id) {
                        el.x = x;
                        el.y = y;
                        el.width = w;
                        el.height = h;
                    }
                }
            }
            ActiveGesture::Rotate { id, gesture } => {
                let id = id.clone();
                let rotation = gesture.rotation_at(pointer, snap);
                if let Some(session) = self.session.as_mut() {
                    if let Some(el) = session.signature_element_mut(&id) {
                        el.set_rotation(rotation);
                    }
                }
            }
        }
    }

    #[wasm_bindgen(js_name = endGesture)]
    pub fn end_gesture(&mut self) {
        self.gesture = None;
    }

    // -- overlay ------------------------------------------------------------

    /// Re-sync an overlay node's position and styling from its element's
    /// stored PDF-point geometry
    #[wasm_bindgen(js_name = syncOverlayNode)]
    pub fn sync_overlay_node(&self, node: &Element, id: &str) -> Result<(), JsValue> {
        let overlay = self
            .overlay
            .as_ref()
            .ok_or_else(|| JsValue::from_str("No document object available"))?;
        let session = self.session_ref()?;

        if let Some(el) = session.text_element(id) {
            let transform = self
                .transforms
                .get(&el.page)
                .ok_or_else(|| JsValue::from_str("Page not rendered"))?;
            overlay.sync_text_node(node, el, transform)
        } else if let Some(el) = session.signature_element(id) {
            let transform = self
                .transforms
                .get(&el.page)
                .ok_or_else(|| JsValue::from_str("Page not rendered"))?;
            overlay.sync_signature_node(node, el, transform)
        } else {
            Err(JsValue::from_str(&format!("Unknown element: {}", id)))
        }
    }

    /// Create the overlay container for a page
    #[wasm_bindgen(js_name = createOverlay)]
    pub fn create_overlay(&self, page_num: u32) -> Result<Element, JsValue> {
        self.overlay
            .as_ref()
            .ok_or_else(|| JsValue::from_str("No document object available"))?
            .create_overlay(page_num)
    }

    /// All elements as JSON: `{ textElements: [...], signatures: [...] }`
    #[wasm_bindgen(js_name = elementsJson)]
    pub fn elements_json(&self) -> Result<String, JsValue> {
        let session = self.session_ref()?;
        let value = serde_json::json!({
            "textElements": session.text_elements,
            "signatures": session.signature_elements,
        });
        serde_json::to_string(&value).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    // -- forms --------------------------------------------------------------

    /// Start the periodic form widget scan for the loaded document
    #[wasm_bindgen(js_name = startFormScan)]
    pub fn start_form_scan(&mut self) -> Result<(), JsValue> {
        if self.scanner.is_none() {
            self.scanner = Some(FormScanner::start(self.forms.clone())?);
        }
        Ok(())
    }

    /// Stop scanning and tear down the interval
    #[wasm_bindgen(js_name = stopFormScan)]
    pub fn stop_form_scan(&mut self) {
        self.scanner = None;
    }

    #[wasm_bindgen(js_name = formFieldsJson)]
    pub fn form_fields_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.forms.borrow().fields())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = setFormValue)]
    pub fn set_form_value(&mut self, id: &str, value: String) {
        self.forms.borrow_mut().set_value(id, value);
    }

    // -- export -------------------------------------------------------------

    /// Export the annotated PDF. With `flatten` the filled form widgets are
    /// baked into the page content and removed.
    #[wasm_bindgen(js_name = exportPdf)]
    pub fn export_pdf(&self, flatten: bool) -> Result<Uint8Array, JsValue> {
        let session = self.session_ref()?;
        let forms = self.forms.borrow();
        let outcome = export_pdf(
            &session.bytes,
            &session.text_elements,
            &session.signature_elements,
            &forms,
            flatten,
        )
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

        if !outcome.skipped.is_empty() {
            self.notify(
                "warning",
                &format!(
                    "{} signature image(s) could not be embedded and were skipped",
                    outcome.skipped.len()
                ),
            );
        }
        Ok(Uint8Array::from(outcome.bytes.as_slice()))
    }

    /// Rasterize the current page (canvas plus overlays) to a PNG data URL
    #[wasm_bindgen(js_name = exportPng)]
    pub async fn export_png(&self, canvas_id: String) -> Result<String, JsValue> {
        let session = self.session_ref()?;
        let page = session.current_page;
        let transform = self
            .transforms
            .get(&page)
            .ok_or_else(|| JsValue::from_str("Page not rendered"))?;

        raster::export_page_png(
            &canvas_id,
            &session.text_elements_for_page(page),
            &session.signature_elements_for_page(page),
            transform,
        )
        .await
    }

    /// Export the project state as pretty-printed JSON
    #[wasm_bindgen(js_name = exportProjectJson)]
    pub fn export_project_json(&self) -> Result<String, JsValue> {
        let session = self.session_ref()?;
        export_project_json(
            &session.file_name,
            session.page_count,
            &session.text_elements,
            &session.signature_elements,
        )
        .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Export text elements as CSV
    #[wasm_bindgen(js_name = exportTextCsv)]
    pub fn export_text_csv(&self) -> Result<String, JsValue> {
        let session = self.session_ref()?;
        Ok(export_text_csv(&session.text_elements))
    }

    // -- signature library --------------------------------------------------

    /// Save a signature to the persisted library (oldest entry evicted past
    /// the bound). Returns the saved entry's id.
    #[wasm_bindgen(js_name = saveSignature)]
    pub fn save_signature(
        &mut self,
        name: String,
        image_data: String,
        width: f64,
        height: f64,
        color: String,
    ) -> String {
        let signature = SavedSignature::new(name, image_data, width, height, color);
        let id = signature.id.clone();
        storage::save_signature(&mut self.library, signature);
        id
    }

    #[wasm_bindgen(js_name = savedSignaturesJson)]
    pub fn saved_signatures_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.library.all()).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Place a saved signature onto the current page. Returns the new
    /// element's id.
    #[wasm_bindgen(js_name = reuseSavedSignature)]
    pub fn reuse_saved_signature(&mut self, id: &str) -> Result<String, JsValue> {
        let saved = self
            .library
            .get(id)
            .cloned()
            .ok_or_else(|| JsValue::from_str(&format!("Unknown saved signature: {}", id)))?;
        let session = self.session_mut()?;
        Ok(session.place_saved_signature(&saved))
    }

    #[wasm_bindgen(js_name = removeSavedSignature)]
    pub fn remove_saved_signature(&mut self, id: &str) {
        storage::remove_signature(&mut self.library, id);
    }

    // -- internals ----------------------------------------------------------

    fn notify(&self, level: &str, message: &str) {
        if let Some(notifier) = &self.notifier {
            let _ = notifier.call2(
                &JsValue::NULL,
                &JsValue::from_str(level),
                &JsValue::from_str(message),
            );
        }
    }

    fn session_ref(&self) -> Result<&PdfSession, JsValue> {
        self.session
            .as_ref()
            .ok_or_else(|| JsValue::from_str("No document loaded"))
    }

    fn session_mut(&mut self) -> Result<&mut PdfSession, JsValue> {
        self.session
            .as_mut()
            .ok_or_else(|| JsValue::from_str("No document loaded"))
    }

    fn text_mut(&mut self, id: &str) -> Option<&mut docmark_core::TextElement> {
        self.session.as_mut()?.text_element_mut(id)
    }

    fn current_scale(&self) -> f64 {
        self.session
            .as_ref()
            .and_then(|s| self.transforms.get(&s.current_page))
            .map(|t| t.scale())
            .unwrap_or(1.0)
    }

    fn screen_to_pdf(&self, screen_x: f64, screen_y: f64) -> Result<(f64, f64), JsValue> {
        let session = self.session_ref()?;
        let transform = self
            .transforms
            .get(&session.current_page)
            .ok_or_else(|| JsValue::from_str("Page not rendered"))?;
        Ok(transform.to_pdf(screen_x, screen_y))
    }

    fn transform_for_element(&self, id: &str) -> Option<PageTransform> {
        let session = self.session.as_ref()?;
        let page = session
            .text_element(id)
            .map(|e| e.page)
            .or_else(|| session.signature_element(id).map(|e| e.page))?;
        self.transforms.get(&page).copied()
    }
}
