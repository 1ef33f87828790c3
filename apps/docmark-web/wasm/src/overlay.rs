//! Overlay DOM management: positions annotation nodes over the rendered
//! page canvas from their stored PDF-point coordinates.

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement};

use docmark_core::{PageTransform, SignatureElement, TextElement};

/// Creates and positions overlay nodes for a page container
pub struct OverlayManager {
    document: Document,
}

impl OverlayManager {
    pub fn new() -> Result<Self, JsValue> {
        let window =
            web_sys::window().ok_or_else(|| JsValue::from_str("No window object available"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("No document object available"))?;
        Ok(Self { document })
    }

    /// Create the transparent overlay container for a page
    pub fn create_overlay(&self, page_num: u32) -> Result<Element, JsValue> {
        let overlay = self.document.create_element("div")?;
        overlay.set_class_name("overlay-container");
        overlay.set_id(&format!("overlay-page-{}", page_num));

        if let Some(html_element) = overlay.dyn_ref::<HtmlElement>() {
            let style = html_element.style();
            style.set_property("position", "absolute")?;
            style.set_property("top", "0")?;
            style.set_property("left", "0")?;
            style.set_property("width", "100%")?;
            style.set_property("height", "100%")?;
            style.set_property("pointer-events", "none")?;
        }

        Ok(overlay)
    }

    /// Position and style a text element's overlay node from its stored
    /// PDF point
    pub fn sync_text_node(
        &self,
        element: &Element,
        text: &TextElement,
        transform: &PageTransform,
    ) -> Result<(), JsValue> {
        let (left, top) = transform.to_screen(text.x, text.y);
        let html = element
            .dyn_ref::<HtmlElement>()
            .ok_or_else(|| JsValue::from_str("Overlay node is not an HtmlElement"))?;
        let style = html.style();
        style.set_property("position", "absolute")?;
        style.set_property("left", &format!("{}px", left))?;
        style.set_property("top", &format!("{}px", top))?;
        style.set_property(
            "font-size",
            &format!("{}px", text.font_size * transform.scale()),
        )?;
        style.set_property("font-family", &text.font_family)?;
        style.set_property("color", &text.color)?;
        style.set_property("font-weight", text.font_weight.as_str())?;
        style.set_property("font-style", text.font_style.as_str())?;
        style.set_property("pointer-events", "auto")?;
        Ok(())
    }

    /// Position, size, rotate, and fade a signature element's overlay node
    pub fn sync_signature_node(
        &self,
        element: &Element,
        signature: &SignatureElement,
        transform: &PageTransform,
    ) -> Result<(), JsValue> {
        let (left, top) = transform.to_screen(signature.x, signature.y);
        let (width, height) = transform.to_screen(signature.width, signature.height);
        let html = element
            .dyn_ref::<HtmlElement>()
            .ok_or_else(|| JsValue::from_str("Overlay node is not an HtmlElement"))?;
        let style = html.style();
        style.set_property("position", "absolute")?;
        style.set_property("left", &format!("{}px", left))?;
        style.set_property("top", &format!("{}px", top))?;
        style.set_property("width", &format!("{}px", width))?;
        style.set_property("height", &format!("{}px", height))?;
        style.set_property("transform", &format!("rotate({}deg)", signature.rotation))?;
        style.set_property("transform-origin", "center center")?;
        style.set_property("opacity", &format!("{}", signature.opacity))?;
        style.set_property("pointer-events", "auto")?;
        Ok(())
    }

    /// Find a page's overlay container, if it was created
    pub fn overlay_for_page(&self, page_num: u32) -> Option<Element> {
        self.document
            .get_element_by_id(&format!("overlay-page-{}", page_num))
    }
}
