//! pdf.js integration for rendering pages in the browser.
//!
//! The bridge functions return promises that resolve only when the pdf.js
//! render task has actually finished, so callers can measure the canvas and
//! attach overlays without racing the renderer.

use js_sys::{Reflect, Uint8Array};
use wasm_bindgen::prelude::*;
use web_sys::HtmlCanvasElement;

// External JavaScript functions from pdf-bridge.js
#[wasm_bindgen(module = "/www/js/pdf-bridge.js")]
extern "C" {
    #[wasm_bindgen(js_name = initPdfJs)]
    pub async fn init_pdf_js_internal(worker_src: &str) -> JsValue;

    #[wasm_bindgen(js_name = loadDocument)]
    pub async fn load_document_internal(data: Uint8Array) -> JsValue;

    /// Resolves with `{ width, height }` after the render task completes
    #[wasm_bindgen(js_name = renderPage)]
    pub async fn render_page_internal(
        page_num: u32,
        canvas: &HtmlCanvasElement,
        scale: f64,
    ) -> JsValue;

    #[wasm_bindgen(js_name = getPageDimensions)]
    pub async fn get_page_dimensions_internal(page_num: u32) -> JsValue;
}

/// Rendered page size in CSS pixels, reported by the completed render task
#[derive(Debug, Clone, Copy)]
pub struct RenderedSize {
    pub width: f64,
    pub height: f64,
}

/// Wraps pdf.js interaction for the viewer pane
pub struct PdfViewer {
    document_proxy: Option<JsValue>,
    page_count: u32,
}

impl PdfViewer {
    pub fn new() -> Self {
        Self {
            document_proxy: None,
            page_count: 0,
        }
    }

    /// Load a PDF document from bytes
    pub async fn load(&mut self, bytes: &[u8]) -> Result<u32, JsValue> {
        let uint8_array = Uint8Array::new_with_length(bytes.len() as u32);
        uint8_array.copy_from(bytes);

        let doc_result = load_document_internal(uint8_array).await;
        if doc_result.is_undefined() || doc_result.is_null() {
            return Err(JsValue::from_str("Failed to load PDF document"));
        }

        if let Ok(num_pages) = Reflect::get(&doc_result, &JsValue::from_str("numPages")) {
            if let Some(count) = num_pages.as_f64() {
                self.page_count = count as u32;
            }
        }

        self.document_proxy = Some(doc_result);
        Ok(self.page_count)
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn is_loaded(&self) -> bool {
        self.document_proxy.is_some() && self.page_count > 0
    }

    /// Render a page and wait for the render task to finish.
    ///
    /// Returns the rendered canvas size so the caller can recompute the
    /// page's coordinate transform from real numbers, not assumptions.
    pub async fn render_page(
        &self,
        page_num: u32,
        canvas: &HtmlCanvasElement,
        scale: f64,
    ) -> Result<RenderedSize, JsValue> {
        if self.document_proxy.is_none() {
            return Err(JsValue::from_str("No document loaded"));
        }
        if page_num < 1 || page_num > self.page_count {
            return Err(JsValue::from_str(&format!(
                "Invalid page number: {} (document has {} pages)",
                page_num, self.page_count
            )));
        }

        let result = render_page_internal(page_num, canvas, scale).await;
        let width = Reflect::get(&result, &JsValue::from_str("width"))
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or_else(|| canvas.width() as f64);
        let height = Reflect::get(&result, &JsValue::from_str("height"))
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or_else(|| canvas.height() as f64);

        Ok(RenderedSize { width, height })
    }
}

impl Default for PdfViewer {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize pdf.js with the default CDN worker. Must be called before
/// loading documents.
pub async fn init_pdf_js() -> Result<(), JsValue> {
    init_pdf_js_internal(
        "https://cdn.jsdelivr.net/npm/pdfjs-dist@3.11.174/build/pdf.worker.min.js",
    )
    .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_initial_state() {
        let viewer = PdfViewer::new();
        assert_eq!(viewer.page_count(), 0);
        assert!(!viewer.is_loaded());
    }
}
