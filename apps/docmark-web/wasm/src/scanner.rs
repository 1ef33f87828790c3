//! Periodic DOM scanning for form widgets rendered over the PDF.
//!
//! pdf.js's annotation layer materializes form widgets as plain HTML inputs
//! at unpredictable times, so the scanner polls the page containers and
//! merges whatever it finds into the shared tracker. The scanner owns its
//! interval and closure; dropping it (or calling `stop`) tears both down.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement};

use docmark_core::{FormField, FormFieldType, FormTracker};

/// How often the DOM is re-scanned for form widgets
const SCAN_INTERVAL_MS: i32 = 1000;

/// Owns the polling interval that feeds the form tracker
pub struct FormScanner {
    interval_id: i32,
    // Kept alive for the lifetime of the interval
    _callback: Closure<dyn FnMut()>,
}

impl FormScanner {
    /// Start scanning `.page-container[data-page]` elements, merging results
    /// into the shared tracker on every tick
    pub fn start(tracker: Rc<RefCell<FormTracker>>) -> Result<Self, JsValue> {
        let callback = Closure::wrap(Box::new(move || {
            if let Ok(fields) = scan_form_fields() {
                tracker.borrow_mut().sync(fields);
            }
        }) as Box<dyn FnMut()>);

        let window =
            web_sys::window().ok_or_else(|| JsValue::from_str("No window object available"))?;
        let interval_id = window.set_interval_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            SCAN_INTERVAL_MS,
        )?;

        Ok(Self {
            interval_id,
            _callback: callback,
        })
    }

    /// Stop scanning. Equivalent to dropping the scanner.
    pub fn stop(self) {}
}

impl Drop for FormScanner {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            window.clear_interval_with_handle(self.interval_id);
        }
    }
}

/// Scan every rendered page container for form widgets
pub fn scan_form_fields() -> Result<Vec<FormField>, JsValue> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("No document object available"))?;

    let mut fields = Vec::new();
    let containers = document.query_selector_all(".page-container[data-page]")?;
    for i in 0..containers.length() {
        let Some(container) = containers.get(i).and_then(|n| n.dyn_into::<Element>().ok())
        else {
            continue;
        };
        let page = container
            .get_attribute("data-page")
            .and_then(|p| p.parse::<u32>().ok())
            .unwrap_or(1);
        scan_container(&container, page, &mut fields)?;
    }
    Ok(fields)
}

fn scan_container(
    container: &Element,
    page: u32,
    fields: &mut Vec<FormField>,
) -> Result<(), JsValue> {
    let container_rect = container.get_bounding_client_rect();
    let widgets = container.query_selector_all("input, textarea, select")?;

    for i in 0..widgets.length() {
        let Some(el) = widgets.get(i).and_then(|n| n.dyn_into::<Element>().ok()) else {
            continue;
        };

        let tag = el.tag_name();
        let input_type = el.get_attribute("type");
        let field_type = FormFieldType::from_dom(&tag, input_type.as_deref());

        let name = el
            .get_attribute("name")
            .or_else(|| el.get_attribute("data-field-name"))
            .unwrap_or_default();
        let id = if el.id().is_empty() {
            format!("page{}-{}-{}", page, name, i)
        } else {
            el.id()
        };

        let rect = el.get_bounding_client_rect();
        let value = widget_value(&el, field_type);
        let options = if field_type == FormFieldType::Select {
            select_options(&el)?
        } else {
            Vec::new()
        };

        fields.push(FormField {
            id,
            name,
            field_type,
            value,
            x: rect.left() - container_rect.left(),
            y: rect.top() - container_rect.top(),
            width: rect.width(),
            height: rect.height(),
            page,
            options,
        });
    }
    Ok(())
}

/// Read a widget's current value; checkboxes and radios report their
/// checked state as "Yes"/""
fn widget_value(el: &Element, field_type: FormFieldType) -> String {
    match field_type {
        FormFieldType::Checkbox | FormFieldType::Radio => el
            .dyn_ref::<HtmlInputElement>()
            .map(|input| if input.checked() { "Yes".to_string() } else { String::new() })
            .unwrap_or_default(),
        FormFieldType::Textarea => el
            .dyn_ref::<HtmlTextAreaElement>()
            .map(|t| t.value())
            .unwrap_or_default(),
        FormFieldType::Select => el
            .dyn_ref::<HtmlSelectElement>()
            .map(|s| s.value())
            .unwrap_or_default(),
        _ => el
            .dyn_ref::<HtmlInputElement>()
            .map(|input| input.value())
            .unwrap_or_default(),
    }
}

fn select_options(el: &Element) -> Result<Vec<String>, JsValue> {
    let mut options = Vec::new();
    let nodes = el.query_selector_all("option")?;
    for i in 0..nodes.length() {
        if let Some(option) = nodes.get(i).and_then(|n| n.dyn_into::<Element>().ok()) {
            options.push(option.text_content().unwrap_or_default());
        }
    }
    Ok(options)
}
