//! PNG raster export: composites the rendered page canvas and all overlay
//! elements onto an off-screen canvas.

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

use docmark_core::{PageTransform, SignatureElement, TextElement};

/// Render the page canvas plus the page's elements to a PNG data URL.
///
/// A missing page canvas aborts the export; a signature image that fails to
/// load is logged and skipped so the rest of the page still exports.
pub async fn export_page_png(
    canvas_id: &str,
    text_elements: &[&TextElement],
    signature_elements: &[&SignatureElement],
    transform: &PageTransform,
) -> Result<String, JsValue> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("No document object available"))?;

    let page_canvas = document
        .get_element_by_id(canvas_id)
        .and_then(|el| el.dyn_into::<HtmlCanvasElement>().ok())
        .ok_or_else(|| JsValue::from_str(&format!("Page canvas '{}' not found", canvas_id)))?;

    let target = document
        .create_element("canvas")?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| JsValue::from_str("Failed to create export canvas"))?;
    target.set_width(page_canvas.width());
    target.set_height(page_canvas.height());

    let ctx = target
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("No 2d context on export canvas"))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| JsValue::from_str("No 2d context on export canvas"))?;

    // The backing store may be larger than CSS pixels (HiDPI); scale draw
    // coordinates to the canvas resolution.
    let pixel_ratio = page_canvas.width() as f64 / transform.display_width;

    ctx.draw_image_with_html_canvas_element(&page_canvas, 0.0, 0.0)?;

    for text in text_elements {
        draw_text(&ctx, text, transform, pixel_ratio)?;
    }
    for signature in signature_elements {
        if let Err(e) = draw_signature(&ctx, signature, transform, pixel_ratio).await {
            web_sys::console::warn_2(
                &JsValue::from_str(&format!("Skipping signature {} in PNG export", signature.id)),
                &e,
            );
        }
    }

    target.to_data_url_with_type("image/png")
}

fn draw_text(
    ctx: &CanvasRenderingContext2d,
    text: &TextElement,
    transform: &PageTransform,
    pixel_ratio: f64,
) -> Result<(), JsValue> {
    let (x, y) = transform.to_screen(text.x, text.y);
    let size = text.font_size * transform.scale() * pixel_ratio;

    let weight = text.font_weight.as_str();
    let style = text.font_style.as_str();
    ctx.set_font(&format!("{} {} {}px {}", style, weight, size, text.font_family));
    ctx.set_fill_style_str(&text.color);
    ctx.set_text_baseline("top");
    ctx.fill_text(&text.content, x * pixel_ratio, y * pixel_ratio)?;
    Ok(())
}

async fn draw_signature(
    ctx: &CanvasRenderingContext2d,
    signature: &SignatureElement,
    transform: &PageTransform,
    pixel_ratio: f64,
) -> Result<(), JsValue> {
    let image = load_image(&signature.image_data).await?;

    let (x, y) = transform.to_screen(signature.x, signature.y);
    let (w, h) = transform.to_screen(signature.width, signature.height);
    let (x, y, w, h) = (x * pixel_ratio, y * pixel_ratio, w * pixel_ratio, h * pixel_ratio);

    ctx.save();
    ctx.set_global_alpha(signature.opacity);
    // Rotate about the element center, matching the overlay CSS transform
    ctx.translate(x + w / 2.0, y + h / 2.0)?;
    ctx.rotate(signature.rotation.to_radians())?;
    ctx.draw_image_with_html_image_element_and_dw_and_dh(
        &image,
        -w / 2.0,
        -h / 2.0,
        w,
        h,
    )?;
    ctx.restore();
    Ok(())
}

/// Load an image from a data URL, resolving once it is decodable
async fn load_image(src: &str) -> Result<HtmlImageElement, JsValue> {
    let image = HtmlImageElement::new()?;
    let promise = js_sys::Promise::new(&mut |resolve, reject| {
        let onload = Closure::once(Box::new(move |_event: web_sys::Event| {
            let _ = resolve.call0(&JsValue::NULL);
        }) as Box<dyn FnOnce(_)>);
        let onerror = Closure::once(Box::new(move |_event: web_sys::Event| {
            let _ = reject.call1(&JsValue::NULL, &JsValue::from_str("Image failed to load"));
        }) as Box<dyn FnOnce(_)>);

        image.set_onload(Some(onload.as_ref().unchecked_ref()));
        image.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        onload.forget();
        onerror.forget();
    });
    image.set_src(src);
    JsFuture::from(promise).await?;
    Ok(image)
}
