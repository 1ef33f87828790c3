//! Coordinate transformation between on-screen pixels and PDF points
//!
//! Element positions are stored in PDF point space (origin top-left, matching
//! the rendered page) so zoom changes never rewrite stored data. The vertical
//! flip to the writer's bottom-left origin happens only at export time.

use serde::{Deserialize, Serialize};

/// Per-page mapping between PDF points and rendered pixels.
///
/// The display scale is `(measured_width / pdf_width) * zoom` and is valid
/// only as of the last `recompute` call; callers must recompute after every
/// page render or zoom change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageTransform {
    pub pdf_width: f64,
    pub pdf_height: f64,
    pub display_width: f64,
    pub display_height: f64,
    pub zoom: f64,
    scale: f64,
}

impl PageTransform {
    /// Create a transform for a page at 1:1 scale (not yet measured)
    pub fn new(pdf_width: f64, pdf_height: f64) -> Self {
        Self {
            pdf_width,
            pdf_height,
            display_width: pdf_width,
            display_height: pdf_height,
            zoom: 1.0,
            scale: 1.0,
        }
    }

    /// Recompute the display scale after layout or zoom changes.
    ///
    /// A degenerate `pdf_width` (zero or negative) keeps the previous scale
    /// rather than dividing by zero.
    pub fn recompute(
        &mut self,
        pdf_width: f64,
        pdf_height: f64,
        display_width: f64,
        display_height: f64,
        zoom: f64,
    ) {
        self.display_width = display_width;
        self.display_height = display_height;
        self.zoom = zoom;
        if pdf_width > 0.0 {
            self.pdf_width = pdf_width;
            self.pdf_height = pdf_height;
            self.scale = (display_width / pdf_width) * zoom;
        }
    }

    /// The composed display scale (responsive fit x user zoom)
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Convert screen pixels (relative to the page container) to PDF points
    pub fn to_pdf(&self, screen_x: f64, screen_y: f64) -> (f64, f64) {
        (screen_x / self.scale, screen_y / self.scale)
    }

    /// Convert PDF points to screen pixels
    pub fn to_screen(&self, pdf_x: f64, pdf_y: f64) -> (f64, f64) {
        (pdf_x * self.scale, pdf_y * self.scale)
    }
}

/// Flip a top-left-origin y (plus the element's height below it) into the
/// writer's bottom-left space for a page media box `[x, y, w, h]`
pub fn flip_to_writer(media_box: [f64; 4], y: f64, height: f64) -> f64 {
    media_box[1] + media_box[3] - (y + height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_to_writer_roundtrips() {
        let mb = [0.0, 0.0, 612.0, 792.0];
        let writer_y = flip_to_writer(mb, 50.0, 16.0);
        assert_eq!(writer_y, 726.0);
        // Applying the flip to the writer-space top recovers the stored y
        assert_eq!(flip_to_writer(mb, writer_y, 16.0), 50.0);
    }

    #[test]
    fn test_flip_respects_media_box_origin() {
        let mb = [10.0, 20.0, 600.0, 780.0];
        assert_eq!(flip_to_writer(mb, 0.0, 0.0), 800.0);
    }

    #[test]
    fn test_identity_scale() {
        let t = PageTransform::new(612.0, 792.0);
        assert_eq!(t.to_pdf(306.0, 396.0), (306.0, 396.0));
        assert_eq!(t.to_screen(50.0, 50.0), (50.0, 50.0));
    }

    #[test]
    fn test_responsive_fit_scale() {
        let mut t = PageTransform::new(612.0, 792.0);
        // Page rendered at half width
        t.recompute(612.0, 792.0, 306.0, 396.0, 1.0);
        assert!((t.scale() - 0.5).abs() < 1e-9);
        let (x, y) = t.to_pdf(153.0, 198.0);
        assert!((x - 306.0).abs() < 1e-9);
        assert!((y - 396.0).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_composes_with_fit() {
        let mut t = PageTransform::new(612.0, 792.0);
        t.recompute(612.0, 792.0, 612.0, 792.0, 1.5);
        assert!((t.scale() - 1.5).abs() < 1e-9);
        assert_eq!(t.to_screen(100.0, 200.0), (150.0, 300.0));
    }

    #[test]
    fn test_degenerate_width_keeps_previous_scale() {
        let mut t = PageTransform::new(612.0, 792.0);
        t.recompute(612.0, 792.0, 1224.0, 1584.0, 1.0);
        let before = t.scale();
        t.recompute(0.0, 0.0, 500.0, 500.0, 2.0);
        assert_eq!(t.scale(), before);
    }

    #[test]
    fn test_stored_position_survives_zoom_change() {
        // Re-rendering at a different zoom must move the on-screen position,
        // not the stored PDF point.
        let mut t = PageTransform::new(612.0, 792.0);
        t.recompute(612.0, 792.0, 612.0, 792.0, 1.0);
        let (pdf_x, pdf_y) = t.to_pdf(100.0, 100.0);

        t.recompute(612.0, 792.0, 612.0, 792.0, 2.0);
        let (sx, sy) = t.to_screen(pdf_x, pdf_y);
        assert!((sx - 200.0).abs() < 1e-9);
        assert!((sy - 200.0).abs() < 1e-9);
    }
}
