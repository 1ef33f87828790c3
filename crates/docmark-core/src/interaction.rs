//! Pointer gesture math for drag, resize, and rotate.
//!
//! Gestures capture the element's stored PDF-point geometry and the pointer's
//! screen position at gesture start. Every subsequent pointer position is
//! converted to a PDF-space delta through the page transform, so the same
//! gesture behaves identically at any zoom.

use crate::coords::PageTransform;

/// Minimum signature size after a resize (PDF points)
pub const MIN_WIDTH: f64 = 20.0;
pub const MIN_HEIGHT: f64 = 10.0;

/// Rotation snap increment when the modifier key is held (degrees)
pub const ROTATION_SNAP_DEG: f64 = 15.0;

/// An in-progress drag of an element
#[derive(Debug, Clone, Copy)]
pub struct DragGesture {
    pointer_start: (f64, f64),
    origin: (f64, f64),
    size: (f64, f64),
}

impl DragGesture {
    /// Begin a drag. `origin` and `size` are the element's PDF-point
    /// geometry; `pointer` is the screen-pixel pointer position.
    pub fn new(origin: (f64, f64), size: (f64, f64), pointer: (f64, f64)) -> Self {
        Self {
            pointer_start: pointer,
            origin,
            size,
        }
    }

    /// Element position for the current pointer, clamped to the page bounds
    pub fn position_at(&self, pointer: (f64, f64), transform: &PageTransform) -> (f64, f64) {
        let scale = transform.scale();
        let dx = (pointer.0 - self.pointer_start.0) / scale;
        let dy = (pointer.1 - self.pointer_start.1) / scale;

        let max_x = (transform.pdf_width - self.size.0).max(0.0);
        let max_y = (transform.pdf_height - self.size.1).max(0.0);
        (
            (self.origin.0 + dx).clamp(0.0, max_x),
            (self.origin.1 + dy).clamp(0.0, max_y),
        )
    }
}

/// One of the eight resize handles around a signature element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeHandle {
    NorthWest,
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
}

impl ResizeHandle {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "nw" => Some(ResizeHandle::NorthWest),
            "n" => Some(ResizeHandle::North),
            "ne" => Some(ResizeHandle::NorthEast),
            "e" => Some(ResizeHandle::East),
            "se" => Some(ResizeHandle::SouthEast),
            "s" => Some(ResizeHandle::South),
            "sw" => Some(ResizeHandle::SouthWest),
            "w" => Some(ResizeHandle::West),
            _ => None,
        }
    }

    pub fn is_corner(&self) -> bool {
        matches!(
            self,
            ResizeHandle::NorthWest
                | ResizeHandle::NorthEast
                | ResizeHandle::SouthEast
                | ResizeHandle::SouthWest
        )
    }

    fn anchors_right(&self) -> bool {
        matches!(
            self,
            ResizeHandle::West | ResizeHandle::NorthWest | ResizeHandle::SouthWest
        )
    }

    fn anchors_bottom(&self) -> bool {
        matches!(
            self,
            ResizeHandle::North | ResizeHandle::NorthWest | ResizeHandle::NorthEast
        )
    }
}

/// An in-progress resize of a signature element
#[derive(Debug, Clone, Copy)]
pub struct ResizeGesture {
    handle: ResizeHandle,
    pointer_start: (f64, f64),
    /// (x, y, width, height) in PDF points at gesture start
    origin: (f64, f64, f64, f64),
}

impl ResizeGesture {
    pub fn new(handle: ResizeHandle, origin: (f64, f64, f64, f64), pointer: (f64, f64)) -> Self {
        Self {
            handle,
            pointer_start: pointer,
            origin,
        }
    }

    /// Element rect for the current pointer position.
    ///
    /// Corner handles preserve the starting aspect ratio by deriving the
    /// non-dominant axis from the dominant one; edge handles resize a single
    /// axis. Sizes never drop below the minimum floor, and the edge opposite
    /// the handle stays anchored.
    pub fn rect_at(&self, pointer: (f64, f64), transform: &PageTransform) -> (f64, f64, f64, f64) {
        let scale = transform.scale();
        let dx = (pointer.0 - self.pointer_start.0) / scale;
        let dy = (pointer.1 - self.pointer_start.1) / scale;
        let (x0, y0, w0, h0) = self.origin;
        let aspect = if h0 > 0.0 { w0 / h0 } else { 1.0 };

        let (mut w, mut h) = (w0, h0);
        match self.handle {
            ResizeHandle::East => w = w0 + dx,
            ResizeHandle::West => w = w0 - dx,
            ResizeHandle::South => h = h0 + dy,
            ResizeHandle::North => h = h0 - dy,
            corner => {
                let wd = if corner.anchors_right() { w0 - dx } else { w0 + dx };
                let hd = if corner.anchors_bottom() { h0 - dy } else { h0 + dy };
                // Larger change wins; the other axis follows the aspect ratio
                if (wd - w0).abs() >= (hd - h0).abs() {
                    w = wd;
                    h = wd / aspect;
                } else {
                    h = hd;
                    w = hd * aspect;
                }
            }
        }

        w = w.max(MIN_WIDTH);
        h = h.max(MIN_HEIGHT);

        let x = if self.handle.anchors_right() { x0 + (w0 - w) } else { x0 };
        let y = if self.handle.anchors_bottom() { y0 + (h0 - h) } else { y0 };
        (x, y, w, h)
    }
}

/// An in-progress rotation of a signature element
#[derive(Debug, Clone, Copy)]
pub struct RotateGesture {
    /// Element center in screen pixels
    center: (f64, f64),
    /// Pointer angle at gesture start, degrees
    start_angle: f64,
    /// Element rotation at gesture start, degrees
    start_rotation: f64,
}

impl RotateGesture {
    pub fn new(center: (f64, f64), pointer: (f64, f64), start_rotation: f64) -> Self {
        Self {
            center,
            start_angle: pointer_angle(center, pointer),
            start_rotation,
        }
    }

    /// Rotation for the current pointer, normalized into [0, 360).
    /// With `snap` the result locks to 15-degree increments.
    pub fn rotation_at(&self, pointer: (f64, f64), snap: bool) -> f64 {
        let angle = pointer_angle(self.center, pointer);
        let mut rotation = self.start_rotation + (angle - self.start_angle);
        if snap {
            rotation = (rotation / ROTATION_SNAP_DEG).round() * ROTATION_SNAP_DEG;
        }
        rotation.rem_euclid(360.0)
    }
}

/// Angle of the pointer around a center, degrees, clockwise-positive in
/// screen space (y grows downward)
fn pointer_angle(center: (f64, f64), pointer: (f64, f64)) -> f64 {
    (pointer.1 - center.1).atan2(pointer.0 - center.0).to_degrees()
}
