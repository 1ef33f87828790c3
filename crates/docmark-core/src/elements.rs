//! Overlay element records: placed text, placed signatures, and the
//! persisted signature library.
//!
//! Positions are always PDF points with a top-left origin so stored data is
//! independent of the current zoom.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of saved signatures kept in the library
pub const MAX_SAVED_SIGNATURES: usize = 10;

/// Default size for a newly placed signature (PDF points)
pub const DEFAULT_SIGNATURE_SIZE: (f64, f64) = (200.0, 80.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    Normal,
    Italic,
}

impl FontWeight {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontWeight::Normal => "normal",
            FontWeight::Bold => "bold",
        }
    }
}

impl FontStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontStyle::Normal => "normal",
            FontStyle::Italic => "italic",
        }
    }
}

/// A placed text annotation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    pub id: String,
    pub content: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub font_family: String,
    pub color: String,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub page: u32,
}

impl TextElement {
    /// Create a text element with default styling at the given position
    pub fn new(x: f64, y: f64, page: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: "Text".to_string(),
            x,
            y,
            font_size: 16.0,
            font_family: "Arial".to_string(),
            color: "#000000".to_string(),
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            page,
        }
    }

    /// Clone this element under a fresh id, offset by `delta` points
    pub fn duplicate(&self, delta: f64) -> Self {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4().to_string();
        copy.x += delta;
        copy.y += delta;
        copy
    }
}

/// A placed signature image annotation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureElement {
    pub id: String,
    /// Raster payload: base64 PNG, optionally with a data-URL prefix
    pub image_data: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Degrees, always normalized into [0, 360)
    pub rotation: f64,
    pub color: String,
    /// Always clamped into [0, 1]
    pub opacity: f64,
    pub page: u32,
    pub created_at: i64,
}

impl SignatureElement {
    pub fn new(image_data: String, x: f64, y: f64, page: u32) -> Self {
        let (width, height) = DEFAULT_SIGNATURE_SIZE;
        Self {
            id: Uuid::new_v4().to_string(),
            image_data,
            x,
            y,
            width,
            height,
            rotation: 0.0,
            color: "#000000".to_string(),
            opacity: 1.0,
            page,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    /// Create a signature element from a saved library entry at the default
    /// placement position (50, 50)
    pub fn from_saved(saved: &SavedSignature, page: u32) -> Self {
        let mut element = Self::new(saved.image_data.clone(), 50.0, 50.0, page);
        element.width = saved.width;
        element.height = saved.height;
        element.color = saved.color.clone();
        element
    }

    pub fn set_rotation(&mut self, degrees: f64) {
        self.rotation = degrees.rem_euclid(360.0);
    }

    pub fn set_opacity(&mut self, opacity: f64) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    /// Clone this element under a fresh id, offset by `delta` points
    pub fn duplicate(&self, delta: f64) -> Self {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4().to_string();
        copy.x += delta;
        copy.y += delta;
        copy.created_at = Utc::now().timestamp_millis();
        copy
    }
}

/// A reusable signature persisted in local storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSignature {
    pub id: String,
    pub name: String,
    pub image_data: String,
    pub width: f64,
    pub height: f64,
    pub color: String,
    pub created_at: i64,
}

impl SavedSignature {
    pub fn new(name: String, image_data: String, width: f64, height: f64, color: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            image_data,
            width,
            height,
            color,
            created_at: Utc::now().timestamp_millis(),
        }
    }
}

/// Bounded collection of saved signatures (FIFO eviction by insertion order)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignatureLibrary {
    signatures: Vec<SavedSignature>,
}

impl SignatureLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the stored JSON representation; malformed data yields an empty
    /// library rather than an error
    pub fn from_json(json: &str) -> Self {
        serde_json::from_str::<Vec<SavedSignature>>(json)
            .map(|signatures| Self { signatures })
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.signatures).unwrap_or_else(|_| "[]".to_string())
    }

    /// Insert a signature, evicting the oldest entry when the bound is hit
    pub fn save(&mut self, signature: SavedSignature) {
        self.signatures.push(signature);
        while self.signatures.len() > MAX_SAVED_SIGNATURES {
            self.signatures.remove(0);
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.signatures.retain(|s| s.id != id);
    }

    pub fn get(&self, id: &str) -> Option<&SavedSignature> {
        self.signatures.iter().find(|s| s.id == id)
    }

    pub fn all(&self) -> &[SavedSignature] {
        &self.signatures
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}
