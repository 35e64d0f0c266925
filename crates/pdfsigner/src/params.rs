use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::keystore::KeyMaterial;

/// Placement of the visible signature, in PDF user space units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Rectangle {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Builds a rectangle only when all four coordinates are present and finite.
    pub fn from_parts(
        x1: Option<f32>,
        y1: Option<f32>,
        x2: Option<f32>,
        y2: Option<f32>,
    ) -> Option<Self> {
        let rect = Self::new(x1?, y1?, x2?, y2?);
        [rect.x1, rect.y1, rect.x2, rect.y2]
            .iter()
            .all(|v| v.is_finite())
            .then_some(rect)
    }
}

/// Style of the text rendered inside the visible signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureFont {
    pub family: String,
    pub size: f32,
    pub bold: bool,
    /// RGB colour.
    pub color: [u8; 3],
}

impl Default for SignatureFont {
    fn default() -> Self {
        Self {
            family: "Helvetica".to_string(),
            size: 9.0,
            bold: true,
            color: [16, 181, 60],
        }
    }
}

/// Everything needed to sign one document. Built by [`crate::resolver::resolve`].
#[derive(Debug, Clone)]
pub struct SigningParameters {
    pub source: String,
    pub destination: String,
    /// Empty means the output is not encrypted.
    pub password: String,
    pub reason: String,
    pub contact: String,
    pub location: String,
    pub rectangle: Rectangle,
    pub page: i32,
    pub font: Arc<SignatureFont>,
    pub key_material: Arc<KeyMaterial>,
}

impl SigningParameters {
    /// The part of the parameters the signing engine cares about.
    pub fn signature(&self) -> SignatureSpec<'_> {
        SignatureSpec {
            password: (!self.password.is_empty()).then_some(self.password.as_str()),
            key_material: &self.key_material,
            reason: &self.reason,
            contact: &self.contact,
            location: &self.location,
            rectangle: self.rectangle,
            page: self.page,
            font: &self.font,
        }
    }
}

/// Borrowed view of a signature request handed to a [`crate::engine::PdfSigningEngine`].
#[derive(Debug, Clone, Copy)]
pub struct SignatureSpec<'a> {
    /// When set, the output is encrypted with this as both owner and user
    /// password, printing only, AES-128.
    pub password: Option<&'a str>,
    pub key_material: &'a KeyMaterial,
    pub reason: &'a str,
    pub contact: &'a str,
    pub location: &'a str,
    pub rectangle: Rectangle,
    pub page: i32,
    pub font: &'a SignatureFont,
}
