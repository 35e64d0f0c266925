//! Merges request overrides with the server's configured defaults.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SignerError;
use crate::keystore::KeyMaterial;
use crate::params::{Rectangle, SignatureFont, SigningParameters};

/// Optional visible-signature placement supplied with a request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub x1: Option<f32>,
    pub y1: Option<f32>,
    pub x2: Option<f32>,
    pub y2: Option<f32>,
}

impl Coordinates {
    pub fn rectangle(&self) -> Option<Rectangle> {
        Rectangle::from_parts(self.x1, self.y1, self.x2, self.y2)
    }
}

/// JSON body of `POST /sign`, also used for batch entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignRequest {
    pub input_file: String,
    pub output_file: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub page: Option<i32>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

impl SignRequest {
    pub fn new(input_file: impl Into<String>, output_file: impl Into<String>) -> Self {
        Self {
            input_file: input_file.into(),
            output_file: output_file.into(),
            ..Self::default()
        }
    }

    pub fn from_json(body: &[u8]) -> Result<Self, SignerError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// Server-wide values used when a request does not override them.
#[derive(Debug, Clone, Default)]
pub struct SignatureDefaults {
    pub reason: Option<String>,
    pub contact: Option<String>,
    pub location: Option<String>,
    pub rectangle: Option<Rectangle>,
    pub page: Option<i32>,
    pub font: Arc<SignatureFont>,
    pub key_material: Option<Arc<KeyMaterial>>,
}

fn pick(
    requested: Option<&str>,
    default: Option<&str>,
    name: &'static str,
) -> Result<String, SignerError> {
    requested
        .filter(|value| !value.trim().is_empty())
        .or(default)
        .map(str::to_string)
        .ok_or(SignerError::MissingConfiguration(name))
}

fn required_address(value: &str, name: &'static str) -> Result<String, SignerError> {
    if value.trim().is_empty() {
        return Err(SignerError::ParseFailed(format!("{name} is required")));
    }
    Ok(value.to_string())
}

/// Builds the parameters for one signing operation.
///
/// Text fields fall back to the default when missing or blank. Coordinates
/// are only honoured as a complete set, otherwise the default rectangle is
/// used as a whole. The page is taken as given.
pub fn resolve(
    request: &SignRequest,
    defaults: &SignatureDefaults,
) -> Result<SigningParameters, SignerError> {
    let rectangle = request
        .coordinates
        .as_ref()
        .and_then(Coordinates::rectangle)
        .or(defaults.rectangle)
        .ok_or(SignerError::MissingConfiguration("rectangle"))?;

    Ok(SigningParameters {
        source: required_address(&request.input_file, "input_file")?,
        destination: required_address(&request.output_file, "output_file")?,
        password: request.password.clone().unwrap_or_default(),
        reason: pick(request.reason.as_deref(), defaults.reason.as_deref(), "reason")?,
        contact: pick(request.contact.as_deref(), defaults.contact.as_deref(), "contact")?,
        location: pick(
            request.location.as_deref(),
            defaults.location.as_deref(),
            "location",
        )?,
        rectangle,
        page: request
            .page
            .or(defaults.page)
            .ok_or(SignerError::MissingConfiguration("page"))?,
        font: defaults.font.clone(),
        key_material: defaults
            .key_material
            .clone()
            .ok_or(SignerError::MissingConfiguration("key material"))?,
    })
}
