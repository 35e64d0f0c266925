use std::io::{Read, Write};

use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::params::{Rectangle, SignatureFont, SignatureSpec};

const MAX_FRAME_SIZE: u32 = 256 * 1024 * 1024; // 256 MB

/// Output encryption requested from the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encryption {
    pub user_password: String,
    pub owner_password: String,
    pub permissions: Vec<String>,
    pub algorithm: String,
}

impl Encryption {
    /// Both passwords equal, printing only, 128-bit AES.
    pub fn print_only(password: &str) -> Self {
        Self {
            user_password: password.to_string(),
            owner_password: password.to_string(),
            permissions: vec!["print".to_string()],
            algorithm: "aes-128".to_string(),
        }
    }
}

/// Signer → engine messages. Followed by one frame carrying the source document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineRequest {
    Sign {
        /// Base64 DER PKCS#8 private key.
        private_key: String,
        /// Base64 DER certificates, signer first.
        certificate_chain: Vec<String>,
        reason: String,
        contact: String,
        location: String,
        rectangle: Rectangle,
        page: i32,
        font: SignatureFont,
        encryption: Option<Encryption>,
    },
}

impl EngineRequest {
    pub fn sign(spec: &SignatureSpec<'_>) -> Self {
        EngineRequest::Sign {
            private_key: STANDARD.encode(spec.key_material.private_key()),
            certificate_chain: spec
                .key_material
                .chain()
                .iter()
                .map(|cert| STANDARD.encode(cert))
                .collect(),
            reason: spec.reason.to_string(),
            contact: spec.contact.to_string(),
            location: spec.location.to_string(),
            rectangle: spec.rectangle,
            page: spec.page,
            font: spec.font.clone(),
            encryption: spec.password.map(Encryption::print_only),
        }
    }
}

/// Engine → signer messages. `Signed` is followed by one frame carrying the signed document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineReply {
    Signed,
    Failed { message: String },
}

/// Write a length-prefixed frame.
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_SIZE)
        .with_context(|| format!("frame too large: {} bytes", payload.len()))?;
    writer.write_all(&len.to_be_bytes()).context("writing length prefix")?;
    writer.write_all(payload).context("writing payload")?;
    writer.flush().context("flushing writer")?;
    Ok(())
}

/// Read a length-prefixed frame.
pub fn read_frame<R: Read + ?Sized>(reader: &mut R) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).context("reading length prefix")?;
    let len = u32::from_be_bytes(len_buf);

    if len > MAX_FRAME_SIZE {
        bail!("frame too large: {len} bytes (max {MAX_FRAME_SIZE})");
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).context("reading payload")?;
    Ok(payload)
}

/// Write a length-prefixed JSON message.
pub fn write_message<W: Write + ?Sized, T: Serialize>(writer: &mut W, msg: &T) -> Result<()> {
    let payload = serde_json::to_vec(msg).context("serializing message")?;
    write_frame(writer, &payload)
}

/// Read a length-prefixed JSON message.
pub fn read_message<R: Read + ?Sized, T: DeserializeOwned>(reader: &mut R) -> Result<T> {
    let payload = read_frame(reader)?;
    serde_json::from_slice(&payload).context("deserializing message")
}
