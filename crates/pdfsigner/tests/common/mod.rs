#![allow(dead_code)]

use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use pdf_signer::{
    KeyMaterial, ObjectStore, PdfSigningEngine, Rectangle, SignatureDefaults, SignatureFont,
    SignatureSpec, SigningOrchestrator, StorageResolver,
};

/// Input containing this marker makes [`StampEngine`] fail after a partial write.
pub const CORRUPT: &[u8] = b"%CORRUPT";

/// Engine that prefixes the input with a line describing the signature.
#[derive(Default)]
pub struct StampEngine {
    pub inputs: Mutex<Vec<Vec<u8>>>,
}

impl StampEngine {
    pub fn calls(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }
}

pub fn stamp(spec: &SignatureSpec<'_>) -> String {
    let Rectangle { x1, y1, x2, y2 } = spec.rectangle;
    format!(
        "signed reason={} contact={} location={} page={} rect={x1},{y1},{x2},{y2} password={}\n",
        spec.reason,
        spec.contact,
        spec.location,
        spec.page,
        spec.password.unwrap_or("-"),
    )
}

impl PdfSigningEngine for StampEngine {
    fn sign(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        spec: &SignatureSpec<'_>,
    ) -> Result<()> {
        let mut document = Vec::new();
        input.read_to_end(&mut document)?;
        self.inputs.lock().unwrap().push(document.clone());

        if document.starts_with(CORRUPT) {
            output.write_all(b"%PDF-partial")?;
            bail!("unable to parse document");
        }

        output.write_all(stamp(spec).as_bytes())?;
        output.write_all(&document)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "stamp"
    }
}

/// Store whose uploads always fail.
pub struct RejectingStore {
    pub inner: pdf_signer::MemoryStore,
}

impl ObjectStore for RejectingStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.inner.get(bucket, key)
    }

    fn put(&self, _bytes: Vec<u8>, _content_type: &str, bucket: &str, key: &str) -> Result<()> {
        bail!("AccessDenied: {bucket}/{key}")
    }
}

pub fn key_material() -> Arc<KeyMaterial> {
    Arc::new(KeyMaterial::new(b"private-key".to_vec(), vec![b"certificate".to_vec()]).unwrap())
}

pub fn defaults() -> SignatureDefaults {
    SignatureDefaults {
        reason: Some("Contract Note".into()),
        contact: Some("support@example.com".into()),
        location: Some("Bangalore".into()),
        rectangle: Some(Rectangle::new(10.0, 20.0, 30.0, 40.0)),
        page: Some(1),
        font: Arc::new(SignatureFont::default()),
        key_material: Some(key_material()),
    }
}

pub fn orchestrator(
    store: Option<Arc<dyn ObjectStore>>,
    engine: Arc<StampEngine>,
) -> SigningOrchestrator {
    SigningOrchestrator::new(StorageResolver::new(store), engine)
}
