use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::engine::PdfSigningEngine;
use crate::error::SignerError;
use crate::params::SigningParameters;
use crate::storage::StorageResolver;

/// Signs one document end to end: read the source, run the engine, commit the destination.
///
/// Blocking. Call it from a worker thread, never from an async task.
#[derive(Clone)]
pub struct SigningOrchestrator {
    storage: StorageResolver,
    engine: Arc<dyn PdfSigningEngine>,
}

impl SigningOrchestrator {
    pub fn new(storage: StorageResolver, engine: Arc<dyn PdfSigningEngine>) -> Self {
        Self { storage, engine }
    }

    pub fn sign_one(&self, params: &SigningParameters) -> Result<(), SignerError> {
        let started = Instant::now();
        debug!(
            source = %params.source,
            destination = %params.destination,
            engine = self.engine.name(),
            "Signing document"
        );

        let mut source = self.storage.open(&params.source)?;
        let mut sink = self.storage.create(&params.destination)?;

        if let Err(e) = self
            .engine
            .sign(&mut source, &mut sink, &params.signature())
        {
            warn!(
                source = %params.source,
                destination = %params.destination,
                error = %format!("{e:#}"),
                "Signing failed"
            );
            sink.discard();
            return Err(SignerError::SigningFailed(e.into()));
        }

        sink.commit(&params.destination)?;
        drop(source);

        info!(
            source = %params.source,
            destination = %params.destination,
            encrypted = !params.password.is_empty(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Signed document"
        );
        Ok(())
    }
}
