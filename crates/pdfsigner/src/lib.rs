pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod keystore;
pub mod orchestrator;
pub mod params;
pub mod resolver;
pub mod server;
pub mod storage;
pub mod telemetry;

pub use batch::{BatchEntry, BatchReport, BatchRunner, FailurePolicy};
pub use config::Config;
pub use engine::{PdfSigningEngine, ProcessEngine};
pub use error::SignerError;
pub use keystore::KeyMaterial;
pub use orchestrator::SigningOrchestrator;
pub use params::{Rectangle, SignatureFont, SignatureSpec, SigningParameters};
pub use resolver::{SignRequest, SignatureDefaults, resolve};
pub use server::{AppState, router, run};
pub use storage::{MemoryStore, ObjectStore, S3Store, StorageResolver};
pub use telemetry::init_tracing;
