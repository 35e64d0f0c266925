//! Sequential signing of many documents from a list file or a directory.

use std::fs;
use std::path::Path;

use tracing::{debug, error, info};

use crate::error::SignerError;
use crate::orchestrator::SigningOrchestrator;
use crate::resolver::{SignRequest, SignatureDefaults, resolve};

const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub source: String,
    pub destination: String,
    pub password: String,
}

impl BatchEntry {
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            password: password.into(),
        }
    }

    fn request(&self) -> SignRequest {
        SignRequest {
            password: Some(self.password.clone()),
            ..SignRequest::new(&self.source, &self.destination)
        }
    }
}

/// Parses `input|output|password` lines. The password is optional; any other shape is skipped.
pub fn parse_list(contents: &str) -> Vec<BatchEntry> {
    contents
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.trim().split('|').collect();
            match parts.as_slice() {
                [source, destination, password] => {
                    Some(BatchEntry::new(*source, *destination, *password))
                }
                [source, destination] => Some(BatchEntry::new(*source, *destination, "")),
                _ => {
                    if !line.trim().is_empty() {
                        debug!(line, "Skipping malformed list entry");
                    }
                    None
                }
            }
        })
        .collect()
}

pub fn list_from_file(path: &Path) -> Result<Vec<BatchEntry>, SignerError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| SignerError::source_unavailable(&path.display().to_string(), e))?;
    Ok(parse_list(&contents))
}

/// Splits `PASSWORD_name.pdf` on the first underscore. Names without one carry no password.
pub fn split_password(file_name: &str) -> (&str, &str) {
    match file_name.split_once('_') {
        Some((password, name)) => (name, password),
        None => (file_name, ""),
    }
}

/// Lists every `*.pdf` file directly inside `source_dir`, sorted by name.
pub fn list_from_directory(
    source_dir: &Path,
    target_dir: &Path,
) -> Result<Vec<BatchEntry>, SignerError> {
    if source_dir == target_dir {
        return Err(SignerError::SameDirectory(source_dir.to_path_buf()));
    }

    let unavailable =
        |e: std::io::Error| SignerError::source_unavailable(&source_dir.display().to_string(), e);
    let mut entries = Vec::new();
    for dir_entry in fs::read_dir(source_dir).map_err(unavailable)? {
        let dir_entry = dir_entry.map_err(unavailable)?;
        let path = dir_entry.path();
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !path.is_file() || !file_name.to_lowercase().ends_with(".pdf") {
            continue;
        }

        let (target_name, password) = split_password(file_name);
        entries.push(BatchEntry::new(
            path.display().to_string(),
            target_dir.join(target_name).display().to_string(),
            password,
        ));
    }
    entries.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(entries)
}

/// What to do when one entry fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    Halt,
    Continue,
}

#[derive(Debug, thiserror::Error)]
#[error("entry {index} ({source_address} -> {destination}) failed: {error}")]
pub struct EntryFailure {
    /// 1-based position in the batch.
    pub index: usize,
    pub source_address: String,
    pub destination: String,
    #[source]
    pub error: SignerError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub signed: usize,
    pub failures: Vec<EntryFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct BatchRunner<'a> {
    orchestrator: &'a SigningOrchestrator,
    defaults: &'a SignatureDefaults,
    policy: FailurePolicy,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        orchestrator: &'a SigningOrchestrator,
        defaults: &'a SignatureDefaults,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            orchestrator,
            defaults,
            policy,
        }
    }

    /// Signs `entries` in order.
    ///
    /// Under [`FailurePolicy::Halt`] the first failure stops the run and is
    /// returned as the error. Under [`FailurePolicy::Continue`] every failure
    /// is collected in the report.
    pub fn run(&self, entries: &[BatchEntry]) -> Result<BatchReport, EntryFailure> {
        info!(count = entries.len(), "Signing files");
        let mut report = BatchReport::default();

        for (position, entry) in entries.iter().enumerate() {
            let outcome = resolve(&entry.request(), self.defaults)
                .and_then(|params| self.orchestrator.sign_one(&params));

            if let Err(error) = outcome {
                let failure = EntryFailure {
                    index: position + 1,
                    source_address: entry.source.clone(),
                    destination: entry.destination.clone(),
                    error,
                };
                error!(error = %failure, "Batch entry failed");
                match self.policy {
                    FailurePolicy::Halt => return Err(failure),
                    FailurePolicy::Continue => report.failures.push(failure),
                }
            } else {
                report.signed += 1;
            }

            if (position + 1) % PROGRESS_EVERY == 0 {
                info!(done = position + 1, total = entries.len(), "Batch progress");
            }
        }

        info!(
            signed = report.signed,
            failed = report.failures.len(),
            "Done"
        );
        Ok(report)
    }
}
