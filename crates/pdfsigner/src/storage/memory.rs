use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow};

use super::ObjectStore;

type Objects = HashMap<(String, String), (Vec<u8>, String)>;

/// Object store kept entirely in process memory.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<Objects>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bucket: &str, key: &str, bytes: Vec<u8>) {
        self.lock()
            .insert((bucket.to_string(), key.to_string()), (bytes, String::new()));
    }

    /// Returns the stored bytes and content type.
    pub fn object(&self, bucket: &str, key: &str) -> Option<(Vec<u8>, String)> {
        self.lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Objects> {
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ObjectStore for MemoryStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.object(bucket, key)
            .map(|(bytes, _)| bytes)
            .ok_or_else(|| anyhow!("NoSuchKey: {bucket}/{key}"))
    }

    fn put(&self, bytes: Vec<u8>, content_type: &str, bucket: &str, key: &str) -> Result<()> {
        self.lock().insert(
            (bucket.to_string(), key.to_string()),
            (bytes, content_type.to_string()),
        );
        Ok(())
    }
}
