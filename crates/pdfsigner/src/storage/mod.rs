//! Uniform access to documents on local disk and in object storage.
//!
//! Every address is classified once into a [`Location`]. Reads hand back a
//! [`Source`], writes a [`Sink`] that only becomes visible at its address
//! after [`Sink::commit`].

mod memory;
mod s3;

use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::SignerError;

pub use memory::MemoryStore;
pub use s3::{S3Settings, S3Store};

pub const REMOTE_PREFIX: &str = "s3://";
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Blocking object storage primitives.
///
/// Callers run off the async runtime, so implementations are free to block.
pub trait ObjectStore: Send + Sync {
    fn get(&self, bucket: &str, key: &str) -> anyhow::Result<Vec<u8>>;

    /// Stores `bytes` in a single request. Either the whole object lands or nothing does.
    fn put(&self, bytes: Vec<u8>, content_type: &str, bucket: &str, key: &str)
    -> anyhow::Result<()>;
}

/// Returns true when `address` names an object in the object store.
pub fn is_remote(address: &str) -> bool {
    address
        .get(..REMOTE_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(REMOTE_PREFIX))
}

/// Splits `s3://bucket/key/with/slashes` into `("bucket", "key/with/slashes")`.
pub fn decompose(address: &str) -> Result<(&str, &str), SignerError> {
    let invalid = |reason| SignerError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    if !is_remote(address) {
        return Err(invalid("missing s3:// prefix"));
    }
    let path = &address[REMOTE_PREFIX.len()..];
    let (bucket, key) = path.split_once('/').ok_or_else(|| invalid("missing key"))?;
    if bucket.is_empty() || key.is_empty() {
        return Err(invalid("empty bucket or key"));
    }
    Ok((bucket, key))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote { bucket: String, key: String },
}

impl Location {
    pub fn parse(address: &str) -> Result<Self, SignerError> {
        if is_remote(address) {
            let (bucket, key) = decompose(address)?;
            Ok(Location::Remote {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
        } else {
            Ok(Location::Local(PathBuf::from(address)))
        }
    }
}

/// Readable document, fully owned by the caller.
pub enum Source {
    Local(BufReader<File>),
    Remote(Cursor<Vec<u8>>),
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::Local(reader) => reader.read(buf),
            Source::Remote(cursor) => cursor.read(buf),
        }
    }
}

/// Writable destination. Dropping a sink without committing discards everything written.
pub enum Sink {
    Local {
        file: NamedTempFile,
        path: PathBuf,
    },
    Remote {
        buffer: Vec<u8>,
        bucket: String,
        key: String,
        store: Arc<dyn ObjectStore>,
    },
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Local { file, .. } => file.write(buf),
            Sink::Remote { buffer, .. } => buffer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Local { file, .. } => file.flush(),
            Sink::Remote { .. } => Ok(()),
        }
    }
}

impl Sink {
    /// Publishes the written bytes at the destination address.
    pub fn commit(self, address: &str) -> Result<(), SignerError> {
        match self {
            Sink::Local { mut file, path } => {
                file.flush()
                    .and_then(|_| keep_existing_permissions(&file, &path))
                    .and_then(|_| file.as_file().sync_all())
                    .map_err(|e| SignerError::commit_failed(address, e))?;
                file.persist(&path)
                    .map_err(|e| SignerError::commit_failed(address, e.error))?;
                debug!(path = %path.display(), "Committed local document");
                Ok(())
            }
            Sink::Remote {
                buffer,
                bucket,
                key,
                store,
            } => {
                let size = buffer.len();
                store
                    .put(buffer, PDF_CONTENT_TYPE, &bucket, &key)
                    .map_err(|e| SignerError::commit_failed(address, e))?;
                info!(bucket = %bucket, key = %key, size, "Uploaded signed document");
                Ok(())
            }
        }
    }

    /// Drops everything written so far. Cleanup errors are only logged.
    pub fn discard(self) {
        match self {
            Sink::Local { file, path } => {
                if let Err(e) = file.close() {
                    warn!(path = %path.display(), error = %e, "Failed to remove partial output");
                }
            }
            Sink::Remote { bucket, key, .. } => {
                debug!(bucket = %bucket, key = %key, "Discarded buffered output");
            }
        }
    }
}

/// Resolves addresses to readable sources and writable sinks.
#[derive(Clone, Default)]
pub struct StorageResolver {
    store: Option<Arc<dyn ObjectStore>>,
}

impl StorageResolver {
    pub fn new(store: Option<Arc<dyn ObjectStore>>) -> Self {
        Self { store }
    }

    pub fn local_only() -> Self {
        Self { store: None }
    }

    fn store(&self, address: &str) -> Result<&Arc<dyn ObjectStore>, SignerError> {
        self.store
            .as_ref()
            .ok_or_else(|| SignerError::StoreNotConfigured(address.to_string()))
    }

    /// Opens `address` for reading. Remote objects are buffered in memory.
    pub fn open(&self, address: &str) -> Result<Source, SignerError> {
        match Location::parse(address)? {
            Location::Local(path) => {
                let file =
                    File::open(&path).map_err(|e| SignerError::source_unavailable(address, e))?;
                Ok(Source::Local(BufReader::new(file)))
            }
            Location::Remote { bucket, key } => {
                let bytes = self
                    .store(address)?
                    .get(&bucket, &key)
                    .map_err(|e| SignerError::source_unavailable(address, e))?;
                debug!(bucket = %bucket, key = %key, size = bytes.len(), "Downloaded source document");
                Ok(Source::Remote(Cursor::new(bytes)))
            }
        }
    }

    /// Prepares a sink for `address`. Nothing is visible there until the sink is committed.
    pub fn create(&self, address: &str) -> Result<Sink, SignerError> {
        match Location::parse(address)? {
            Location::Local(path) => {
                let file =
                    output_file(&path).map_err(|e| SignerError::commit_failed(address, e))?;
                Ok(Sink::Local { file, path })
            }
            Location::Remote { bucket, key } => Ok(Sink::Remote {
                buffer: Vec::new(),
                bucket,
                key,
                store: self.store(address)?.clone(),
            }),
        }
    }
}

/// Temporary sibling of `path`, created with the mode a plain `File::create` would get.
fn output_file(path: &Path) -> io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(parent_dir(path))
}

/// An overwritten destination keeps its mode.
fn keep_existing_permissions(file: &NamedTempFile, path: &Path) -> io::Result<()> {
    match fs::metadata(path) {
        Ok(existing) => file.as_file().set_permissions(existing.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_prefix_is_case_insensitive() {
        assert!(is_remote("s3://bucket/key"));
        assert!(is_remote("S3://bucket/key"));
        assert!(is_remote("s3://"));
    }

    #[test]
    fn local_paths_are_not_remote() {
        assert!(!is_remote("/tmp/x.pdf"));
        assert!(!is_remote("relative/s3://x.pdf"));
        assert!(!is_remote(""));
        assert!(!is_remote("s3:"));
    }

    #[test]
    fn multibyte_prefix_is_not_remote() {
        assert!(!is_remote("ş3://bucket/key"));
    }

    #[test]
    fn decompose_splits_on_first_separator() {
        assert_eq!(decompose("s3://bucket/a/b.pdf").unwrap(), ("bucket", "a/b.pdf"));
        assert_eq!(decompose("S3://Bucket/x.pdf").unwrap(), ("Bucket", "x.pdf"));
    }

    #[test]
    fn decompose_without_key_fails() {
        assert!(matches!(
            decompose("s3://bucket"),
            Err(SignerError::InvalidAddress { .. })
        ));
        assert!(matches!(
            decompose("s3://bucket/"),
            Err(SignerError::InvalidAddress { .. })
        ));
        assert!(matches!(
            decompose("s3:///key.pdf"),
            Err(SignerError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn decompose_rejects_local_paths() {
        assert!(decompose("/tmp/x.pdf").is_err());
    }

    #[test]
    fn parse_classifies_addresses() {
        assert_eq!(
            Location::parse("/tmp/in.pdf").unwrap(),
            Location::Local(PathBuf::from("/tmp/in.pdf"))
        );
        assert_eq!(
            Location::parse("s3://docs/2024/in.pdf").unwrap(),
            Location::Remote {
                bucket: "docs".into(),
                key: "2024/in.pdf".into()
            }
        );
    }

    #[test]
    fn remote_address_without_store_is_rejected() {
        let resolver = StorageResolver::local_only();
        assert!(matches!(
            resolver.open("s3://bucket/in.pdf"),
            Err(SignerError::StoreNotConfigured(_))
        ));
        assert!(matches!(
            resolver.create("s3://bucket/out.pdf"),
            Err(SignerError::StoreNotConfigured(_))
        ));
    }

    #[test]
    fn local_sink_is_invisible_until_commit() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pdf");
        let address = out.to_str().unwrap();
        let resolver = StorageResolver::local_only();

        let mut sink = resolver.create(address).unwrap();
        sink.write_all(b"%PDF-1.7").unwrap();
        assert!(!out.exists());

        sink.commit(address).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"%PDF-1.7");
    }

    #[test]
    fn discarded_local_sink_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pdf");
        let resolver = StorageResolver::local_only();

        let mut sink = resolver.create(out.to_str().unwrap()).unwrap();
        sink.write_all(b"partial").unwrap();
        sink.discard();

        assert!(!out.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    fn mode(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[cfg(unix)]
    #[test]
    fn committed_output_has_regular_file_mode() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pdf");
        let plain = dir.path().join("plain.pdf");
        File::create(&plain).unwrap();
        let resolver = StorageResolver::local_only();

        let mut sink = resolver.create(out.to_str().unwrap()).unwrap();
        sink.write_all(b"%PDF").unwrap();
        sink.commit(out.to_str().unwrap()).unwrap();

        assert_eq!(mode(&out), mode(&plain));
    }

    #[cfg(unix)]
    #[test]
    fn overwritten_output_keeps_its_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pdf");
        fs::write(&out, b"old").unwrap();
        fs::set_permissions(&out, fs::Permissions::from_mode(0o640)).unwrap();
        let resolver = StorageResolver::local_only();

        let mut sink = resolver.create(out.to_str().unwrap()).unwrap();
        sink.write_all(b"new").unwrap();
        sink.commit(out.to_str().unwrap()).unwrap();

        assert_eq!(fs::read(&out).unwrap(), b"new");
        assert_eq!(mode(&out), 0o640);
    }

    #[test]
    fn remote_round_trip_through_memory_store() {
        let store = Arc::new(MemoryStore::new());
        store.insert("bucket", "in.pdf", b"source".to_vec());
        let resolver = StorageResolver::new(Some(store.clone()));

        let mut source = resolver.open("s3://bucket/in.pdf").unwrap();
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"source");

        let mut sink = resolver.create("s3://bucket/out.pdf").unwrap();
        sink.write_all(b"signed").unwrap();
        assert!(store.object("bucket", "out.pdf").is_none());
        sink.commit("s3://bucket/out.pdf").unwrap();

        let (stored, content_type) = store.object("bucket", "out.pdf").unwrap();
        assert_eq!(stored, b"signed");
        assert_eq!(content_type, PDF_CONTENT_TYPE);
    }

    #[test]
    fn missing_local_source_is_unavailable() {
        let resolver = StorageResolver::local_only();
        assert!(matches!(
            resolver.open("/definitely/not/here.pdf"),
            Err(SignerError::SourceUnavailable { .. })
        ));
    }
}
