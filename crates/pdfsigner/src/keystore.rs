use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use p12_keystore::KeyStore;
use tracing::{debug, info, warn};
use x509_parser::prelude::parse_x509_certificate;

/// Private key and certificate chain used for every signature.
///
/// Loaded once at startup and shared read-only between signing operations.
#[derive(Clone)]
pub struct KeyMaterial {
    /// DER-encoded PKCS#8 private key.
    private_key: Vec<u8>,
    /// DER-encoded certificates, signer first.
    chain: Vec<Vec<u8>>,
}

impl KeyMaterial {
    pub fn new(private_key: Vec<u8>, chain: Vec<Vec<u8>>) -> Result<Self> {
        ensure!(!private_key.is_empty(), "keystore contains no private key");
        ensure!(!chain.is_empty(), "keystore contains no certificate");
        Ok(Self { private_key, chain })
    }

    /// Reads the first private key entry of a PKCS#12 container.
    ///
    /// The chain starts with the certificate bound to the key and follows
    /// issuer links from there. Certificates outside that path are ignored.
    pub fn from_pkcs12(der: &[u8], password: &str) -> Result<Self> {
        let keystore = KeyStore::from_pkcs12(der, password)
            .context("keystore password is incorrect or keystore is corrupted")?;
        let (alias, entry) = keystore
            .private_key_chain()
            .context("keystore contains no private key with a certificate")?;

        let chain = entry
            .chain()
            .iter()
            .map(|cert| cert.as_der().to_vec())
            .collect();
        let material = Self::new(entry.key().to_vec(), chain)?;
        debug!(alias, chain = material.chain.len(), "Read keystore entry");
        Ok(material)
    }

    pub fn load(path: &Path, password: &str) -> Result<Self> {
        let der = std::fs::read(path)
            .with_context(|| format!("reading keystore {}", path.display()))?;
        let material = Self::from_pkcs12(&der, password)
            .with_context(|| format!("loading keystore {}", path.display()))?;

        match material.describe_signer() {
            Some((subject, not_after)) => info!(
                subject = %subject,
                not_after = %not_after,
                chain = material.chain.len(),
                "Loaded signing key"
            ),
            None => warn!(
                chain = material.chain.len(),
                "Loaded signing key, but the signer certificate could not be parsed"
            ),
        }
        Ok(material)
    }

    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    pub fn chain(&self) -> &[Vec<u8>] {
        &self.chain
    }

    /// Subject and expiry of the signer certificate.
    pub fn describe_signer(&self) -> Option<(String, String)> {
        let (_, cert) = parse_x509_certificate(self.chain.first()?).ok()?;
        Some((
            cert.subject().to_string(),
            cert.validity().not_after.to_string(),
        ))
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("private_key", &"[REDACTED]")
            .field("chain", &format!("{} certificates", self.chain.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYSTORE: &[u8] = include_bytes!("../tests/fixtures/signer.p12");
    const LEGACY_KEYSTORE: &[u8] = include_bytes!("../tests/fixtures/signer-legacy.p12");

    fn subject(der: &[u8]) -> String {
        let (_, cert) = parse_x509_certificate(der).unwrap();
        cert.subject().to_string()
    }

    #[test]
    fn loads_aes_keystore_with_sha256_mac() {
        let material = KeyMaterial::from_pkcs12(KEYSTORE, "test123").unwrap();

        assert!(!material.private_key().is_empty());
        let (subject, _) = material.describe_signer().unwrap();
        assert_eq!(subject, "CN=Test Signer");
    }

    #[test]
    fn loads_legacy_keystore() {
        let material = KeyMaterial::from_pkcs12(LEGACY_KEYSTORE, "test123").unwrap();

        assert_eq!(material.describe_signer().unwrap().0, "CN=Test Signer");
        assert_eq!(material.chain().len(), 2);
    }

    #[test]
    fn chain_is_signer_first_and_skips_unrelated_certificates() {
        // The container also carries "CN=Unrelated CA".
        let material = KeyMaterial::from_pkcs12(KEYSTORE, "test123").unwrap();

        let subjects: Vec<String> = material.chain().iter().map(|c| subject(c)).collect();
        assert_eq!(subjects, vec!["CN=Test Signer", "CN=Test Signing CA"]);
    }

    #[test]
    fn private_key_is_pkcs8() {
        let material = KeyMaterial::from_pkcs12(KEYSTORE, "test123").unwrap();
        // SEQUENCE { INTEGER 0, AlgorithmIdentifier, ... }
        assert_eq!(material.private_key()[0], 0x30);
    }

    #[test]
    fn wrong_password_is_an_error() {
        assert!(KeyMaterial::from_pkcs12(KEYSTORE, "nope").is_err());
        assert!(KeyMaterial::from_pkcs12(LEGACY_KEYSTORE, "nope").is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(KeyMaterial::from_pkcs12(b"not a keystore", "test123").is_err());
    }

    #[test]
    fn loads_keystore_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.p12");
        std::fs::write(&path, KEYSTORE).unwrap();

        assert!(KeyMaterial::load(&path, "test123").is_ok());
    }

    #[test]
    fn missing_file_is_rejected() {
        assert!(KeyMaterial::load(Path::new("/nonexistent/keystore.p12"), "pw").is_err());
    }

    #[test]
    fn empty_chain_is_rejected() {
        assert!(KeyMaterial::new(vec![1], vec![]).is_err());
        assert!(KeyMaterial::new(vec![], vec![vec![1]]).is_err());
    }

    #[test]
    fn unparseable_certificate_has_no_description() {
        let material = KeyMaterial::new(vec![1], vec![b"junk".to_vec()]).unwrap();
        assert!(material.describe_signer().is_none());
    }

    #[test]
    fn debug_redacts_private_key() {
        let material = KeyMaterial::new(b"secret".to_vec(), vec![vec![1]]).unwrap();
        let debug = format!("{material:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("secret"));
    }
}
