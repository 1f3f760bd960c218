use std::io;

use catfetch_types::VersionId;
use tracing::error;

/// Domain-separated BLAKE3 fingerprinter for source locators.
///
/// The domain tag is prepended to every computation, so a version id can
/// never coincide with a fingerprint some other component derives from the
/// same bytes under a different tag. Only the first 8 bytes of the digest are
/// kept: ids only need to be distinct among the versions of one cat.
pub struct VersionHasher {
    domain: &'static str,
}

impl VersionHasher {
    /// Hasher for image source locators.
    pub const LOCATOR: Self = Self {
        domain: "catfetch-version-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Fingerprint a locator string.
    pub fn derive(&self, locator: &str) -> Result<VersionId, HashError> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        io::copy(&mut locator.as_bytes(), &mut hasher).map_err(|e| {
            error!(domain = self.domain, error = %e, "hash primitive rejected locator");
            HashError::Digest(e)
        })?;

        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest.as_bytes()[..8]);
        Ok(VersionId::from_bytes(bytes))
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Derive the version id for an image source URL.
pub fn derive_version_id(locator: &str) -> Result<VersionId, HashError> {
    VersionHasher::LOCATOR.derive(locator)
}

/// Errors from fingerprinting.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("failed to feed locator into hasher: {0}")]
    Digest(#[from] io::Error),
}
