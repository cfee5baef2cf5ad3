//! Process-scoped store of signing identities.

use std::collections::HashMap;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use tracing::warn;
use zeroize::Zeroize;

use crate::identity::{EcdsaIdentity, RsaIdentity, SigningIdentity};
use crate::CryptoError;

/// Keys held for the lifetime of the process, addressed by key id.
///
/// Signing code acquires a [`KeyHandle`] for the duration of one signing
/// operation and releases it immediately after; the store itself never hands
/// out private key bytes.
#[derive(Default)]
pub struct KeyStore {
    keys: HashMap<String, Arc<dyn SigningIdentity>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identity; returns its key id.
    pub fn insert(&mut self, identity: Arc<dyn SigningIdentity>) -> Result<String, CryptoError> {
        let key_id = identity.key_id()?;
        self.keys.insert(key_id.clone(), identity);
        Ok(key_id)
    }

    /// Load every PKCS#8 PEM private key (`*.pem`) in a directory.
    ///
    /// Files that parse as neither P-256 nor RSA are skipped with a warning
    /// so one stray file cannot block the rest of the store.
    pub fn load_dir(&mut self, dir: &Path) -> Result<Vec<String>, CryptoError> {
        let mut loaded = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("pem") {
                continue;
            }
            let mut pem = std::fs::read_to_string(&path)?;
            let parsed: Option<Arc<dyn SigningIdentity>> =
                if let Ok(identity) = EcdsaIdentity::from_pkcs8_pem(&pem) {
                    Some(Arc::new(identity))
                } else if let Ok(identity) = RsaIdentity::from_pkcs8_pem(&pem) {
                    Some(Arc::new(identity))
                } else {
                    None
                };
            pem.zeroize();

            match parsed {
                Some(identity) => loaded.push(self.insert(identity)?),
                None => warn!(path = %path.display(), "skipping unparseable key file"),
            }
        }
        Ok(loaded)
    }

    /// Acquire a scoped handle to a signing key.
    pub fn acquire(&self, key_id: &str) -> Result<KeyHandle, CryptoError> {
        self.keys
            .get(key_id)
            .cloned()
            .map(|identity| KeyHandle { identity })
            .ok_or_else(|| CryptoError::KeyNotFound(key_id.to_string()))
    }

    pub fn key_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.keys.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Scoped access to a signing key for the duration of one signing
/// operation. Dropping the handle releases the acquisition.
pub struct KeyHandle {
    identity: Arc<dyn SigningIdentity>,
}

impl Deref for KeyHandle {
    type Target = dyn SigningIdentity;

    fn deref(&self) -> &Self::Target {
        self.identity.as_ref()
    }
}
