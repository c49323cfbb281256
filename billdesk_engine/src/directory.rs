use log::*;
use thiserror::Error;

use crate::registry_types::{RegistryEndpoint, RegistryKey};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("Unknown registry: {0}")]
    UnknownRegistry(RegistryKey),
    #[error("Registry {0} is configured more than once")]
    DuplicateRegistry(RegistryKey),
}

/// The fixed set of registries the desk can talk to, in configuration order.
///
/// The directory is built once at startup and never changes afterwards. Configuration order doubles as the default
/// federation order.
#[derive(Debug, Clone, Default)]
pub struct RegistryDirectory {
    endpoints: Vec<RegistryEndpoint>,
}

impl RegistryDirectory {
    pub fn new(endpoints: Vec<RegistryEndpoint>) -> Result<Self, DirectoryError> {
        let mut seen = Vec::with_capacity(endpoints.len());
        for ep in &endpoints {
            if seen.contains(&&ep.key) {
                return Err(DirectoryError::DuplicateRegistry(ep.key.clone()));
            }
            seen.push(&ep.key);
        }
        debug!("Registry directory holds {} registries", endpoints.len());
        Ok(Self { endpoints })
    }

    pub fn resolve(&self, key: &RegistryKey) -> Result<&RegistryEndpoint, DirectoryError> {
        self.endpoints.iter().find(|ep| &ep.key == key).ok_or_else(|| DirectoryError::UnknownRegistry(key.clone()))
    }

    /// Resolves every key, failing on the first unknown one.
    pub fn resolve_all(&self, keys: &[RegistryKey]) -> Result<Vec<&RegistryEndpoint>, DirectoryError> {
        keys.iter().map(|k| self.resolve(k)).collect()
    }

    pub fn keys(&self) -> Vec<RegistryKey> {
        self.endpoints.iter().map(|ep| ep.key.clone()).collect()
    }

    pub fn endpoints(&self) -> &[RegistryEndpoint] {
        &self.endpoints
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }
}
