//! Persistent capabilities cache.
//!
//! Discovery results are kept on disk, one directory per host, so that a new
//! process does not have to hit the network before its first request:
//!
//! ```text
//! {root}/{sha256(host)}/.names.json   resource names
//! {root}/{sha256(host)}/{name}.json   normalized definition
//! ```

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Url;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::form_urlencoded::byte_serialize;

use crate::Result;
use crate::capabilities::Capabilities;
use crate::definition::HttpResourceDefinition;
use crate::normalizer::{denormalize_definition, normalize_definition};
use crate::registry::TypeRegistry;

const NAMES_KEY: &str = ".names";

/// Lowercase hex SHA-256 of `input`.
pub(crate) fn sha256_hex(input: &str) -> String {
    Sha256::digest(input.as_bytes())
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// JSON blobs on disk, grouped per host.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every blob of `host`.
    pub fn host_dir(&self, host: &Url) -> PathBuf {
        self.root.join(sha256_hex(host.as_str()))
    }

    /// Keys are form-urlencoded so distinct keys never share a file.
    fn blob_path(&self, host: &Url, key: &str) -> PathBuf {
        let file: String = byte_serialize(key.as_bytes()).collect();
        self.host_dir(host).join(format!("{file}.json"))
    }

    /// Read a blob. Missing and unreadable blobs are both a miss.
    pub async fn load(&self, host: &Url, key: &str) -> Result<Option<serde_json::Value>> {
        let path = self.blob_path(host, key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring corrupt cache entry");
                Ok(None)
            }
        }
    }

    pub async fn persist(&self, host: &Url, key: &str, value: &serde_json::Value) -> Result<()> {
        tokio::fs::create_dir_all(self.host_dir(host)).await?;
        let path = self.blob_path(host, key);
        tokio::fs::write(&path, serde_json::to_vec_pretty(value)?).await?;
        debug!(path = %path.display(), "persisted cache entry");
        Ok(())
    }

    /// Remove every blob of `host`.
    pub async fn clear(&self, host: &Url) -> Result<()> {
        match tokio::fs::remove_dir_all(self.host_dir(host)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Capabilities served from a [`CacheStore`], falling back to `inner`.
pub struct CacheCapabilities {
    inner: Arc<dyn Capabilities>,
    store: CacheStore,
    host: Url,
    registry: TypeRegistry,
    names: RwLock<Option<BTreeSet<String>>>,
    definitions: DashMap<String, Arc<HttpResourceDefinition>>,
}

impl CacheCapabilities {
    pub fn new(
        inner: Arc<dyn Capabilities>,
        store: CacheStore,
        host: Url,
        registry: TypeRegistry,
    ) -> Self {
        Self {
            inner,
            store,
            host,
            registry,
            names: RwLock::new(None),
            definitions: DashMap::new(),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    async fn load_names(&self) -> Result<Option<BTreeSet<String>>> {
        let Some(value) = self.store.load(&self.host, NAMES_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(names) => Ok(Some(names)),
            Err(e) => {
                warn!(host = %self.host, error = %e, "cached names are malformed");
                Ok(None)
            }
        }
    }

    async fn load_definition(&self, name: &str) -> Result<Option<HttpResourceDefinition>> {
        let Some(value) = self.store.load(&self.host, name).await? else {
            return Ok(None);
        };
        match denormalize_definition(value, name, &self.registry) {
            Ok(definition) => Ok(Some(definition)),
            Err(e) => {
                warn!(host = %self.host, name, error = %e, "cached definition is unusable");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl Capabilities for CacheCapabilities {
    async fn names(&self) -> Result<BTreeSet<String>> {
        if let Some(names) = self.names.read().await.as_ref() {
            return Ok(names.clone());
        }

        let mut guard = self.names.write().await;
        if let Some(names) = guard.as_ref() {
            return Ok(names.clone());
        }

        let names = match self.load_names().await? {
            Some(names) => {
                debug!(host = %self.host, "names served from cache");
                names
            }
            None => {
                debug!(host = %self.host, "names cache miss");
                let names = self.inner.names().await?;
                self.store
                    .persist(&self.host, NAMES_KEY, &serde_json::to_value(&names)?)
                    .await?;
                names
            }
        };

        *guard = Some(names.clone());
        Ok(names)
    }

    async fn get(&self, name: &str) -> Result<Arc<HttpResourceDefinition>> {
        // the names list owns this file
        if name == NAMES_KEY {
            return self.inner.get(name).await;
        }

        if let Some(definition) = self.definitions.get(name) {
            return Ok(Arc::clone(definition.value()));
        }

        let definition = match self.load_definition(name).await? {
            Some(definition) => {
                debug!(host = %self.host, name, "definition served from cache");
                Arc::new(definition)
            }
            None => {
                debug!(host = %self.host, name, "definition cache miss");
                let definition = self.inner.get(name).await?;
                self.store
                    .persist(&self.host, name, &normalize_definition(&definition))
                    .await?;
                definition
            }
        };

        self.definitions
            .insert(name.to_string(), Arc::clone(&definition));
        Ok(definition)
    }

    async fn refresh(&self) -> Result<()> {
        debug!(host = %self.host, "clearing capabilities cache");
        self.store.clear(&self.host).await?;
        self.inner.refresh().await?;
        *self.names.write().await = None;
        self.definitions.clear();
        Ok(())
    }
}
