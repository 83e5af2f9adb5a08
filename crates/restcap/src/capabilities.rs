//! Capability discovery: which resources a server exposes and their definitions.
//!
//! [`NetworkCapabilities`] talks to the server. [`CacheCapabilities`] and
//! [`RefreshLimitedCapabilities`] wrap any other implementation.
//!
//! [`CacheCapabilities`]: crate::cache::CacheCapabilities
//! [`RefreshLimitedCapabilities`]: crate::refresh_limited::RefreshLimitedCapabilities

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode, Url};
use tokio::sync::RwLock;
use tracing::debug;

use crate::definition::HttpResourceDefinition;
use crate::formats::Formats;
use crate::normalizer::denormalize_definition;
use crate::registry::TypeRegistry;
use crate::transport::{Request, Response, Transport};
use crate::{Error, Result, link_header, uri};

/// Source of resource names and definitions for one server.
#[async_trait]
pub trait Capabilities: Send + Sync {
    /// Names of every resource the server exposes.
    async fn names(&self) -> Result<BTreeSet<String>>;

    /// Definition of the resource called `name`.
    async fn get(&self, name: &str) -> Result<Arc<HttpResourceDefinition>>;

    /// Definitions of every resource, fetching the missing ones.
    async fn definitions(&self) -> Result<BTreeMap<String, Arc<HttpResourceDefinition>>> {
        let mut definitions = BTreeMap::new();
        for name in self.names().await? {
            let definition = self.get(&name).await?;
            definitions.insert(name, definition);
        }
        Ok(definitions)
    }

    /// Forget everything discovered so far.
    async fn refresh(&self) -> Result<()>;
}

/// Turns a definition OPTIONS response into a definition.
#[derive(Debug, Clone)]
pub struct DefinitionFactory {
    registry: TypeRegistry,
}

impl DefinitionFactory {
    pub fn new(registry: TypeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Requires a 200 JSON response.
    pub fn make(&self, name: &str, url: &Url, response: &Response) -> Result<HttpResourceDefinition> {
        if response.status != StatusCode::OK {
            return Err(Error::InvalidArgument(format!(
                "definition of {name} at {url} answered {}",
                response.status
            )));
        }
        if !response.is_json() {
            return Err(Error::InvalidArgument(format!(
                "definition of {name} at {url} is not application/json"
            )));
        }

        denormalize_definition(response.json()?, name, &self.registry)
    }
}

impl Default for DefinitionFactory {
    fn default() -> Self {
        Self::new(TypeRegistry::defaults())
    }
}

/// Capabilities discovered over the network and memoized in process.
pub struct NetworkCapabilities {
    host: Url,
    transport: Arc<dyn Transport>,
    formats: Formats,
    factory: DefinitionFactory,
    paths: RwLock<Option<BTreeMap<String, Url>>>,
    definitions: DashMap<String, Arc<HttpResourceDefinition>>,
}

impl NetworkCapabilities {
    pub fn new(
        host: Url,
        transport: Arc<dyn Transport>,
        formats: Formats,
        factory: DefinitionFactory,
    ) -> Self {
        Self {
            host,
            transport,
            formats,
            factory,
            paths: RwLock::new(None),
            definitions: DashMap::new(),
        }
    }

    pub fn host(&self) -> &Url {
        &self.host
    }

    /// Resource name to definition URL, discovered through `OPTIONS {host}/*`.
    async fn paths(&self) -> Result<BTreeMap<String, Url>> {
        if let Some(paths) = self.paths.read().await.as_ref() {
            return Ok(paths.clone());
        }

        let mut guard = self.paths.write().await;
        if let Some(paths) = guard.as_ref() {
            return Ok(paths.clone());
        }

        let url = Url::parse(&format!("{}/*", self.host.as_str().trim_end_matches('/')))?;
        debug!(%url, "discovering resource names");
        let response = self
            .transport
            .fulfill(Request::new(Method::OPTIONS, url))
            .await?;

        let mut paths = BTreeMap::new();
        for link in link_header::from_headers(&response.headers) {
            let Some(name) = link.relation else {
                continue;
            };
            paths.insert(name, uri::resolve(&self.host, &link.target)?);
        }
        debug!(count = paths.len(), "discovered resource names");

        *guard = Some(paths.clone());
        Ok(paths)
    }
}

#[async_trait]
impl Capabilities for NetworkCapabilities {
    async fn names(&self) -> Result<BTreeSet<String>> {
        Ok(self.paths().await?.into_keys().collect())
    }

    async fn get(&self, name: &str) -> Result<Arc<HttpResourceDefinition>> {
        if let Some(definition) = self.definitions.get(name) {
            return Ok(Arc::clone(definition.value()));
        }

        let url = match self.paths().await?.remove(name) {
            Some(url) => url,
            None => uri::resolve(&self.host, name)?,
        };

        debug!(name, %url, "fetching resource definition");
        let request = Request::new(Method::OPTIONS, url.clone())
            .header(ACCEPT, self.formats.accept_header())?;
        let response = self.transport.fulfill(request).await?;
        let definition = Arc::new(self.factory.make(name, &url, &response)?);

        self.definitions
            .insert(name.to_string(), Arc::clone(&definition));
        Ok(definition)
    }

    async fn refresh(&self) -> Result<()> {
        debug!(host = %self.host, "refreshing capabilities");
        *self.paths.write().await = None;
        self.definitions.clear();
        Ok(())
    }
}
