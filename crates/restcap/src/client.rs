//! Entry point: one memoized [`Server`] per host.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use reqwest::Url;
use tracing::debug;

use crate::Result;
use crate::cache::{CacheCapabilities, CacheStore, sha256_hex};
use crate::capabilities::{Capabilities, DefinitionFactory, NetworkCapabilities};
use crate::config::ClientConfig;
use crate::refresh_limited::RefreshLimitedCapabilities;
use crate::retry::RetryServer;
use crate::server::{HttpServer, Server};
use crate::transport::{ReqwestTransport, Transport};
use crate::uri;

/// Builds the server stack for a host.
pub trait ServerFactory: Send + Sync {
    fn make(&self, host: Url) -> Result<Arc<dyn Server>>;
}

/// Composes network discovery, the optional disk cache, the refresh limit,
/// HTTP operations and the optional retry layer.
pub struct DefaultServerFactory {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
}

impl DefaultServerFactory {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport =
            ReqwestTransport::new(config.connect_timeout, config.timeout, &config.user_agent)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl ServerFactory for DefaultServerFactory {
    fn make(&self, host: Url) -> Result<Arc<dyn Server>> {
        let config = &self.config;

        let mut capabilities: Arc<dyn Capabilities> = Arc::new(NetworkCapabilities::new(
            host.clone(),
            Arc::clone(&self.transport),
            config.formats.clone(),
            DefinitionFactory::new(config.types.clone()),
        ));
        if let Some(dir) = &config.cache_dir {
            capabilities = Arc::new(CacheCapabilities::new(
                capabilities,
                CacheStore::new(dir),
                host.clone(),
                config.types.clone(),
            ));
        }
        let capabilities = Arc::new(RefreshLimitedCapabilities::new(capabilities));

        let server = HttpServer::new(
            host,
            capabilities,
            Arc::clone(&self.transport),
            config.formats.clone(),
        );

        if config.retry {
            Ok(Arc::new(RetryServer::new(server)))
        } else {
            Ok(Arc::new(server))
        }
    }
}

/// Hands out one shared [`Server`] per canonical host URL.
pub struct Client {
    factory: Arc<dyn ServerFactory>,
    servers: DashMap<String, Arc<dyn Server>>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self::with_factory(Arc::new(DefaultServerFactory::new(config)?)))
    }

    pub fn with_factory(factory: Arc<dyn ServerFactory>) -> Self {
        Self {
            factory,
            servers: DashMap::new(),
        }
    }

    /// Server for `url`. URLs with the same canonical form share one instance.
    pub fn server(&self, url: &str) -> Result<Arc<dyn Server>> {
        let host = uri::canonical(url)?;
        let key = sha256_hex(host.as_str());

        match self.servers.entry(key) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                debug!(%host, "building server");
                let server = self.factory.make(host)?;
                entry.insert(Arc::clone(&server));
                Ok(server)
            }
        }
    }
}
