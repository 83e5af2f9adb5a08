//! Capabilities that refresh at most once per process.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::Result;
use crate::capabilities::Capabilities;
use crate::definition::HttpResourceDefinition;

/// Forwards the first `refresh()` to `inner` and ignores the rest.
///
/// Several failing operations in the same process would otherwise each wipe
/// the caches again.
pub struct RefreshLimitedCapabilities {
    inner: Arc<dyn Capabilities>,
    refreshed: AtomicBool,
}

impl RefreshLimitedCapabilities {
    pub fn new(inner: Arc<dyn Capabilities>) -> Self {
        Self {
            inner,
            refreshed: AtomicBool::new(false),
        }
    }

    pub fn has_refreshed(&self) -> bool {
        self.refreshed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Capabilities for RefreshLimitedCapabilities {
    async fn names(&self) -> Result<BTreeSet<String>> {
        self.inner.names().await
    }

    async fn get(&self, name: &str) -> Result<Arc<HttpResourceDefinition>> {
        self.inner.get(name).await
    }

    async fn definitions(&self) -> Result<BTreeMap<String, Arc<HttpResourceDefinition>>> {
        self.inner.definitions().await
    }

    async fn refresh(&self) -> Result<()> {
        if self.refreshed.swap(true, Ordering::SeqCst) {
            debug!("capabilities already refreshed, skipping");
            return Ok(());
        }
        self.inner.refresh().await
    }
}
