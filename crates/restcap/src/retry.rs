//! Single refresh-and-retry around a [`Server`].

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::Result;
use crate::capabilities::Capabilities;
use crate::definition::{Identity, Link};
use crate::resource::HttpResource;
use crate::server::Server;
use crate::specification::{Range, Specification};

/// Retries each failed operation once, after refreshing capabilities.
///
/// The usual cause of a failure is a cached definition that no longer
/// matches the server. A second failure is returned as is.
pub struct RetryServer<S> {
    inner: S,
}

impl<S: Server> RetryServer<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn attempt<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => err,
        };

        warn!(operation, error = %err, "operation failed, refreshing capabilities and retrying");
        self.inner.capabilities().refresh().await?;

        let result = call().await;
        if let Err(e) = &result {
            debug!(operation, error = %e, "retry failed");
        }
        result
    }
}

#[async_trait]
impl<S: Server> Server for RetryServer<S> {
    fn capabilities(&self) -> &Arc<dyn Capabilities> {
        self.inner.capabilities()
    }

    async fn all(
        &self,
        name: &str,
        specification: Option<&Specification>,
        range: Option<Range>,
    ) -> Result<BTreeSet<Identity>> {
        self.attempt("all", || self.inner.all(name, specification, range))
            .await
    }

    async fn read(&self, name: &str, identity: &Identity) -> Result<HttpResource> {
        self.attempt("read", || self.inner.read(name, identity)).await
    }

    async fn create(&self, resource: &HttpResource) -> Result<Identity> {
        self.attempt("create", || self.inner.create(resource)).await
    }

    async fn update(&self, identity: &Identity, resource: &HttpResource) -> Result<()> {
        self.attempt("update", || self.inner.update(identity, resource))
            .await
    }

    async fn remove(&self, name: &str, identity: &Identity) -> Result<()> {
        self.attempt("remove", || self.inner.remove(name, identity))
            .await
    }

    async fn link(&self, name: &str, identity: &Identity, links: &[Link]) -> Result<()> {
        self.attempt("link", || self.inner.link(name, identity, links))
            .await
    }

    async fn unlink(&self, name: &str, identity: &Identity, links: &[Link]) -> Result<()> {
        self.attempt("unlink", || self.inner.unlink(name, identity, links))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::definition::HttpResourceDefinition;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingCapabilities {
        refreshes: AtomicUsize,
    }

    #[async_trait]
    impl Capabilities for CountingCapabilities {
        async fn names(&self) -> Result<BTreeSet<String>> {
            Ok(BTreeSet::new())
        }

        async fn get(&self, name: &str) -> Result<Arc<HttpResourceDefinition>> {
            Ok(Arc::new(HttpResourceDefinition::new(name, "/x", "id")?))
        }

        async fn refresh(&self) -> Result<()> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails the first `failures` calls of every operation.
    struct FlakyServer {
        capabilities: Arc<dyn Capabilities>,
        failures: usize,
        calls: AtomicUsize,
        error: fn() -> Error,
    }

    impl FlakyServer {
        fn new(capabilities: Arc<dyn Capabilities>, failures: usize) -> Self {
            Self {
                capabilities,
                failures,
                calls: AtomicUsize::new(0),
                error: || Error::MissingProperty("title".to_string()),
            }
        }

        fn outcome<T>(&self, value: T) -> Result<T> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                Err((self.error)())
            } else {
                Ok(value)
            }
        }
    }

    #[async_trait]
    impl Server for FlakyServer {
        fn capabilities(&self) -> &Arc<dyn Capabilities> {
            &self.capabilities
        }

        async fn all(
            &self,
            _name: &str,
            _specification: Option<&Specification>,
            _range: Option<Range>,
        ) -> Result<BTreeSet<Identity>> {
            self.outcome(BTreeSet::from([Identity::new("a")?]))
        }

        async fn read(&self, name: &str, _identity: &Identity) -> Result<HttpResource> {
            self.outcome(HttpResource::new(name)?)
        }

        async fn create(&self, _resource: &HttpResource) -> Result<Identity> {
            self.outcome(Identity::new("new")?)
        }

        async fn update(&self, _identity: &Identity, _resource: &HttpResource) -> Result<()> {
            self.outcome(())
        }

        async fn remove(&self, _name: &str, _identity: &Identity) -> Result<()> {
            self.outcome(())
        }

        async fn link(&self, _name: &str, _identity: &Identity, _links: &[Link]) -> Result<()> {
            self.outcome(())
        }

        async fn unlink(&self, _name: &str, _identity: &Identity, _links: &[Link]) -> Result<()> {
            self.outcome(())
        }
    }

    fn setup(failures: usize) -> (Arc<CountingCapabilities>, RetryServer<FlakyServer>) {
        let capabilities = Arc::new(CountingCapabilities::default());
        let server = RetryServer::new(FlakyServer::new(capabilities.clone(), failures));
        (capabilities, server)
    }

    fn id() -> Identity {
        Identity::new("abc").unwrap()
    }

    #[tokio::test]
    async fn test_success_needs_no_refresh() {
        let (capabilities, server) = setup(0);
        server.read("foo", &id()).await.unwrap();
        assert_eq!(capabilities.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(server.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_one_failure_is_retried_after_refresh() {
        let (capabilities, server) = setup(1);
        let resource = server.read("foo", &id()).await.unwrap();
        assert_eq!(resource.name(), "foo");
        assert_eq!(capabilities.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(server.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_failure_propagates() {
        let (capabilities, server) = setup(2);
        let err = server.read("foo", &id()).await.unwrap_err();
        assert!(matches!(err, Error::MissingProperty(_)));
        assert_eq!(capabilities.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(server.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_every_operation_is_wrapped() {
        let resource = HttpResource::new("foo").unwrap();
        let links: Vec<Link> = Vec::new();

        let (_, server) = setup(1);
        assert_eq!(server.all("foo", None, None).await.unwrap().len(), 1);
        let (_, server) = setup(1);
        assert_eq!(server.create(&resource).await.unwrap().as_str(), "new");
        let (_, server) = setup(1);
        server.update(&id(), &resource).await.unwrap();
        let (_, server) = setup(1);
        server.remove("foo", &id()).await.unwrap();
        let (_, server) = setup(1);
        server.link("foo", &id(), &links).await.unwrap();
        let (capabilities, server) = setup(1);
        server.unlink("foo", &id(), &links).await.unwrap();
        assert_eq!(capabilities.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_caller_errors_are_not_retried() {
        let capabilities = Arc::new(CountingCapabilities::default());
        let mut flaky = FlakyServer::new(capabilities.clone(), 1);
        flaky.error = || Error::ResourceNotRangeable("foo".to_string());
        let server = RetryServer::new(flaky);

        let err = server.all("foo", None, None).await.unwrap_err();
        assert!(matches!(err, Error::ResourceNotRangeable(_)));
        assert_eq!(capabilities.refreshes.load(Ordering::SeqCst), 0);
    }
}
