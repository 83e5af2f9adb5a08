//! Resource operations against one discovered server.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, LINK, RANGE};
use reqwest::{Method, Url};
use tracing::debug;

use crate::capabilities::Capabilities;
use crate::definition::{Access, HttpResourceDefinition, Identity, Link};
use crate::formats::Formats;
use crate::identity::{extract_identities, extract_identity};
use crate::normalizer::{denormalize_resource, normalize_resource};
use crate::resource::HttpResource;
use crate::specification::{QueryStringTranslator, Range, Specification, SpecificationTranslator};
use crate::transport::{Request, Transport};
use crate::{Error, Result, link_header, uri};

/// CRUD and linking over the resources a server exposes.
///
/// Every operation looks the resource definition up through
/// [`capabilities`](Server::capabilities) first.
#[async_trait]
pub trait Server: Send + Sync {
    fn capabilities(&self) -> &Arc<dyn Capabilities>;

    /// Identities of the `name` resources matching `specification`, within `range`.
    async fn all(
        &self,
        name: &str,
        specification: Option<&Specification>,
        range: Option<Range>,
    ) -> Result<BTreeSet<Identity>>;

    async fn read(&self, name: &str, identity: &Identity) -> Result<HttpResource>;

    /// Create `resource` and return the identity the server assigned.
    async fn create(&self, resource: &HttpResource) -> Result<Identity>;

    async fn update(&self, identity: &Identity, resource: &HttpResource) -> Result<()>;

    async fn remove(&self, name: &str, identity: &Identity) -> Result<()>;

    async fn link(&self, name: &str, identity: &Identity, links: &[Link]) -> Result<()>;

    async fn unlink(&self, name: &str, identity: &Identity, links: &[Link]) -> Result<()>;
}

/// [`Server`] speaking HTTP through a [`Transport`].
pub struct HttpServer {
    host: Url,
    capabilities: Arc<dyn Capabilities>,
    transport: Arc<dyn Transport>,
    formats: Formats,
    translator: Arc<dyn SpecificationTranslator>,
}

impl HttpServer {
    pub fn new(
        host: Url,
        capabilities: Arc<dyn Capabilities>,
        transport: Arc<dyn Transport>,
        formats: Formats,
    ) -> Self {
        Self {
            host,
            capabilities,
            transport,
            formats,
            translator: Arc::new(QueryStringTranslator),
        }
    }

    /// Use another query language for listing filters.
    pub fn with_translator(mut self, translator: Arc<dyn SpecificationTranslator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn host(&self) -> &Url {
        &self.host
    }

    fn definition_url(&self, definition: &HttpResourceDefinition) -> Result<Url> {
        uri::resolve(&self.host, definition.url())
    }

    fn resource_url(&self, definition: &HttpResourceDefinition, identity: &Identity) -> Result<Url> {
        Ok(uri::child(&self.definition_url(definition)?, identity.as_str()))
    }

    async fn send_links(
        &self,
        method: &'static str,
        name: &str,
        identity: &Identity,
        links: &[Link],
    ) -> Result<()> {
        if links.is_empty() {
            return Err(Error::Domain(format!("no links given for {name}/{identity}")));
        }

        let definition = self.capabilities.get(name).await?;
        if let Some(link) = links.iter().find(|link| !definition.allows(link)) {
            return Err(Error::InvalidArgument(format!(
                "{name} does not allow a '{}' link to {}",
                link.relationship(),
                link.definition()
            )));
        }

        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| Error::Domain(format!("invalid method {method}: {e}")))?;
        let mut request = Request::new(method, self.resource_url(&definition, identity)?);
        for link in links {
            let target_definition = self.capabilities.get(link.definition()).await?;
            let target = self.resource_url(&target_definition, link.identity())?;
            request = request.header(
                LINK,
                link_header::render(target.as_str(), link.relationship(), link.parameters()),
            )?;
        }

        debug!(name, %identity, count = links.len(), "sending links");
        self.transport.fulfill(request).await?;
        Ok(())
    }
}

#[async_trait]
impl Server for HttpServer {
    fn capabilities(&self) -> &Arc<dyn Capabilities> {
        &self.capabilities
    }

    async fn all(
        &self,
        name: &str,
        specification: Option<&Specification>,
        range: Option<Range>,
    ) -> Result<BTreeSet<Identity>> {
        let definition = self.capabilities.get(name).await?;
        if range.is_some() && !definition.is_rangeable() {
            return Err(Error::ResourceNotRangeable(name.to_string()));
        }

        let base = self.definition_url(&definition)?;
        let mut url = base.clone();
        if let Some(specification) = specification {
            let query = self.translator.translate(specification);
            if !query.is_empty() {
                let query = match url.query() {
                    Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
                    _ => query,
                };
                url.set_query(Some(&query));
            }
        }

        let mut request = Request::new(Method::GET, url);
        if let Some(range) = range {
            request = request.header(RANGE, range.header_value())?;
        }

        let response = self.transport.fulfill(request).await?;
        extract_identities(&response, &base)
    }

    async fn read(&self, name: &str, identity: &Identity) -> Result<HttpResource> {
        let definition = self.capabilities.get(name).await?;
        let request = Request::new(Method::GET, self.resource_url(&definition, identity)?)
            .header(ACCEPT, self.formats.accept_header())?;

        let response = self.transport.fulfill(request).await?;
        if !response.is_json() {
            return Err(Error::UnsupportedResponse(format!(
                "{name}/{identity} answered with {}",
                response.content_type().as_deref().unwrap_or("no content type")
            )));
        }

        denormalize_resource(&response.json()?, &definition, Access::READ)
    }

    async fn create(&self, resource: &HttpResource) -> Result<Identity> {
        let definition = self.capabilities.get(resource.name()).await?;
        let body = normalize_resource(resource, &definition, Access::CREATE)?;
        let url = self.definition_url(&definition)?;

        let response = self
            .transport
            .fulfill(Request::new(Method::POST, url.clone()).json(&body)?)
            .await?;
        extract_identity(&response, &url)
    }

    async fn update(&self, identity: &Identity, resource: &HttpResource) -> Result<()> {
        let definition = self.capabilities.get(resource.name()).await?;
        let body = normalize_resource(resource, &definition, Access::UPDATE)?;
        let url = self.resource_url(&definition, identity)?;

        self.transport.fulfill(Request::new(Method::PUT, url).json(&body)?).await?;
        Ok(())
    }

    async fn remove(&self, name: &str, identity: &Identity) -> Result<()> {
        let definition = self.capabilities.get(name).await?;
        let url = self.resource_url(&definition, identity)?;

        self.transport.fulfill(Request::new(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn link(&self, name: &str, identity: &Identity, links: &[Link]) -> Result<()> {
        self.send_links("LINK", name, identity, links).await
    }

    async fn unlink(&self, name: &str, identity: &Identity, links: &[Link]) -> Result<()> {
        self.send_links("UNLINK", name, identity, links).await
    }
}
