//! Client for REST APIs that describe themselves.
//!
//! A server lists its resources through `OPTIONS {host}/*` and describes each
//! one (properties, types, access rules, allowed links) through `OPTIONS` on
//! the resource path. This crate discovers those definitions and uses them to
//! convert resources to and from their wire form.
//!
//! ## Layers
//!
//! - **Types**: [`TypeRegistry`] turns descriptors such as `date<Y-m-d>` or
//!   `map<string, set<int>>` into [`PropertyType`] converters
//! - **Capabilities**: [`NetworkCapabilities`], optionally backed by the
//!   on-disk [`CacheCapabilities`], behind [`RefreshLimitedCapabilities`]
//! - **Servers**: [`HttpServer`] performs the requests; [`RetryServer`]
//!   refreshes capabilities and retries once when a call fails
//! - **Client**: [`Client`] hands out one shared server per host
//!
//! ```no_run
//! # async fn run() -> restcap::Result<()> {
//! use restcap::{Client, ClientConfig, HttpResource, ResourceProperty};
//!
//! let client = Client::new(ClientConfig::default())?;
//! let server = client.server("http://example.com")?;
//!
//! let post = HttpResource::of("posts", [ResourceProperty::new("title", "Hello")?])?;
//! let id = server.create(&post).await?;
//! let stored = server.read("posts", &id).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod capabilities;
mod client;
mod config;
mod date_format;
mod definition;
mod error;
mod formats;
mod identity;
pub mod link_header;
pub mod normalizer;
mod refresh_limited;
mod registry;
mod resource;
mod retry;
mod server;
mod specification;
pub mod transport;
pub mod types;
pub mod uri;
mod value;

pub use cache::{CacheCapabilities, CacheStore};
pub use capabilities::{Capabilities, DefinitionFactory, NetworkCapabilities};
pub use client::{Client, DefaultServerFactory, ServerFactory};
pub use config::{ClientConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_TIMEOUT, default_cache_dir};
pub use date_format::DateFormat;
pub use definition::{Access, AllowedLink, HttpResourceDefinition, Identity, Link, Property};
pub use error::{Error, Result};
pub use formats::{Format, Formats, MediaType};
pub use identity::{extract_identities, extract_identity};
pub use refresh_limited::RefreshLimitedCapabilities;
pub use registry::TypeRegistry;
pub use resource::{HttpResource, ResourceProperty};
pub use retry::RetryServer;
pub use server::{HttpServer, Server};
pub use specification::{QueryStringTranslator, Range, Specification, SpecificationTranslator};
pub use transport::{ReqwestTransport, Request, Response, Transport};
pub use types::{PropertyType, TypeDescriptor, TypeRef};
pub use value::PropertyValue;
