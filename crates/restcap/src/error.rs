//! Error types for the REST capability client.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while discovering, converting or exchanging resources.
#[derive(Debug, Error)]
pub enum Error {
    /// A value object was constructed in violation of its invariants.
    #[error("domain error: {0}")]
    Domain(String),

    /// A type descriptor matched none of the registered converters.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// An in-memory value could not be converted to its wire form.
    #[error("cannot normalize value as {descriptor}: {message}")]
    Normalization { descriptor: String, message: String },

    /// A wire value could not be converted to its in-memory form.
    #[error("cannot denormalize value as {descriptor}: {message}")]
    Denormalization { descriptor: String, message: String },

    /// A required property was absent.
    #[error("missing property: {0}")]
    MissingProperty(String),

    /// A response or lookup violated the expected contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No identity could be located in a response.
    #[error("identity not found: {0}")]
    IdentityNotFound(String),

    /// A range was requested on a resource that does not support it.
    #[error("resource not rangeable: {0}")]
    ResourceNotRangeable(String),

    /// A response carried a content type the client cannot decode.
    #[error("unsupported response: {0}")]
    UnsupportedResponse(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        status: StatusCode,
        url: String,
        body: String,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL could not be parsed or resolved.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Persistent cache IO failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a normalization error for the given type descriptor.
    pub fn normalization(descriptor: impl ToString, message: impl Into<String>) -> Self {
        Self::Normalization {
            descriptor: descriptor.to_string(),
            message: message.into(),
        }
    }

    /// Build a denormalization error for the given type descriptor.
    pub fn denormalization(descriptor: impl ToString, message: impl Into<String>) -> Self {
        Self::Denormalization {
            descriptor: descriptor.to_string(),
            message: message.into(),
        }
    }

    /// Whether the server rejected the request with a 4xx status.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Status { status, .. } => status.is_client_error(),
            Self::Http(e) => e.status().is_some_and(|s| s.is_client_error()),
            _ => false,
        }
    }

    /// Whether the failure may stem from a stale definition and deserves a
    /// capabilities refresh followed by one more attempt.
    ///
    /// Caller mistakes such as a range on a non-rangeable resource or an
    /// invalid value object are not fixed by rediscovery.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::ResourceNotRangeable(_) | Self::Domain(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
