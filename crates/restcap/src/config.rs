//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::formats::Formats;
use crate::registry::TypeRegistry;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Platform cache directory for persisted capabilities, e.g.
/// `~/.cache/restcap` on Linux.
pub fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("restcap"))
}

/// Settings shared by every server a [`Client`](crate::Client) builds.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub user_agent: String,
    /// Persist discovered capabilities under this directory.
    pub cache_dir: Option<PathBuf>,
    /// Wrap servers so each failed operation is retried once.
    pub retry: bool,
    pub formats: Formats,
    pub types: TypeRegistry,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("restcap/", env!("CARGO_PKG_VERSION")).to_string(),
            cache_dir: None,
            retry: true,
            formats: Formats::default(),
            types: TypeRegistry::defaults(),
        }
    }
}

impl ClientConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_formats(mut self, formats: Formats) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_types(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert!(config.retry);
        assert!(config.cache_dir.is_none());
        assert!(config.user_agent.starts_with("restcap/"));
        assert_eq!(config.formats.accept_header(), "application/json");
    }

    #[test]
    fn test_builders() {
        let config = ClientConfig::default()
            .with_timeout(Duration::from_secs(1))
            .with_cache_dir(Some(PathBuf::from("/tmp/x")))
            .with_retry(false);
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/x")));
        assert!(!config.retry);
    }

    #[test]
    fn test_default_cache_dir_ends_with_crate_name() {
        if let Some(dir) = default_cache_dir() {
            assert!(dir.ends_with("restcap"));
        }
    }
}
