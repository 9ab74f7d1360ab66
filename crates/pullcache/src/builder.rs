//! # Builder for FetcherConfig
//!
//! Fluent construction of [`FetcherConfig`] values.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use pullcache_engine::FetcherConfig;
//!
//! let config = FetcherConfig::builder()
//!     .with_connect_timeout(Duration::from_secs(5))
//!     .with_progress_interval(Duration::from_secs(1))
//!     .with_user_agent("pullcache-test/1.0")
//!     .build();
//! assert_eq!(config.connect_timeout, Duration::from_secs(5));
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::FetcherConfig;
use crate::error::PullError;

/// Builder for creating FetcherConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct FetcherConfigBuilder {
    config: FetcherConfig,
}

impl FetcherConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: FetcherConfig::default(),
        }
    }

    /// Set the nameserver used for origin lookups
    pub fn with_dns_server(mut self, server: SocketAddr) -> Self {
        self.config.dns_server = server;
        self
    }

    /// Parse and set the nameserver, accepting a bare IP (port 53 assumed)
    pub fn with_dns_server_str(mut self, server: &str) -> Result<Self, PullError> {
        self.config.dns_server = parse_dns_server(server)?;
        Ok(self)
    }

    /// Set the timeout for a single DNS query
    pub fn with_dns_timeout(mut self, timeout: Duration) -> Self {
        self.config.dns_timeout = timeout;
        self
    }

    /// Set the connection timeout (time to establish initial connection)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the interval between progress log lines
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.config.progress_interval = interval;
        self
    }

    /// Set the directory for partial downloads
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = dir.into();
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set whether to follow redirects
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    /// Build the FetcherConfig instance
    pub fn build(self) -> FetcherConfig {
        self.config
    }
}

impl Default for FetcherConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_dns_server(server: &str) -> Result<SocketAddr, PullError> {
    if let Ok(addr) = server.parse::<SocketAddr>() {
        return Ok(addr);
    }
    server
        .parse::<std::net::IpAddr>()
        .map(|ip| SocketAddr::new(ip, 53))
        .map_err(|_| PullError::DnsConfig(server.to_string()))
}
