use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DNS_SERVER: &str = "114.114.114.114:53";

const DEFAULT_USER_AGENT: &str = concat!("pullcache/", env!("CARGO_PKG_VERSION"));

/// Configurable options for origin fetches
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Nameserver used instead of the system resolver
    pub dns_server: SocketAddr,

    /// Timeout for a single DNS query
    pub dns_timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Interval between progress reports for a running transfer
    pub progress_interval: Duration,

    /// Directory receiving partial downloads
    pub temp_dir: PathBuf,

    /// User agent string
    pub user_agent: String,

    /// Whether to follow redirects
    pub follow_redirects: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            dns_server: SocketAddr::from(([114, 114, 114, 114], 53)),
            dns_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(15),
            progress_interval: Duration::from_secs(20),
            temp_dir: std::env::temp_dir(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            follow_redirects: true,
        }
    }
}

impl FetcherConfig {
    pub fn builder() -> crate::builder::FetcherConfigBuilder {
        crate::builder::FetcherConfigBuilder::new()
    }
}

/// What to do when a downloaded file cannot be moved into the cache tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure and keep serving
    #[default]
    Isolate,
    /// Log the failure and ask the server to shut down
    FailFast,
}
