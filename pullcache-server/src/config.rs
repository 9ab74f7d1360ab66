//! JSON configuration file.
//!
//! Every field is optional; missing or empty values fall back to the
//! defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pullcache_engine::config::DEFAULT_DNS_SERVER;
use pullcache_engine::{FailurePolicy, FetcherConfig, Filters};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_LISTEN: &str = ":80";
pub const DEFAULT_LOG_PATH: &str = "./filesrv.log";
pub const DEFAULT_FILES_PATH: &str = "./files/";
const DEFAULT_DNS_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address; `:port` binds every interface
    pub listen: String,

    /// Log file path
    pub log_path: String,

    /// Cache root
    pub files_path: String,

    /// Debug-level logging, mirrored to stdout
    pub verbose: bool,

    /// Nameserver for origin lookups, `ip` or `ip:port`
    pub dns_server: String,

    pub dns_timeout_secs: u64,

    pub connect_timeout_secs: u64,

    pub progress_interval_secs: u64,

    /// Directory for partial downloads, system temp dir when unset
    pub temp_dir: Option<PathBuf>,

    pub user_agent: String,

    /// Follow origin redirects (up to 10 hops)
    pub follow_redirects: bool,

    /// Regex allow-list for origin URLs; empty allows all
    pub filters: Vec<String>,

    /// Shut the server down when a download cannot be placed in the cache
    pub fail_fast: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            log_path: DEFAULT_LOG_PATH.to_string(),
            files_path: DEFAULT_FILES_PATH.to_string(),
            verbose: false,
            dns_server: DEFAULT_DNS_SERVER.to_string(),
            dns_timeout_secs: DEFAULT_DNS_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            progress_interval_secs: DEFAULT_PROGRESS_INTERVAL_SECS,
            temp_dir: None,
            user_agent: String::new(),
            follow_redirects: true,
            filters: Vec::new(),
            fail_fast: false,
        }
    }
}

fn default_if_empty(value: &mut String, default: &str) {
    if value.trim().is_empty() {
        *value = default.to_string();
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let data = std::fs::read(path).map_err(|source| AppError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(&data)
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, AppError> {
        let config: ServerConfig = serde_json::from_slice(data)?;
        Ok(config.normalized())
    }

    /// Replace empty fields with their defaults
    pub fn normalized(mut self) -> Self {
        default_if_empty(&mut self.listen, DEFAULT_LISTEN);
        default_if_empty(&mut self.log_path, DEFAULT_LOG_PATH);
        default_if_empty(&mut self.files_path, DEFAULT_FILES_PATH);
        default_if_empty(&mut self.dns_server, DEFAULT_DNS_SERVER);
        if self.dns_timeout_secs == 0 {
            self.dns_timeout_secs = DEFAULT_DNS_TIMEOUT_SECS;
        }
        if self.connect_timeout_secs == 0 {
            self.connect_timeout_secs = DEFAULT_CONNECT_TIMEOUT_SECS;
        }
        if self.progress_interval_secs == 0 {
            self.progress_interval_secs = DEFAULT_PROGRESS_INTERVAL_SECS;
        }
        if self.temp_dir.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            self.temp_dir = None;
        }
        self
    }

    /// Socket address to bind, expanding a bare `:port`.
    pub fn listen_addr(&self) -> String {
        if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        }
    }

    pub fn files_root(&self) -> PathBuf {
        PathBuf::from(&self.files_path)
    }

    pub fn fetcher_config(&self) -> Result<FetcherConfig, AppError> {
        let mut builder = FetcherConfig::builder()
            .with_dns_server_str(&self.dns_server)?
            .with_dns_timeout(Duration::from_secs(self.dns_timeout_secs))
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .with_progress_interval(Duration::from_secs(self.progress_interval_secs))
            .with_follow_redirects(self.follow_redirects);
        if let Some(dir) = &self.temp_dir {
            builder = builder.with_temp_dir(dir);
        }
        if !self.user_agent.is_empty() {
            builder = builder.with_user_agent(&self.user_agent);
        }
        Ok(builder.build())
    }

    pub fn filters(&self) -> Result<Filters, AppError> {
        Filters::new(&self.filters).map_err(|e| AppError::InvalidInput(e.to_string()))
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        if self.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::Isolate
        }
    }
}
