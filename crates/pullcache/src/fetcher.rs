//! # Origin Fetcher
//!
//! Streams an origin resource into a temporary file. The file only reaches
//! the cache tree through the placer, so a failed or interrupted transfer
//! never leaves anything at the final path.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, Url};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument};

use crate::FetcherConfig;
use crate::error::PullError;
use crate::origin::CacheKey;
use crate::progress::TransferProgress;
use crate::resolver::UpstreamResolver;

const MIN_PROGRESS_INTERVAL: Duration = Duration::from_millis(10);

/// Create a reqwest Client that resolves hosts through the configured nameserver
pub fn create_client(config: &FetcherConfig) -> Result<Client, PullError> {
    let resolver = UpstreamResolver::new(config);
    info!(dns_server = %resolver.server(), "Resolving origins through upstream nameserver");

    let mut client_builder = Client::builder()
        .user_agent(&config.user_agent)
        .dns_resolver(Arc::new(resolver))
        // a proxy would do its own lookups and defeat the resolver override
        .no_proxy()
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    client_builder
        .build()
        .map_err(|e| PullError::Client(Arc::new(e)))
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: FetcherConfig,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, PullError> {
        let client = create_client(&config)?;
        Ok(Self { client, config })
    }

    /// Download `key` into a fresh temporary file and return its path.
    ///
    /// The returned [`TempPath`] deletes the file when dropped, so callers
    /// that move it elsewhere leave nothing behind either way.
    #[instrument(skip(self, key), fields(url = %key), level = "debug")]
    pub async fn fetch(&self, key: &CacheKey) -> Result<TempPath, PullError> {
        let url = key
            .as_str()
            .parse::<Url>()
            .map_err(|e| PullError::UrlError(format!("{key}: {e}")))?;

        info!(url = %url, "Downloading");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| PullError::Request {
                url: url.to_string(),
                source: Arc::new(e),
            })?;

        let status = response.status();
        info!(url = %url, status = %status, "Origin responded");
        if !status.is_success() {
            return Err(PullError::Status {
                url: url.to_string(),
                status,
            });
        }

        tokio::fs::create_dir_all(&self.config.temp_dir).await?;
        let temp = tempfile::Builder::new()
            .prefix(".pullcache-")
            .suffix(".part")
            .tempfile_in(&self.config.temp_dir)?;
        let (file, temp_path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        debug!(url = %url, path = ?temp_path, "Writing to temporary file");

        let mut progress = TransferProgress::new(response.content_length());
        let mut body = response.bytes_stream();

        let period = self.config.progress_interval.max(MIN_PROGRESS_INTERVAL);
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        file.write_all(&bytes).await?;
                        progress.advance(bytes.len());
                    }
                    Some(Err(e)) => {
                        return Err(PullError::Transfer {
                            url: url.to_string(),
                            source: Arc::new(e),
                        });
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    info!(url = %url, progress = %progress, "Transfer progress");
                }
            }
        }

        file.flush().await?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o644))
                .await?;
        }

        info!(url = %url, progress = %progress, path = ?temp_path, "Download complete");
        Ok(temp_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::get;
    use std::net::SocketAddr;

    async fn spawn_origin() -> SocketAddr {
        let app = Router::new()
            .route("/data.bin", get(|| async { vec![7u8; 256 * 1024] }))
            .route("/hello.txt", get(|| async { "hello origin" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn fetcher(temp_dir: &std::path::Path) -> Fetcher {
        let config = FetcherConfig::builder()
            .with_temp_dir(temp_dir)
            .with_connect_timeout(Duration::from_secs(2))
            .with_progress_interval(Duration::from_millis(10))
            .build();
        Fetcher::new(config).unwrap()
    }

    fn leftovers(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_fetch_writes_body_to_temp_file() {
        let addr = spawn_origin().await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(dir.path());

        let key = CacheKey::new(format!("http://{addr}/data.bin"));
        let temp = fetcher.fetch(&key).await.unwrap();

        assert!(temp.starts_with(dir.path()));
        let body = std::fs::read(&temp).unwrap();
        assert_eq!(body.len(), 256 * 1024);
        assert!(body.iter().all(|b| *b == 7));

        drop(temp);
        assert_eq!(leftovers(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_fetch_small_text() {
        let addr = spawn_origin().await;
        let dir = tempfile::tempdir().unwrap();
        let temp = fetcher(dir.path())
            .fetch(&CacheKey::new(format!("http://{addr}/hello.txt")))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&temp).unwrap(), "hello origin");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let addr = spawn_origin().await;
        let dir = tempfile::tempdir().unwrap();
        let err = fetcher(dir.path())
            .fetch(&CacheKey::new(format!("http://{addr}/missing")))
            .await
            .unwrap_err();

        match err {
            PullError::Status { status, .. } => assert_eq!(status, reqwest::StatusCode::NOT_FOUND),
            other => panic!("expected status error, got {other:?}"),
        }
        assert_eq!(leftovers(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dir = tempfile::tempdir().unwrap();
        let err = fetcher(dir.path())
            .fetch(&CacheKey::new(format!("http://{addr}/gone")))
            .await
            .unwrap_err();
        assert!(matches!(err, PullError::Request { .. }), "{err:?}");
        assert!(!err.is_fatal());
        assert_eq!(leftovers(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let dir = tempfile::tempdir().unwrap();
        let err = fetcher(dir.path())
            .fetch(&CacheKey::new("not a url"))
            .await
            .unwrap_err();
        assert!(matches!(err, PullError::UrlError(_)));
    }
}
