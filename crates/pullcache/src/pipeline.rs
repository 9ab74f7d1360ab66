//! The work a download task performs: fetch the origin resource, then place
//! it into the cache tree.

use async_trait::async_trait;
use tracing::info;

use crate::error::PullError;
use crate::fetcher::Fetcher;
use crate::origin::{CacheKey, CachePath};
use crate::placer::Placer;

#[async_trait]
pub trait Pipeline: Send + Sync + 'static {
    async fn run(&self, key: &CacheKey, path: &CachePath) -> Result<(), PullError>;
}

/// Fetch from the origin and place the result at the cache path
#[derive(Debug, Clone)]
pub struct OriginPull {
    fetcher: Fetcher,
    placer: Placer,
}

impl OriginPull {
    pub fn new(fetcher: Fetcher, placer: Placer) -> Self {
        Self { fetcher, placer }
    }
}

#[async_trait]
impl Pipeline for OriginPull {
    async fn run(&self, key: &CacheKey, path: &CachePath) -> Result<(), PullError> {
        let temp = self.fetcher.fetch(key).await?;

        let placer = self.placer;
        let dest = path.as_path().to_path_buf();
        // The temp file is dropped (and removed if still present) on the
        // blocking thread once placement is done.
        tokio::task::spawn_blocking(move || placer.place(&temp, &dest))
            .await
            .map_err(|e| PullError::Aborted(e.to_string()))??;

        info!(url = %key, path = %path, "Cached origin resource");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FetcherConfig;
    use crate::origin::resolve;
    use axum::Router;
    use axum::routing::get;

    #[tokio::test]
    async fn test_origin_pull_places_file() {
        let app = Router::new().route("/pub/file.txt", get(|| async { "from origin" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let cache = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(FetcherConfig::builder().with_temp_dir(temp.path()).build())
            .unwrap();
        let pull = OriginPull::new(fetcher, Placer::new());

        let origin = resolve(cache.path(), &addr.to_string(), "/pub/file.txt", None).unwrap();
        pull.run(&origin.key, &origin.path).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(origin.path.as_path()).unwrap(),
            "from origin"
        );
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_origin_pull_failure_places_nothing() {
        let app = Router::new();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let cache = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(FetcherConfig::builder().with_temp_dir(temp.path()).build())
            .unwrap();
        let pull = OriginPull::new(fetcher, Placer::new());

        let origin = resolve(cache.path(), &addr.to_string(), "/nope.bin", None).unwrap();
        let err = pull.run(&origin.key, &origin.path).await.unwrap_err();
        assert!(matches!(err, PullError::Status { .. }));
        assert!(!origin.path.as_path().exists());
    }
}
