//! DNS resolution for origin fetches.
//!
//! Hostnames are looked up against a fixed upstream nameserver instead of
//! the system resolver. When this cache is deployed behind a DNS override
//! that points origin hosts at the cache itself, the system resolver would
//! send every fetch straight back here.

use std::net::SocketAddr;
use std::sync::Arc;

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tracing::debug;

use crate::FetcherConfig;

#[derive(Clone)]
pub struct UpstreamResolver {
    server: SocketAddr,
    inner: Arc<TokioAsyncResolver>,
}

impl UpstreamResolver {
    pub fn new(config: &FetcherConfig) -> Self {
        let server = config.dns_server;
        let group = NameServerConfigGroup::from_ips_clear(&[server.ip()], server.port(), true);
        let resolver_config = ResolverConfig::from_parts(None, vec![], group);

        let mut opts = ResolverOpts::default();
        opts.timeout = config.dns_timeout;

        Self {
            server,
            inner: Arc::new(TokioAsyncResolver::tokio(resolver_config, opts)),
        }
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }
}

impl std::fmt::Debug for UpstreamResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResolver")
            .field("server", &self.server)
            .finish()
    }
}

impl Resolve for UpstreamResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = Arc::clone(&self.inner);
        let server = self.server;
        Box::pin(async move {
            let lookup = resolver.lookup_ip(name.as_str()).await?;
            let ips: Vec<_> = lookup.iter().collect();
            debug!(host = name.as_str(), %server, count = ips.len(), "Resolved origin host");
            let addrs: Addrs = Box::new(ips.into_iter().map(|ip| SocketAddr::new(ip, 0)));
            Ok(addrs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::Fetcher;
    use crate::origin::CacheKey;
    use axum::Router;
    use axum::routing::get;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::net::UdpSocket;

    /// Answers every A query with `ip`; other types get an empty NOERROR.
    fn answer(query: &[u8], ip: [u8; 4]) -> Vec<u8> {
        // question = labels up to the root byte, then type and class
        let mut end = 12;
        while query[end] != 0 {
            end += 1 + query[end] as usize;
        }
        let qtype = u16::from_be_bytes([query[end + 1], query[end + 2]]);
        end += 5;

        let answers: u16 = if qtype == 1 { 1 } else { 0 };
        let mut reply = Vec::with_capacity(end + 16);
        reply.extend_from_slice(&query[..2]);
        reply.extend_from_slice(&[0x81, 0x80]);
        reply.extend_from_slice(&1u16.to_be_bytes());
        reply.extend_from_slice(&answers.to_be_bytes());
        reply.extend_from_slice(&[0, 0, 0, 0]);
        reply.extend_from_slice(&query[12..end]);
        if qtype == 1 {
            reply.extend_from_slice(&[0xC0, 0x0C, 0, 1, 0, 1, 0, 0, 0, 60, 0, 4]);
            reply.extend_from_slice(&ip);
        }
        reply
    }

    async fn spawn_nameserver(queries: Arc<AtomicUsize>) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
                queries.fetch_add(1, Ordering::SeqCst);
                let reply = answer(&buf[..len], [127, 0, 0, 1]);
                let _ = socket.send_to(&reply, peer).await;
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_fetch_resolves_through_configured_nameserver() {
        let app = Router::new().route("/x", get(|| async { "via dns" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let queries = Arc::new(AtomicUsize::new(0));
        let nameserver = spawn_nameserver(Arc::clone(&queries)).await;

        let dir = tempfile::tempdir().unwrap();
        let config = FetcherConfig::builder()
            .with_dns_server(nameserver)
            .with_dns_timeout(Duration::from_secs(2))
            .with_connect_timeout(Duration::from_secs(2))
            .with_temp_dir(dir.path())
            .build();
        let fetcher = Fetcher::new(config).unwrap();

        let key = CacheKey::new(format!("http://files.pullcache-test.com:{port}/x"));
        let temp = fetcher.fetch(&key).await.unwrap();

        assert_eq!(std::fs::read_to_string(&temp).unwrap(), "via dns");
        assert!(queries.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_resolver_uses_configured_server() {
        let config = FetcherConfig::builder()
            .with_dns_server("9.9.9.9:5353".parse().unwrap())
            .build();
        let resolver = UpstreamResolver::new(&config);
        assert_eq!(resolver.server().to_string(), "9.9.9.9:5353");
        assert!(format!("{resolver:?}").contains("9.9.9.9:5353"));
    }
}
