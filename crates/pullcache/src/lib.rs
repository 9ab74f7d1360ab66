//! # Pullcache engine
//!
//! Building blocks of an origin-pull file cache: a request is mapped to an
//! origin URL and a file under the cache root; on a miss a single background
//! task per origin URL downloads the file and moves it into place.
//!
//! ## Features
//!
//! - Path traversal checks and origin/cache-path resolution
//! - Downloads resolved through a dedicated upstream nameserver
//! - Atomic placement with a cross-device copy fallback
//! - Per-URL task deduplication with exactly-once cleanup
//! - Pluggable failure policy for placement errors

pub mod builder;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod origin;
pub mod pipeline;
pub mod placer;
pub mod progress;
pub mod resolver;
pub mod task;

pub use builder::FetcherConfigBuilder;
pub use config::{FailurePolicy, FetcherConfig};
pub use error::{PlaceError, PullError};
pub use fetcher::{Fetcher, create_client};
pub use filter::Filters;
pub use origin::{CacheKey, CachePath, Origin, OriginError, contains_dot_dot, resolve};
pub use pipeline::{OriginPull, Pipeline};
pub use placer::Placer;
pub use progress::TransferProgress;
pub use task::{Supervisor, TaskCompletion, TaskManager, TaskOutcome};
