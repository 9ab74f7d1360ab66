//! # Origin resolution
//!
//! Maps an inbound request (Host header plus request target) onto the two
//! identities the cache works with: the upstream URL it would be pulled
//! from ([`CacheKey`]) and the file it lives at on disk ([`CachePath`]).

use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Canonical upstream URL of a cached resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Location of a cached resource, always below the cache root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CachePath(PathBuf);

impl CachePath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for CachePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for CachePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OriginError {
    #[error("path contains a parent directory segment: {0}")]
    Traversal(String),

    #[error("path is not valid: {0}")]
    InvalidPath(String),

    #[error("host header missing or invalid: {0:?}")]
    InvalidHost(String),
}

/// A request mapped onto the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub key: CacheKey,
    pub path: CachePath,
}

fn is_slash(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Reports whether any `/`- or `\`-separated segment of `path` is `..`.
pub fn contains_dot_dot(path: &str) -> bool {
    if !path.contains("..") {
        return false;
    }
    path.split(is_slash).any(|segment| segment == "..")
}

fn is_slash_byte(b: &u8) -> bool {
    *b == b'/' || *b == b'\\'
}

#[cfg(unix)]
fn segment_os_str(segment: &[u8]) -> Option<&OsStr> {
    use std::os::unix::ffi::OsStrExt;
    Some(OsStr::from_bytes(segment))
}

#[cfg(not(unix))]
fn segment_os_str(segment: &[u8]) -> Option<&OsStr> {
    std::str::from_utf8(segment).ok().map(OsStr::new)
}

fn valid_host(host: &str) -> bool {
    !host.is_empty()
        && !host
            .chars()
            .any(|c| is_slash(c) || c == '@' || c == '?' || c == '#' || c.is_whitespace())
}

/// Maps the request target onto the cache tree rooted at `root`.
///
/// `path` is the raw (still percent-encoded) request path and `query` the
/// raw query string, if any. The key keeps the raw form; the file path uses
/// the decoded bytes, which need not be UTF-8.
pub fn resolve(
    root: &Path,
    host: &str,
    path: &str,
    query: Option<&str>,
) -> Result<Origin, OriginError> {
    if contains_dot_dot(path) {
        return Err(OriginError::Traversal(path.to_string()));
    }

    let decoded: Vec<u8> = percent_decode_str(path).collect();
    if decoded.split(is_slash_byte).any(|segment| segment == b"..") {
        return Err(OriginError::Traversal(path.to_string()));
    }
    if decoded.contains(&0) {
        return Err(OriginError::InvalidPath(path.to_string()));
    }

    if !valid_host(host) {
        return Err(OriginError::InvalidHost(host.to_string()));
    }

    let mut file = root.to_path_buf();
    for segment in decoded
        .split(|b| *b == b'/')
        .filter(|s| !s.is_empty() && *s != b".")
    {
        let segment =
            segment_os_str(segment).ok_or_else(|| OriginError::InvalidPath(path.to_string()))?;
        // Drive prefixes and root markers must never make it into a join.
        if !Path::new(segment)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(OriginError::InvalidPath(path.to_string()));
        }
        file.push(segment);
    }

    let url = match query {
        Some(q) if !q.is_empty() => format!("http://{host}{path}?{q}"),
        _ => format!("http://{host}{path}"),
    };

    Ok(Origin {
        key: CacheKey(url),
        path: CachePath(file),
    })
}
