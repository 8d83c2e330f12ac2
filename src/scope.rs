//! Hierarchical, dot-separated policy scopes.
//!
//! A scope such as `"acme.corp.eng"` describes a position in an
//! organizational hierarchy. A policy scoped to `"acme.corp"` applies to any
//! request whose effective scope is `"acme.corp"` itself or a descendant of
//! it (`"acme.corp.eng"`, `"acme.corp.eng.platform"`, ...); the unscoped
//! (empty) scope is the ancestor of everything. Catalog lookups walk from
//! the request's scope up to the root and keep the most specific match, so
//! scope matching here is pure ancestor-path comparison — no wildcard
//! syntax, unlike action/role matching.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("scope segment '{0}' contains invalid characters")]
    InvalidSegment(String),
    #[error("scope has an empty segment")]
    EmptySegment,
}

pub type ScopeResult<T> = std::result::Result<T, ScopeError>;

/// A validated, dot-separated scope path. The empty scope (`segments` is
/// empty) is the root and is an ancestor of every other scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scope {
    segments: Vec<String>,
}

impl Scope {
    pub fn root() -> Self {
        Self { segments: Vec::new() }
    }

    pub fn parse(raw: &str) -> ScopeResult<Self> {
        if raw.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for segment in raw.split('.') {
            if segment.is_empty() {
                return Err(ScopeError::EmptySegment);
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
            {
                return Err(ScopeError::InvalidSegment(segment.to_string()));
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    pub fn as_str_owned(&self) -> String {
        self.segments.join(".")
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn parent(&self) -> Option<Scope> {
        if self.segments.is_empty() {
            None
        } else {
            Some(Scope {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        }
    }

    /// True if `self` is an ancestor of, or equal to, `other` — i.e. `self`
    /// would apply to a request scoped at `other`.
    pub fn is_ancestor_or_equal(&self, other: &Scope) -> bool {
        self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(other.segments.iter()).all(|(a, b)| a == b)
    }

    /// The chain of scopes from the root down to and including `self`,
    /// e.g. `"acme.corp.eng"` -> `["", "acme", "acme.corp", "acme.corp.eng"]`.
    /// Used to enumerate every scope level a catalog lookup must consult,
    /// most-specific last.
    pub fn ancestor_chain(&self) -> Vec<Scope> {
        let mut chain = Vec::with_capacity(self.segments.len() + 1);
        chain.push(Scope::root());
        for n in 1..=self.segments.len() {
            chain.push(Scope {
                segments: self.segments[..n].to_vec(),
            });
        }
        chain
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str_owned())
    }
}

impl std::str::FromStr for Scope {
    type Err = ScopeError;
    fn from_str(s: &str) -> ScopeResult<Self> {
        Scope::parse(s)
    }
}

impl TryFrom<String> for Scope {
    type Error = ScopeError;
    fn try_from(value: String) -> ScopeResult<Self> {
        Scope::parse(&value)
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.as_str_owned()
    }
}

#[derive(Clone)]
struct CacheEntry {
    chain: Arc<Vec<Scope>>,
    cached_at: Instant,
}

/// Caches ancestor-chain computations, since a loaded catalog resolves the
/// same handful of request scopes over and over.
pub struct ScopeResolver {
    cache: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl Default for ScopeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeResolver {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
            ttl: Duration::from_secs(60),
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: DashMap::new(),
            ttl,
        }
    }

    pub fn ancestor_chain(&self, scope: &Scope) -> Arc<Vec<Scope>> {
        let key = scope.as_str_owned();
        if let Some(entry) = self.cache.get(&key) {
            if entry.cached_at.elapsed() <= self.ttl {
                return Arc::clone(&entry.chain);
            }
        }
        let chain = Arc::new(scope.ancestor_chain());
        self.cache.insert(
            key,
            CacheEntry {
                chain: Arc::clone(&chain),
                cached_at: Instant::now(),
            },
        );
        chain
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}
