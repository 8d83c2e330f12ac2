//! Decision cache: memoizes a full `CheckResponse` behind a BLAKE3
//! fingerprint of the request, with TTL expiration and single-flight
//! coalescing of concurrent misses for the same fingerprint.

use crate::types::{Attributes, CheckRequest, CheckResponse, Value};
use blake3::Hasher;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            // Decisions are keyed on the full resolved-role/attribute
            // fingerprint, not just an identity pair, so staleness risk is
            // lower and reuse is higher.
            ttl: Duration::from_secs(3600),
        }
    }
}

pub type Fingerprint = [u8; 32];

#[derive(Clone)]
struct CachedEntry {
    response: CheckResponse,
    cached_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub coalesced: usize,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A decision cache keyed on a fingerprint of the principal, resource,
/// actions, and auxiliary data involved in a request.
///
/// Concurrent misses on the same fingerprint are coalesced: the first
/// caller runs `build`, subsequent callers await its result over a
/// broadcast channel rather than repeating the evaluation.
pub struct DecisionCache {
    entries: DashMap<Fingerprint, CachedEntry>,
    in_flight: DashMap<Fingerprint, broadcast::Sender<CheckResponse>>,
    config: CacheConfig,
    hits: std::sync::atomic::AtomicUsize,
    misses: std::sync::atomic::AtomicUsize,
    expirations: std::sync::atomic::AtomicUsize,
    coalesced: std::sync::atomic::AtomicUsize,
}

impl DecisionCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            config,
            hits: Default::default(),
            misses: Default::default(),
            expirations: Default::default(),
            coalesced: Default::default(),
        }
    }

    pub fn fingerprint(request: &CheckRequest) -> Fingerprint {
        let mut hasher = Hasher::new();

        hasher.update(request.principal.id.as_bytes());

        let mut roles = request.principal.roles.clone();
        roles.sort();
        for role in &roles {
            hasher.update(role.as_bytes());
        }

        hash_attributes(&mut hasher, &request.principal.attributes);
        hasher.update(request.principal.scope.as_bytes());

        hasher.update(request.resource.kind.as_bytes());
        hasher.update(request.resource.id.as_bytes());
        hash_attributes(&mut hasher, &request.resource.attributes);
        hasher.update(request.resource.scope.as_bytes());

        let mut actions = request.actions.clone();
        actions.sort();
        for action in &actions {
            hasher.update(action.as_bytes());
        }

        hash_attributes(&mut hasher, &request.aux_data);

        *hasher.finalize().as_bytes()
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<CheckResponse> {
        if let Some(entry) = self.entries.get(fingerprint) {
            if entry.is_expired(self.config.ttl) {
                drop(entry);
                self.entries.remove(fingerprint);
                self.expirations.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return None;
            }
            self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return Some(entry.response.clone());
        }
        self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        None
    }

    pub fn put(&self, fingerprint: Fingerprint, response: CheckResponse) {
        if self.entries.len() >= self.config.capacity {
            self.evict_oldest();
        }
        self.entries.insert(
            fingerprint,
            CachedEntry {
                response,
                cached_at: Instant::now(),
            },
        );
    }

    /// Returns a cached response if present, otherwise runs `build` exactly
    /// once per fingerprint even under concurrent callers: the first caller
    /// to observe a miss registers itself as the in-flight builder, and
    /// every other caller that arrives while the build is running awaits
    /// the same result instead of repeating the work.
    pub async fn get_or_build<F, Fut>(&self, request: &CheckRequest, build: F) -> CheckResponse
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CheckResponse>,
    {
        let fingerprint = Self::fingerprint(request);

        if let Some(cached) = self.get(&fingerprint) {
            return cached;
        }

        let (tx, became_leader) = match self.in_flight.entry(fingerprint) {
            dashmap::mapref::entry::Entry::Occupied(entry) => (entry.get().clone(), false),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let (tx, _rx) = broadcast::channel(1);
                entry.insert(tx.clone());
                (tx, true)
            }
        };

        if !became_leader {
            self.coalesced.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            let mut rx = tx.subscribe();
            if let Ok(response) = rx.recv().await {
                return response;
            }
            // Leader panicked or dropped its sender without broadcasting;
            // fall through and compute the result ourselves.
        }

        let response = build().await;
        self.put(fingerprint, response.clone());
        self.in_flight.remove(&fingerprint);
        let _ = tx.send(response.clone());
        response
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.hits.store(0, std::sync::atomic::Ordering::Relaxed);
        self.misses.store(0, std::sync::atomic::Ordering::Relaxed);
        self.expirations.store(0, std::sync::atomic::Ordering::Relaxed);
        self.coalesced.store(0, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(std::sync::atomic::Ordering::Relaxed),
            misses: self.misses.load(std::sync::atomic::Ordering::Relaxed),
            expirations: self.expirations.load(std::sync::atomic::Ordering::Relaxed),
            coalesced: self.coalesced.load(std::sync::atomic::Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    fn evict_oldest(&self) {
        let to_remove = (self.config.capacity / 10).max(1);
        let mut removed = 0;
        self.entries.retain(|_, _| {
            if removed < to_remove {
                removed += 1;
                false
            } else {
                true
            }
        });
    }
}

fn hash_attributes(hasher: &mut Hasher, attrs: &Attributes) {
    let mut entries: Vec<_> = attrs.iter().collect();
    entries.sort_by_key(|(k, _)| k.as_str());
    for (k, v) in entries {
        hasher.update(k.as_bytes());
        hash_value(hasher, v);
    }
}

fn hash_value(hasher: &mut Hasher, value: &Value) {
    match value {
        Value::Null => hasher.update(b"null"),
        Value::Bool(b) => hasher.update(&[*b as u8]),
        Value::Int(i) => hasher.update(&i.to_le_bytes()),
        Value::Float(f) => hasher.update(&f.to_le_bytes()),
        Value::String(s) => hasher.update(s.as_bytes()),
        Value::Array(items) => {
            for item in items {
                hash_value(hasher, item);
            }
            hasher.update(b"]")
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by_key(|(k, _)| k.as_str());
            for (k, v) in entries {
                hasher.update(k.as_bytes());
                hash_value(hasher, v);
            }
            hasher.update(b"}")
        }
    };
}
