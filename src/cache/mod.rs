// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0
//! # Credential cache
//!
//! Bounds calls to upstream token services by memoizing issued credentials
//! per (provider, principal, scope) key until their refresh threshold
//! (expiry minus the configured safety margin) passes. Entries past the
//! threshold are dropped lazily on lookup, so no background sweep is
//! needed; the request that trips over a stale entry pays the full
//! issuance latency.
//!
//! Concurrent requests for the same key collapse into a single upstream
//! issuance. The first requester installs a key-scoped in-flight ticket (a
//! `tokio::sync::watch` channel) and spawns the issuance onto a detached
//! task; every caller, the leader included, awaits the ticket. The result,
//! success or failure, is broadcast to all waiters, and an RAII guard
//! removes the ticket on every exit path so an aborted issuance can never
//! wedge the key. Because the issuance task is detached, a caller that
//! abandons its request only gives up its own wait; the shared work runs to
//! completion and populates the cache for everyone else.
//!
//! No lock is ever held across the upstream call: the entry map and the
//! in-flight map have their own short critical sections.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::common::types::ProviderKind;
use crate::issuer::error::IssuerError;
use crate::issuer::types::VendedCredential;
use crate::scope::AccessScope;

type IssueResult = Result<VendedCredential, IssuerError>;
type InFlightSender = Arc<watch::Sender<Option<IssueResult>>>;

/// Cache key over the canonicalized scope.
///
/// Two requests for the same grant hash identically regardless of prefix
/// ordering or slashes in the catalog metadata.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CacheKey {
    provider: ProviderKind,
    principal: String,
    scope: AccessScope,
}

impl CacheKey {
    pub fn new(principal: impl Into<String>, scope: &AccessScope) -> Self {
        let mut scope = scope.clone();
        scope.canonicalize();
        Self {
            provider: scope.provider,
            principal: principal.into(),
            scope,
        }
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    credential: VendedCredential,
    /// The entry stops being servable at this instant, strictly before the
    /// credential itself expires.
    refresh_at: DateTime<Utc>,
}

/// Bounded credential cache with single-flight issuance.
///
/// Intentionally not `Clone`; share it via `Arc`, construct it at service
/// start and [`clear`](Self::clear) it at shutdown.
pub struct CredentialCache {
    entries: RwLock<LruCache<CacheKey, CacheEntry>>,
    in_flight: Mutex<HashMap<CacheKey, InFlightSender>>,
    safety_margin: TimeDelta,
}

impl CredentialCache {
    pub fn new(capacity: NonZeroUsize, safety_margin: TimeDelta) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
            safety_margin,
        }
    }

    /// Look up a credential, dropping the entry if its refresh threshold
    /// has passed.
    ///
    /// A hit promotes the entry to most-recently-used.
    pub fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<VendedCredential> {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if entry.refresh_at > now => Some(entry.credential.clone()),
            Some(_) => {
                trace!(provider = %key.provider, "dropping entry past refresh threshold");
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    /// Store a credential; its refresh threshold is expiry minus the safety
    /// margin. Overwrites any previous entry for the key.
    pub fn put(&self, key: CacheKey, credential: VendedCredential) {
        let refresh_at = credential.expires_at - self.safety_margin;
        self.entries.write().put(
            key,
            CacheEntry {
                credential,
                refresh_at,
            },
        );
    }

    pub fn invalidate(&self, key: &CacheKey) {
        self.entries.write().pop(key);
    }

    pub fn clear(&self) {
        debug!("clearing credential cache");
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Return the cached credential for the key or run `issue` exactly once
    /// across all concurrent callers of the same key.
    ///
    /// Every caller receives the same credential or the same failure. The
    /// issuance runs on a detached task, so cancelling an individual caller
    /// never cancels the shared exchange.
    pub async fn get_or_issue<F>(
        self: &Arc<Self>,
        key: CacheKey,
        now: DateTime<Utc>,
        issue: F,
    ) -> IssueResult
    where
        F: Future<Output = IssueResult> + Send + 'static,
    {
        let mut issue = Some(issue);
        loop {
            if let Some(hit) = self.get(&key, now) {
                return Ok(hit);
            }

            let flight = {
                let mut in_flight = self.in_flight.lock();
                match in_flight.get(&key) {
                    Some(tx) => Flight::Follower(tx.subscribe()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        let tx = Arc::new(tx);
                        in_flight.insert(key.clone(), tx.clone());
                        Flight::Leader(tx, rx)
                    }
                }
            };

            let mut rx = match flight {
                Flight::Leader(tx, rx) => {
                    let Some(fut) = issue.take() else {
                        // This caller already led an issuance that was torn
                        // down; it has nothing left to run.
                        self.in_flight.lock().remove(&key);
                        return Err(IssuerError::Interrupted);
                    };
                    trace!("leading issuance for key");
                    let guard = InFlightGuard {
                        key: key.clone(),
                        cache: Arc::clone(self),
                        tx,
                        finished: false,
                    };
                    tokio::spawn(async move {
                        let result = fut.await;
                        guard.finish(result);
                    });
                    rx
                }
                Flight::Follower(rx) => {
                    trace!("awaiting in-flight issuance for key");
                    rx
                }
            };

            match await_settled(&mut rx).await {
                Some(result) => return result,
                // The ticket closed without a result: the issuance task was
                // torn down before settling. Retry from the top.
                None => continue,
            }
        }
    }
}

enum Flight {
    Leader(InFlightSender, watch::Receiver<Option<IssueResult>>),
    Follower(watch::Receiver<Option<IssueResult>>),
}

async fn await_settled(rx: &mut watch::Receiver<Option<IssueResult>>) -> Option<IssueResult> {
    loop {
        let settled = rx.borrow_and_update().clone();
        if settled.is_some() {
            return settled;
        }
        if rx.changed().await.is_err() {
            return rx.borrow().clone();
        }
    }
}

/// RAII guard preventing orphaned in-flight tickets.
///
/// If the issuance task is torn down mid-exchange the guard removes the
/// ticket, dropping the last sender; waiters observe channel closure and
/// retry instead of hanging forever.
struct InFlightGuard {
    key: CacheKey,
    cache: Arc<CredentialCache>,
    tx: InFlightSender,
    finished: bool,
}

impl InFlightGuard {
    fn finish(mut self, result: IssueResult) {
        // Write through before broadcasting, then send before removing the
        // ticket so late subscribers still observe the result.
        if let Ok(credential) = &result {
            self.cache.put(self.key.clone(), credential.clone());
        }
        let _ = self.tx.send(Some(result));
        self.cache.in_flight.lock().remove(&self.key);
        self.finished = true;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.cache.in_flight.lock().remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::issuer::error::UpstreamError;
    use crate::issuer::types::{CredentialPayload, S3SessionCredential};
    use crate::scope::OperationSet;

    fn capacity(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn scope(prefix: &str) -> AccessScope {
        AccessScope {
            provider: ProviderKind::S3,
            bucket: "lake".into(),
            prefixes: vec![prefix.into()],
            operations: OperationSet::ReadOnly,
            allow_delete: false,
            encryption_key_id: None,
        }
    }

    fn credential(session_token: &str, expires_at: DateTime<Utc>) -> VendedCredential {
        VendedCredential {
            provider: ProviderKind::S3,
            payload: CredentialPayload::S3(S3SessionCredential {
                access_key_id: "ASIAEXAMPLE".into(),
                secret_access_key: "secret".into(),
                session_token: session_token.into(),
            }),
            expires_at,
            scope: scope("orders/"),
        }
    }

    fn cache(capacity_entries: usize, margin_secs: i64) -> Arc<CredentialCache> {
        Arc::new(CredentialCache::new(
            capacity(capacity_entries),
            TimeDelta::seconds(margin_secs),
        ))
    }

    #[test]
    fn test_hit_before_threshold_is_bit_identical() {
        let cache = cache(16, 300);
        let now = Utc::now();
        let issued = credential("token-1", now + TimeDelta::seconds(3600));
        let key = CacheKey::new("svc-etl", &scope("orders/"));

        cache.put(key.clone(), issued.clone());
        let first = cache.get(&key, now).unwrap();
        let second = cache.get(&key, now).unwrap();
        assert_eq!(first.payload, issued.payload);
        assert_eq!(first.payload, second.payload);
    }

    #[test]
    fn test_entry_past_threshold_is_a_miss() {
        let cache = cache(16, 300);
        let now = Utc::now();
        let key = CacheKey::new("svc-etl", &scope("orders/"));
        cache.put(key.clone(), credential("token-1", now + TimeDelta::seconds(3600)));

        // Threshold is expiry - 300s; a lookup one second past it misses.
        let past_threshold = now + TimeDelta::seconds(3301);
        assert!(cache.get(&key, past_threshold).is_none());
        // The stale entry is dropped, not merely skipped.
        assert!(cache.is_empty());
    }

    #[test]
    fn test_key_canonicalization_collapses_equivalent_scopes() {
        let cache = cache(16, 300);
        let now = Utc::now();

        let mut shuffled = scope("orders/");
        shuffled.prefixes = vec!["/orders/".into(), "orders/".into()];
        let canonical = CacheKey::new("svc-etl", &scope("orders/"));
        let from_shuffled = CacheKey::new("svc-etl", &shuffled);
        assert_eq!(canonical, from_shuffled);

        cache.put(canonical, credential("token-1", now + TimeDelta::seconds(3600)));
        assert!(cache.get(&from_shuffled, now).is_some());
    }

    #[test]
    fn test_lru_eviction_under_capacity_pressure() {
        let cache = cache(2, 300);
        let now = Utc::now();
        let expires = now + TimeDelta::seconds(3600);
        let key_a = CacheKey::new("svc-etl", &scope("a/"));
        let key_b = CacheKey::new("svc-etl", &scope("b/"));
        let key_c = CacheKey::new("svc-etl", &scope("c/"));

        cache.put(key_a.clone(), credential("a", expires));
        cache.put(key_b.clone(), credential("b", expires));
        // Touch a so that b is the least recently used.
        cache.get(&key_a, now);
        cache.put(key_c.clone(), credential("c", expires));

        assert!(cache.get(&key_a, now).is_some());
        assert!(cache.get(&key_b, now).is_none());
        assert!(cache.get(&key_c, now).is_some());
    }

    #[test]
    fn test_put_reflects_most_recent_issuance() {
        let cache = cache(16, 300);
        let now = Utc::now();
        let key = CacheKey::new("svc-etl", &scope("orders/"));

        cache.put(key.clone(), credential("old", now + TimeDelta::seconds(3600)));
        cache.put(key.clone(), credential("new", now + TimeDelta::seconds(3600)));

        let hit = cache.get(&key, now).unwrap();
        assert_eq!(
            hit.payload,
            credential("new", now + TimeDelta::seconds(3600)).payload
        );
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = cache(16, 300);
        let now = Utc::now();
        let key = CacheKey::new("svc-etl", &scope("orders/"));
        cache.put(key.clone(), credential("token", now + TimeDelta::seconds(3600)));

        cache.invalidate(&key);
        assert!(cache.get(&key, now).is_none());

        cache.put(key.clone(), credential("token", now + TimeDelta::seconds(3600)));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_issue_exactly_once() {
        let cache = cache(16, 300);
        let now = Utc::now();
        let key = CacheKey::new("svc-etl", &scope("orders/"));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut waiters = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            let calls = Arc::clone(&calls);
            waiters.push(tokio::spawn(async move {
                cache
                    .get_or_issue(key, now, async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(credential("shared", Utc::now() + TimeDelta::seconds(3600)))
                    })
                    .await
            }));
        }

        let mut payloads = Vec::new();
        for waiter in waiters {
            payloads.push(waiter.await.unwrap().unwrap().payload);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1, "single-flight violated");
        assert!(payloads.windows(2).all(|pair| pair[0] == pair[1]));
        // The shared issuance wrote through.
        assert!(cache.get(&key, now).is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failure_is_broadcast_to_all_waiters() {
        let cache = cache(16, 300);
        let now = Utc::now();
        let key = CacheKey::new("svc-etl", &scope("orders/"));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut waiters = Vec::new();
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            let calls = Arc::clone(&calls);
            waiters.push(tokio::spawn(async move {
                cache
                    .get_or_issue(key, now, async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Err(IssuerError::Upstream {
                            provider: ProviderKind::S3,
                            source: UpstreamError::Throttled,
                        })
                    })
                    .await
            }));
        }

        for waiter in waiters {
            match waiter.await.unwrap() {
                Err(IssuerError::Upstream {
                    source: UpstreamError::Throttled,
                    ..
                }) => {}
                other => panic!("expected the shared throttling failure, got {other:?}"),
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Failures are not cached.
        assert!(cache.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_abandoned_caller_does_not_abort_shared_issuance() {
        let cache = cache(16, 300);
        let now = Utc::now();
        let key = CacheKey::new("svc-etl", &scope("orders/"));
        let follower_calls = Arc::new(AtomicUsize::new(0));

        let leader = {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            tokio::spawn(async move {
                cache
                    .get_or_issue(key, now, async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(credential("shared", Utc::now() + TimeDelta::seconds(3600)))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let follower = {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            let follower_calls = Arc::clone(&follower_calls);
            tokio::spawn(async move {
                cache
                    .get_or_issue(key, now, async move {
                        follower_calls.fetch_add(1, Ordering::SeqCst);
                        Ok(credential("follower", Utc::now() + TimeDelta::seconds(3600)))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // The leading caller walks away; the detached issuance keeps going.
        leader.abort();

        let delivered = follower.await.unwrap().unwrap();
        assert_eq!(
            delivered.payload,
            credential("shared", Utc::now() + TimeDelta::seconds(3600)).payload
        );
        assert_eq!(follower_calls.load(Ordering::SeqCst), 0);
        assert!(cache.get(&key, now).is_some());
    }

    #[tokio::test]
    async fn test_cached_hit_short_circuits_issuance() {
        let cache = cache(16, 300);
        let now = Utc::now();
        let key = CacheKey::new("svc-etl", &scope("orders/"));
        cache.put(key.clone(), credential("cached", now + TimeDelta::seconds(3600)));

        let calls = Arc::new(AtomicUsize::new(0));
        let issue_calls = Arc::clone(&calls);
        let hit = cache
            .get_or_issue(key, now, async move {
                issue_calls.fetch_add(1, Ordering::SeqCst);
                Ok(credential("fresh", Utc::now() + TimeDelta::seconds(3600)))
            })
            .await
            .unwrap();
        assert_eq!(
            hit.payload,
            credential("cached", now + TimeDelta::seconds(3600)).payload
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
