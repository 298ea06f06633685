use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{AuthError, Credential, Identity, IdentityService};

/// Cache key: SHA-256 of the credential, so plaintext never sits in the cache
type CacheKey = [u8; 32];

#[derive(Debug, Clone)]
struct CachedIdentity {
    identity: Identity,
    expires_at: Instant,
}

impl CachedIdentity {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Credential validator with a positive-result TTL cache
///
/// Failed validations are never cached: a rejected or unverifiable
/// credential goes back to the identity service on every attempt.
pub struct CredentialValidator {
    service: Arc<dyn IdentityService>,
    cache: Cache<CacheKey, Arc<CachedIdentity>>,
    ttl: Duration,
}

impl std::fmt::Debug for CredentialValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialValidator")
            .field("service", &self.service.service_name())
            .field("ttl", &self.ttl)
            .field("cached", &self.cache.entry_count())
            .finish()
    }
}

impl CredentialValidator {
    pub fn new(service: Arc<dyn IdentityService>, ttl: Duration) -> Self {
        Self::with_capacity(service, ttl, 10_000)
    }

    pub fn with_capacity(service: Arc<dyn IdentityService>, ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(capacity)
            .build();

        Self {
            service,
            cache,
            ttl,
        }
    }

    /// Resolve a credential, serving unexpired cache entries without a round trip
    pub async fn validate(&self, credential: &Credential) -> Result<Identity, AuthError> {
        let key = credential.digest();

        if let Some(cached) = self.cache.get(&key).await {
            if !cached.is_expired() {
                debug!(
                    api_key_id = cached.identity.api_key_id().unwrap_or(""),
                    "Auth cache hit"
                );
                return Ok(cached.identity.clone());
            }

            self.cache.invalidate(&key).await;
        }

        debug!(
            service = self.service.service_name(),
            fingerprint = %credential.fingerprint(),
            "Auth cache miss, validating credential"
        );

        match self.service.resolve(credential).await {
            Ok(identity) => {
                let entry = CachedIdentity {
                    identity: identity.clone(),
                    expires_at: Instant::now() + self.ttl,
                };
                self.cache.insert(key, Arc::new(entry)).await;

                info!(
                    api_key_id = identity.api_key_id().unwrap_or(""),
                    identity_id = identity.identity_id().unwrap_or(""),
                    "Credential validated"
                );
                Ok(identity)
            }
            Err(e) => {
                warn!(
                    fingerprint = %credential.fingerprint(),
                    error = %e,
                    "Credential validation failed"
                );
                Err(e)
            }
        }
    }

    /// Discard expired entries; returns how many were removed
    pub async fn sweep(&self) -> usize {
        let expired: Vec<CacheKey> = self
            .cache
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| *key)
            .collect();

        for key in &expired {
            self.cache.invalidate(key).await;
        }
        self.cache.run_pending_tasks().await;

        if !expired.is_empty() {
            debug!(entries_removed = expired.len(), "Cleaned auth cache");
        }

        expired.len()
    }

    /// Spawn a task that sweeps the cache every `every`
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let validator = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                validator.sweep().await;
            }
        })
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
        info!("Auth cache cleared");
    }

    pub fn cache_size(&self) -> u64 {
        self.cache.entry_count()
    }
}
