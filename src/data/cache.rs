//! Key-value cache
//!
//! Components never reach for a global cache; they receive an
//! `Arc<dyn KeyValueCache>` at construction. The production implementation
//! is an in-process Moka cache with a TTL carried by each entry.

use async_trait::async_trait;
use futures::future::BoxFuture;
use moka::Expiry;
use moka::future::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::AppError;
use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};

/// Cache operations shared by every component
///
/// Each operation is atomic on its own; nothing here combines operations.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Read a live entry
    async fn get(&self, key: &str) -> Option<Value>;

    /// Store an entry for `ttl`, replacing any previous value
    async fn put(&self, key: &str, value: Value, ttl: Duration);

    /// Cache-aside read
    ///
    /// Returns the live entry, or runs `init`, stores its value for `ttl` and
    /// returns it. Concurrent callers missing on the same key share a single
    /// `init` run. Errors from `init` are returned and nothing is stored. A
    /// `forget` issued while `init` is running wins: the filled value is
    /// returned to the callers but not kept.
    async fn remember(
        &self,
        key: &str,
        ttl: Duration,
        init: BoxFuture<'_, Result<Value, AppError>>,
    ) -> Result<Value, AppError>;

    /// Drop an entry
    async fn forget(&self, key: &str);
}

/// Typed wrapper over [`KeyValueCache::get`]
///
/// Entries that no longer deserialize into `T` are treated as misses.
pub async fn get_as<T>(cache: &dyn KeyValueCache, key: &str) -> Option<T>
where
    T: DeserializeOwned,
{
    let value = cache.get(key).await?;
    match serde_json::from_value(value) {
        Ok(typed) => Some(typed),
        Err(error) => {
            tracing::warn!(%key, %error, "Discarding cache entry with unexpected shape");
            None
        }
    }
}

/// Typed wrapper over [`KeyValueCache::put`]
pub async fn put_as<T>(
    cache: &dyn KeyValueCache,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), AppError>
where
    T: Serialize,
{
    cache.put(key, serde_json::to_value(value)?, ttl).await;
    Ok(())
}

/// Typed wrapper over [`KeyValueCache::remember`]
pub async fn remember_as<T, F>(
    cache: &dyn KeyValueCache,
    key: &str,
    ttl: Duration,
    init: F,
) -> Result<T, AppError>
where
    T: Serialize + DeserializeOwned + Send,
    F: Future<Output = Result<T, AppError>> + Send,
{
    let value = cache
        .remember(
            key,
            ttl,
            Box::pin(async move {
                let typed = init.await?;
                Ok(serde_json::to_value(typed)?)
            }),
        )
        .await?;

    Ok(serde_json::from_value(value)?)
}

// =============================================================================
// Moka implementation
// =============================================================================

#[derive(Debug, Clone)]
struct CachedValue {
    value: Value,
    ttl: Duration,
}

/// Expires each entry after the TTL it was stored with
struct PerEntryTtl;

impl Expiry<String, CachedValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache backed by Moka
///
/// Entries are volatile and cleared on restart.
pub struct MokaCache {
    entries: Cache<String, CachedValue>,
    /// Bumped by every `forget`. A fill overlapping any `forget` is not
    /// kept, which may cost an extra miss on an unrelated key.
    generation: AtomicU64,
}

/// Label used for hit/miss metrics
const CACHE_LABEL: &str = "kv";

impl MokaCache {
    /// Create a cache holding at most `max_capacity` entries
    pub fn new(max_capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self {
            entries,
            generation: AtomicU64::new(0),
        }
    }

    fn record(&self, hit: bool) {
        if hit {
            CACHE_HITS_TOTAL.with_label_values(&[CACHE_LABEL]).inc();
        } else {
            CACHE_MISSES_TOTAL.with_label_values(&[CACHE_LABEL]).inc();
        }
    }
}

#[async_trait]
impl KeyValueCache for MokaCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let result = self.entries.get(key).await.map(|cached| cached.value);
        self.record(result.is_some());
        result
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) {
        self.entries
            .insert(key.to_string(), CachedValue { value, ttl })
            .await;
    }

    async fn remember(
        &self,
        key: &str,
        ttl: Duration,
        init: BoxFuture<'_, Result<Value, AppError>>,
    ) -> Result<Value, AppError> {
        // Moka hands every waiter a shared copy of the error; the caller that
        // ran `init` gets its own error back untouched.
        let own_error: Mutex<Option<AppError>> = Mutex::new(None);
        let slot = &own_error;
        let generation = self.generation.load(Ordering::Acquire);

        let entry = self
            .entries
            .entry(key.to_string())
            .or_try_insert_with(async move {
                match init.await {
                    Ok(value) => Ok(CachedValue { value, ttl }),
                    Err(error) => {
                        let shared = detach(&error);
                        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
                        Err(shared)
                    }
                }
            })
            .await
            .map_err(|shared: Arc<AppError>| {
                own_error
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take()
                    .unwrap_or_else(|| detach(&shared))
            })?;

        self.record(!entry.is_fresh());
        if entry.is_fresh() && self.generation.load(Ordering::Acquire) != generation {
            tracing::debug!(%key, "Discarding cache fill raced by an invalidation");
            self.entries.invalidate(key).await;
        }
        Ok(entry.into_value().value)
    }

    async fn forget(&self, key: &str) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.invalidate(key).await;
    }
}

/// Owned copy of an error shared between coalesced callers
///
/// Variants carrying only plain data keep their kind and status; the rest
/// become `Internal` with the same message.
fn detach(shared: &AppError) -> AppError {
    match shared {
        AppError::NotFound => AppError::NotFound,
        AppError::Disabled(status) => AppError::Disabled(*status),
        AppError::Validation(message) => AppError::Validation(message.clone()),
        AppError::Gone(message) => AppError::Gone(message.clone()),
        AppError::Config(message) => AppError::Config(message.clone()),
        AppError::Database(_) | AppError::Serialization(_) | AppError::Internal(_) => {
            AppError::Internal(anyhow::anyhow!("{shared}"))
        }
    }
}
