use crate::error::SchemaError;
use crate::schema::{PropertySchema, SchemaKey};
use crate::traits::SchemaSource;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, error};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type SchemaList = Arc<Vec<PropertySchema>>;

type SharedFetch = Shared<BoxFuture<'static, Result<SchemaList, SchemaError>>>;

enum CacheEntry {
    Ready(SchemaList),
    InFlight { fetch_id: u64, fetch: SharedFetch },
}

/// Schema lookups keyed by (resource type, cloud provider, context).
///
/// Successful responses are kept until `invalidate`/`clear`. Failures are not
/// cached. Callers asking for a key that is already being fetched wait on the
/// same request.
pub struct SchemaCache {
    source: Arc<dyn SchemaSource>,
    entries: Mutex<HashMap<SchemaKey, CacheEntry>>,
    next_fetch_id: AtomicU64,
}

impl SchemaCache {
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        Self {
            source,
            entries: Mutex::new(HashMap::new()),
            next_fetch_id: AtomicU64::new(0),
        }
    }

    pub async fn get_schema(&self, key: &SchemaKey, actor: Option<&str>) -> Result<SchemaList, SchemaError> {
        let (fetch_id, fetch) = {
            let mut entries = self.lock_entries();
            match entries.get(key) {
                Some(CacheEntry::Ready(schemas)) => {
                    debug!("Schema cache hit for {}", key);
                    return Ok(Arc::clone(schemas));
                }
                Some(CacheEntry::InFlight { fetch_id, fetch }) => {
                    debug!("Joining in-flight schema request for {}", key);
                    (*fetch_id, fetch.clone())
                }
                None => {
                    debug!("Schema cache miss for {}", key);
                    let fetch_id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
                    let fetch = self.start_fetch(key, actor);
                    entries.insert(key.clone(), CacheEntry::InFlight { fetch_id, fetch: fetch.clone() });
                    (fetch_id, fetch)
                }
            }
        };

        let result = fetch.await;

        let mut entries = self.lock_entries();
        let still_pending = matches!(
            entries.get(key),
            Some(CacheEntry::InFlight { fetch_id: current, .. }) if *current == fetch_id
        );
        if still_pending {
            match &result {
                Ok(schemas) => {
                    entries.insert(key.clone(), CacheEntry::Ready(Arc::clone(schemas)));
                }
                Err(e) => {
                    error!("Schema request for {} failed: {}", key, e);
                    entries.remove(key);
                }
            }
        }
        result
    }

    /// Cached schema for `key`, if a completed response is held.
    pub fn get_cached(&self, key: &SchemaKey) -> Option<SchemaList> {
        match self.lock_entries().get(key) {
            Some(CacheEntry::Ready(schemas)) => Some(Arc::clone(schemas)),
            _ => None,
        }
    }

    pub fn invalidate(&self, key: &SchemaKey) {
        self.lock_entries().remove(key);
    }

    /// Drops every entry. A request still in flight will not be written back.
    pub fn clear(&self) {
        self.lock_entries().clear();
    }

    pub fn len(&self) -> usize {
        self.lock_entries()
            .values()
            .filter(|e| matches!(e, CacheEntry::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn start_fetch(&self, key: &SchemaKey, actor: Option<&str>) -> SharedFetch {
        let source = Arc::clone(&self.source);
        let key = key.clone();
        let actor = actor.map(str::to_owned);
        async move { source.get_schema(&key, actor.as_deref()).await.map(Arc::new) }
            .boxed()
            .shared()
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<SchemaKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
