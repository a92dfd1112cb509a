use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use url::Url;
use uuid::Uuid;

use crate::core::config;

/// Prefix that marks a cache token in callback data
pub const TOKEN_PREFIX: char = '#';

/// Token length (hex chars) after the prefix
const TOKEN_LEN: usize = 16;

struct CachedUrl {
    url: Url,
    cached_at: Instant,
}

/// Short tokens for URLs too long to fit into callback data.
///
/// Entries expire after the TTL; an expired token resolves to `None` and the
/// user has to send the link again.
#[derive(Clone)]
pub struct CallbackUrlCache {
    entries: Arc<Mutex<HashMap<String, CachedUrl>>>,
    ttl: Duration,
}

impl Default for CallbackUrlCache {
    fn default() -> Self {
        Self::new(config::callback_cache::ttl())
    }
}

impl CallbackUrlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Stores `url` and returns its reference, e.g. `#3f2a9c0d1b4e5f60`.
    pub async fn register(&self, url: Url) -> String {
        let token: String = Uuid::new_v4().simple().to_string().chars().take(TOKEN_LEN).collect();
        let mut entries = self.entries.lock().await;
        // Opportunistic expiry so the map cannot grow without bound
        self.prune(&mut entries);
        entries.insert(
            token.clone(),
            CachedUrl {
                url,
                cached_at: Instant::now(),
            },
        );
        format!("{}{}", TOKEN_PREFIX, token)
    }

    /// Resolves a reference produced by `register`. Accepts the token with or
    /// without the prefix.
    pub async fn resolve(&self, reference: &str) -> Option<Url> {
        let token = reference.strip_prefix(TOKEN_PREFIX).unwrap_or(reference);
        let mut entries = self.entries.lock().await;
        match entries.get(token) {
            Some(item) if item.cached_at.elapsed() < self.ttl => Some(item.url.clone()),
            Some(_) => {
                entries.remove(token);
                None
            }
            None => None,
        }
    }

    fn prune(&self, entries: &mut HashMap<String, CachedUrl>) {
        entries.retain(|_, item| item.cached_at.elapsed() < self.ttl);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
