//! Token manager
//!
//! Hands out a usable access token, going to the identity provider only when
//! the cached one is missing or expired.

use tracing::{debug, warn};

use super::provider::{OAuthProvider, TokenSource};
use super::storage::{TokenRecord, TokenStore};
use crate::{Error, Result};

/// Owns the current token and decides when a new one is needed
pub struct TokenManager<S = OAuthProvider> {
    /// Where fresh tokens come from
    source: S,

    /// On-disk cache
    store: TokenStore,

    /// Current token, replaced whole or cleared
    current: Option<TokenRecord>,
}

impl<S: TokenSource> TokenManager<S> {
    /// Create a manager, seeding it from the on-disk cache
    pub fn new(source: S, store: TokenStore) -> Self {
        let current = store.load();
        Self {
            source,
            store,
            current,
        }
    }

    /// Get a valid access token, obtaining a new one if needed
    ///
    /// # Errors
    ///
    /// Returns the provider's error when a new token cannot be obtained,
    /// and [`Error::TokenExchange`] when the new token is already expired.
    /// Failing to write the cache is logged and otherwise ignored.
    pub async fn get_token(&mut self) -> Result<String> {
        if let Some(record) = self.current.as_ref().filter(|r| r.is_valid()) {
            return Ok(record.access_token.clone());
        }

        debug!("No usable token, requesting a new one");
        let record = self.source.obtain().await?;
        if !record.is_valid() {
            return Err(Error::TokenExchange(
                "provider issued a token that is already expired".to_string(),
            ));
        }

        if let Err(e) = self.store.save(&record) {
            warn!(path = %self.store.path().display(), error = %e, "Failed to cache token");
        }

        let token = record.access_token.clone();
        self.current = Some(record);
        Ok(token)
    }

    /// Drop the current token so the next [`get_token`](Self::get_token)
    /// goes to the provider. The cache file is left alone.
    pub fn invalidate(&mut self) {
        debug!("Invalidating current token");
        self.current = None;
    }

    /// Check if the manager holds a valid token
    pub fn has_valid_token(&self) -> bool {
        self.current.as_ref().is_some_and(TokenRecord::is_valid)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::oauth::storage::unix_now;

    /// Issues `token-1`, `token-2`, ... and counts calls
    #[derive(Clone)]
    struct CountingSource {
        calls: Arc<AtomicUsize>,
        lifetime: u64,
    }

    impl CountingSource {
        fn new(lifetime: u64) -> Self {
            Self {
                calls: Arc::default(),
                lifetime,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn obtain(&self) -> Result<TokenRecord> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TokenRecord::new(format!("token-{n}"), unix_now() + self.lifetime))
        }
    }

    struct FailingSource;

    #[async_trait]
    impl TokenSource for FailingSource {
        async fn obtain(&self) -> Result<TokenRecord> {
            Err(Error::TokenExchange("HTTP 401 Unauthorized - bad client".to_string()))
        }
    }

    fn temp_store() -> (tempfile::TempDir, TokenStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("oac_token.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn repeated_calls_reuse_token() {
        let (_dir, store) = temp_store();
        let source = CountingSource::new(3600);
        let mut manager = TokenManager::new(source.clone(), store);

        let first = manager.get_token().await.unwrap();
        let second = manager.get_token().await.unwrap();
        let third = manager.get_token().await.unwrap();

        assert_eq!(first, "token-1");
        assert_eq!(second, first);
        assert_eq!(third, first);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn fresh_token_is_cached_on_disk() {
        let (_dir, store) = temp_store();
        let mut manager = TokenManager::new(CountingSource::new(3600), store.clone());

        let token = manager.get_token().await.unwrap();
        assert_eq!(store.load().unwrap().access_token, token);
    }

    #[tokio::test]
    async fn valid_cache_skips_provider() {
        let (_dir, store) = temp_store();
        store
            .save(&TokenRecord::new("from-disk", unix_now() + 600))
            .unwrap();

        let source = CountingSource::new(3600);
        let mut manager = TokenManager::new(source.clone(), store);

        assert!(manager.has_valid_token());
        assert_eq!(manager.get_token().await.unwrap(), "from-disk");
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn expired_cache_goes_to_provider() {
        let (_dir, store) = temp_store();
        store.save(&TokenRecord::new("stale", unix_now() - 5)).unwrap();

        let source = CountingSource::new(3600);
        let mut manager = TokenManager::new(source.clone(), store);

        assert!(!manager.has_valid_token());
        assert_eq!(manager.get_token().await.unwrap(), "token-1");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn expired_in_memory_token_is_never_returned() {
        let (_dir, store) = temp_store();
        let source = CountingSource::new(3600);
        let mut manager = TokenManager::new(source.clone(), store);
        manager.current = Some(TokenRecord::new("expired", unix_now()));

        let token = manager.get_token().await.unwrap();
        assert_ne!(token, "expired");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_provider_call() {
        let (_dir, store) = temp_store();
        let source = CountingSource::new(3600);
        let mut manager = TokenManager::new(source.clone(), store.clone());

        assert_eq!(manager.get_token().await.unwrap(), "token-1");
        manager.invalidate();
        assert!(!manager.has_valid_token());
        // Disk still holds the old token until the refresh overwrites it
        assert_eq!(store.load().unwrap().access_token, "token-1");

        assert_eq!(manager.get_token().await.unwrap(), "token-2");
        assert_eq!(source.calls(), 2);
        assert_eq!(store.load().unwrap().access_token, "token-2");
    }

    #[tokio::test]
    async fn cache_write_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();
        let store = TokenStore::new(blocker.join("oac_token.json"));

        let mut manager = TokenManager::new(CountingSource::new(3600), store);
        assert_eq!(manager.get_token().await.unwrap(), "token-1");
        assert!(manager.has_valid_token());
    }

    #[tokio::test]
    async fn already_expired_fresh_token_is_rejected() {
        let (_dir, store) = temp_store();
        let source = CountingSource::new(0);
        let mut manager = TokenManager::new(source.clone(), store.clone());

        let err = manager.get_token().await.unwrap_err();
        assert!(matches!(err, Error::TokenExchange(_)));
        assert!(!manager.has_valid_token());
        assert!(store.load().is_none());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let (_dir, store) = temp_store();
        let mut manager = TokenManager::new(FailingSource, store);

        let err = manager.get_token().await.unwrap_err();
        assert!(matches!(err, Error::TokenExchange(_)));
        assert!(!manager.has_valid_token());
    }
}
