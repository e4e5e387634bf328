//! Token refresh coordination.
//!
//! Every remote call goes through [`TokenGuard::call`]. When a call comes back
//! 401 the guard takes its lock, and only the first caller that still holds
//! the stored token asks the server for a new one. Callers that arrive later
//! find the stored token already changed and adopt it. Each original call is
//! retried at most once.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::api::{ApiError, CompressApi};
use crate::error::PressError;
use crate::store::ConfigStore;

pub struct TokenGuard<A> {
    api: Arc<A>,
    /// The key store is only reachable through this lock.
    store: Mutex<ConfigStore>,
    /// Number of completed refreshes; one per token epoch.
    epoch: AtomicU64,
}

impl<A: CompressApi> TokenGuard<A> {
    pub fn new(api: Arc<A>, store: ConfigStore) -> Self {
        Self {
            api,
            store: Mutex::new(store),
            epoch: AtomicU64::new(0),
        }
    }

    /// Snapshot of the stored token.
    pub async fn current_token(&self) -> String {
        self.store.lock().await.token().to_string()
    }

    /// How many times the token has been refreshed.
    pub fn refreshes(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Runs `f` with `token`; on a 401, refreshes or adopts the current token,
    /// stores it back into `token` and runs `f` once more.
    pub async fn call<T, F, Fut>(&self, token: &mut String, mut f: F) -> Result<T, PressError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        match f(token.clone()).await {
            Err(err) if err.is_unauthorized() => {
                *token = self.refresh(token).await?;
                Ok(f(token.clone()).await?)
            }
            result => Ok(result?),
        }
    }

    /// Returns a token newer than `stale`, fetching one only if nobody else
    /// has since `stale` was handed out.
    pub async fn refresh(&self, stale: &str) -> Result<String, PressError> {
        let mut store = self.store.lock().await;

        if store.token() != stale {
            debug!("token already refreshed by another worker, adopting it");
            return Ok(store.token().to_string());
        }

        let key = store
            .key_info()
            .map(|info| info.key.clone())
            .ok_or_else(|| PressError::NoKeys(store.path().to_path_buf()))?;

        info!("refreshing authorization token");
        let fresh = self.api.authenticate(&key).await?;
        store.set_token(&key, fresh.clone())?;
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(epoch, "token refreshed");

        Ok(fresh)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use crate::api::{ProcessRequest, ProcessResponse, StartResponse, UploadResponse};

    /// Test double that only knows how to authenticate; every refresh hands
    /// out `fresh-<n>`.
    #[derive(Default)]
    pub(crate) struct CountingAuth {
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    impl CompressApi for CountingAuth {
        async fn authenticate(&self, _public_key: &str) -> Result<String, ApiError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            // Keep the lock held long enough for the other callers to queue up.
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(ApiError::Status {
                    status: 500,
                    body: "auth down".into(),
                });
            }
            Ok(format!("fresh-{n}"))
        }

        async fn start(&self, _: &str, _: &str, _: &str) -> Result<StartResponse, ApiError> {
            unimplemented!()
        }

        async fn upload(&self, _: &str, _: &str, _: &str, _: &Path) -> Result<UploadResponse, ApiError> {
            unimplemented!()
        }

        async fn process(&self, _: &str, _: &str, _: &ProcessRequest) -> Result<ProcessResponse, ApiError> {
            unimplemented!()
        }

        async fn download(&self, _: &str, _: &str, _: &str, _: &Path) -> Result<u64, ApiError> {
            unimplemented!()
        }
    }

    pub(crate) fn store_with_token(dir: &Path, token: &str) -> ConfigStore {
        let path = dir.join("config.json");
        std::fs::write(
            &path,
            format!(r#"{{"api_keys": [{{"key": "pk", "token": "{token}", "status": true}}]}}"#),
        )
        .unwrap();
        ConfigStore::load(&path).unwrap()
    }

    /// A remote call that only accepts `valid`.
    async fn accepts(valid: &str, token: String) -> Result<String, ApiError> {
        if token == valid {
            Ok(token)
        } else {
            Err(ApiError::Unauthorized)
        }
    }

    #[tokio::test]
    async fn success_does_not_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(CountingAuth::default());
        let guard = TokenGuard::new(api.clone(), store_with_token(dir.path(), "good"));

        let mut token = guard.current_token().await;
        let out = guard.call(&mut token, |t| accepts("good", t)).await.unwrap();

        assert_eq!(out, "good");
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
        assert_eq!(guard.refreshes(), 0);
    }

    #[tokio::test]
    async fn unauthorized_refreshes_and_retries_once() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(CountingAuth::default());
        let guard = TokenGuard::new(api.clone(), store_with_token(dir.path(), "stale"));

        let mut token = guard.current_token().await;
        let attempts = AtomicUsize::new(0);
        let out = guard
            .call(&mut token, |t| {
                attempts.fetch_add(1, Ordering::SeqCst);
                accepts("fresh-1", t)
            })
            .await
            .unwrap();

        assert_eq!(out, "fresh-1");
        assert_eq!(token, "fresh-1");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(guard.refreshes(), 1);

        // The new token is persisted.
        let reread = ConfigStore::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(reread.token(), "fresh-1");
    }

    #[tokio::test]
    async fn second_unauthorized_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(CountingAuth::default());
        let guard = TokenGuard::new(api.clone(), store_with_token(dir.path(), "stale"));

        let mut token = guard.current_token().await;
        let attempts = AtomicUsize::new(0);
        let err = guard
            .call(&mut token, |t| {
                attempts.fetch_add(1, Ordering::SeqCst);
                accepts("never", t)
            })
            .await
            .unwrap_err();

        assert!(err.api_error().is_some_and(ApiError::is_unauthorized));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(CountingAuth::default());
        let guard = TokenGuard::new(api.clone(), store_with_token(dir.path(), "good"));

        let mut token = guard.current_token().await;
        let attempts = AtomicUsize::new(0);
        let err = guard
            .call(&mut token, |_t| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(ApiError::Status {
                        status: 500,
                        body: "boom".into(),
                    })
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PressError::Api(ApiError::Status { status: 500, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_refresh_is_surfaced_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(CountingAuth {
            fail: true,
            ..Default::default()
        });
        let guard = TokenGuard::new(api.clone(), store_with_token(dir.path(), "stale"));

        let mut token = guard.current_token().await;
        let attempts = AtomicUsize::new(0);
        let err = guard
            .call(&mut token, |t| {
                attempts.fetch_add(1, Ordering::SeqCst);
                accepts("fresh-1", t)
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PressError::Api(ApiError::Status { status: 500, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(token, "stale");
        assert_eq!(guard.refreshes(), 0);
    }

    #[tokio::test]
    async fn failed_token_write_is_fatal_and_keeps_old_token() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(CountingAuth::default());
        let guard = TokenGuard::new(api.clone(), store_with_token(dir.path(), "stale"));

        let key_file = dir.path().join("config.json");
        std::fs::remove_file(&key_file).unwrap();
        std::fs::create_dir(&key_file).unwrap();
        std::fs::write(key_file.join("blocker"), b"x").unwrap();

        let err = guard.refresh("stale").await.unwrap_err();
        assert!(matches!(err, PressError::Io(_)));
        assert_eq!(guard.current_token().await, "stale");
        assert_eq!(guard.refreshes(), 0);

        // The next caller with the same token retries instead of adopting an
        // unsaved one.
        assert!(guard.refresh("stale").await.is_err());
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn caller_with_older_token_adopts_current_one() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(CountingAuth::default());
        let guard = TokenGuard::new(api.clone(), store_with_token(dir.path(), "current"));

        // A worker still holding a token from a previous epoch.
        let mut token = "older".to_string();
        let out = guard.call(&mut token, |t| accepts("current", t)).await.unwrap();

        assert_eq!(out, "current");
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_unauthorized_calls_share_one_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(CountingAuth::default());
        let guard = Arc::new(TokenGuard::new(
            api.clone(),
            store_with_token(dir.path(), "stale"),
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let guard = guard.clone();
            handles.push(tokio::spawn(async move {
                let mut token = "stale".to_string();
                let out = guard
                    .call(&mut token, |t| accepts("fresh-1", t))
                    .await
                    .unwrap();
                (out, token)
            }));
        }

        for handle in handles {
            let (out, token) = handle.await.unwrap();
            assert_eq!(out, "fresh-1");
            assert_eq!(token, "fresh-1");
        }
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert_eq!(guard.refreshes(), 1);
        assert_eq!(guard.current_token().await, "fresh-1");
    }
}
