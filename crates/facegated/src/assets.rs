//! Asset cache warmer and cache-first asset loading.

use crate::config::{join_url, Config};
use crate::fetch::{FetchError, Fetcher};
use crate::store::{NamedCache, Store, StoreError, IMAGES_CACHE, MODELS_CACHE};
use facegate_core::{Account, ModelWeights, Registry};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

/// SCRFD detector with five-point landmarks.
pub const DETECTOR_MODEL: &str = "/models/det_10g.onnx";
/// Dense 106-point landmark network.
pub const LANDMARK_MODEL: &str = "/models/2d106det.onnx";
/// Recognition network producing descriptors.
pub const RECOGNIZER_MODEL: &str = "/models/w600k_r50.onnx";

pub const MODEL_FILES: [&str; 3] = [DETECTOR_MODEL, LANDMARK_MODEL, RECOGNIZER_MODEL];

/// Path prefix the profile photos are served under.
pub const IMAGES_PREFIX: &str = "/temp-accounts/";

#[derive(Error, Debug)]
pub enum AssetError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("asset {0} is empty")]
    Empty(String),
}

/// Outcome of one warm pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WarmReport {
    pub models_fetched: usize,
    pub images_fetched: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Assets {
    base_url: String,
    fetcher: Arc<dyn Fetcher>,
    models: NamedCache,
    images: NamedCache,
}

pub fn image_path(account: &Account) -> String {
    format!("{IMAGES_PREFIX}{}", account.picture_path())
}

impl Assets {
    pub fn new(config: &Config, store: &Store, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            base_url: config.asset_base_url.clone(),
            fetcher,
            models: store.cache(MODELS_CACHE),
            images: store.cache(IMAGES_CACHE),
        }
    }

    /// Fetch every model file and profile photo missing from the caches.
    ///
    /// Individual failures are logged and counted, never returned.
    pub async fn warm(&self, registry: &Registry) -> WarmReport {
        let mut pending: Vec<(NamedCache, String)> = Vec::new();
        let wanted = MODEL_FILES
            .iter()
            .map(|p| (&self.models, p.to_string()))
            .chain(registry.iter().map(|a| (&self.images, image_path(a))));

        for (cache, path) in wanted {
            match cache.contains(&path).await {
                Ok(true) => {}
                Ok(false) => pending.push((cache.clone(), path)),
                Err(e) => {
                    tracing::warn!(cache = cache.name(), error = %e, "cache unavailable; skipping warm-up");
                    return WarmReport::default();
                }
            }
        }

        if pending.is_empty() {
            tracing::info!("all files already cached");
            return WarmReport::default();
        }

        let mut report = WarmReport::default();
        tracing::info!(
            models = pending.iter().filter(|(c, _)| c.name() == MODELS_CACHE).count(),
            images = pending.iter().filter(|(c, _)| c.name() == IMAGES_CACHE).count(),
            "caching assets"
        );

        let mut tasks = JoinSet::new();
        for (cache, path) in pending {
            let this = self.clone();
            tasks.spawn(async move {
                let result = this.fetch_into(&cache, &path).await.map(drop);
                (cache.name(), path, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((cache, _, Ok(()))) if cache == MODELS_CACHE => report.models_fetched += 1,
                Ok((_, _, Ok(()))) => report.images_fetched += 1,
                Ok((cache, path, Err(e))) => {
                    tracing::warn!(cache, path = %path, error = %e, "failed to cache asset");
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cache task aborted");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(?report, "caching completed");
        report
    }

    async fn fetch_into(&self, cache: &NamedCache, path: &str) -> Result<Vec<u8>, AssetError> {
        let body = self.fetcher.get_ok(&join_url(&self.base_url, path)).await?;
        if body.is_empty() {
            return Err(AssetError::Empty(path.to_string()));
        }
        if let Err(e) = cache.put(path, body.clone()).await {
            tracing::warn!(cache = cache.name(), path, error = %e, "cache write failed");
        }
        Ok(body)
    }

    /// Cache first, network fallback. A cache read error counts as a miss.
    async fn load(&self, cache: &NamedCache, path: &str) -> Result<Vec<u8>, AssetError> {
        match cache.get(path).await {
            Ok(Some(body)) if !body.is_empty() => return Ok(body),
            Ok(_) => {}
            Err(e) => tracing::warn!(cache = cache.name(), path, error = %e, "cache read failed"),
        }
        self.fetch_into(cache, path).await
    }

    /// Bytes of the three networks.
    pub async fn model_weights(&self) -> Result<ModelWeights, AssetError> {
        Ok(ModelWeights {
            detector: self.load(&self.models, DETECTOR_MODEL).await?,
            landmarks: self.load(&self.models, LANDMARK_MODEL).await?,
            recognizer: self.load(&self.models, RECOGNIZER_MODEL).await?,
        })
    }

    pub async fn profile_image(&self, account: &Account) -> Result<Vec<u8>, AssetError> {
        self.load(&self.images, &image_path(account)).await
    }

    /// Empty both caches.
    pub async fn purge(&self) -> Result<usize, StoreError> {
        Ok(self.models.purge().await? + self.images.purge().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::MemoryFetcher;

    const BASE: &str = "http://assets.test";

    fn registry() -> Registry {
        Registry::new(vec![
            Account { id: "alice".into(), full_name: "Alice".into(), picture: "/alice.jpg".into() },
            Account { id: "bob".into(), full_name: "Bob".into(), picture: "bob.jpg".into() },
        ])
    }

    async fn setup(fetcher: Arc<MemoryFetcher>) -> (Assets, Store) {
        let store = Store::open_in_memory().await.unwrap();
        let config = Config { asset_base_url: format!("{BASE}/"), ..Config::default() };
        (Assets::new(&config, &store, fetcher), store)
    }

    fn full_fetcher() -> MemoryFetcher {
        let f = MemoryFetcher::default();
        for m in MODEL_FILES {
            f.serve(&format!("{BASE}{m}"), m.as_bytes());
        }
        f.serve(&format!("{BASE}/temp-accounts/alice.jpg"), b"alice");
        f.serve(&format!("{BASE}/temp-accounts/bob.jpg"), b"bob");
        f
    }

    #[test]
    fn test_image_path_strips_slash() {
        let reg = registry();
        assert_eq!(image_path(reg.find("alice").unwrap()), "/temp-accounts/alice.jpg");
    }

    #[tokio::test]
    async fn test_warm_fetches_missing_once() {
        let fetcher = Arc::new(full_fetcher());
        let (assets, store) = setup(fetcher.clone()).await;

        let first = assets.warm(&registry()).await;
        assert_eq!(first, WarmReport { models_fetched: 3, images_fetched: 2, failed: 0 });
        for m in MODEL_FILES {
            assert!(store.cache(MODELS_CACHE).contains(m).await.unwrap());
        }

        let second = assets.warm(&registry()).await;
        assert_eq!(second, WarmReport::default());
        assert_eq!(fetcher.count(&format!("{BASE}/temp-accounts/bob.jpg")), 1);
    }

    #[tokio::test]
    async fn test_warm_failures_do_not_abort_batch() {
        let fetcher = Arc::new(MemoryFetcher::default());
        fetcher.serve(&format!("{BASE}{DETECTOR_MODEL}"), b"det");
        let (assets, store) = setup(fetcher).await;

        let report = assets.warm(&registry()).await;
        assert_eq!(report.models_fetched, 1);
        assert_eq!(report.failed, 4);
        assert!(store.cache(MODELS_CACHE).contains(DETECTOR_MODEL).await.unwrap());
    }

    #[tokio::test]
    async fn test_load_prefers_cache() {
        let fetcher = Arc::new(full_fetcher());
        let (assets, store) = setup(fetcher.clone()).await;
        store.cache(IMAGES_CACHE).put("/temp-accounts/alice.jpg", b"cached".to_vec()).await.unwrap();

        let reg = registry();
        assert_eq!(assets.profile_image(reg.find("alice").unwrap()).await.unwrap(), b"cached");
        assert_eq!(fetcher.count(&format!("{BASE}/temp-accounts/alice.jpg")), 0);

        // Miss falls back to the network and fills the cache.
        assert_eq!(assets.profile_image(reg.find("bob").unwrap()).await.unwrap(), b"bob");
        assert!(store.cache(IMAGES_CACHE).contains("/temp-accounts/bob.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn test_model_weights_missing_file_errors() {
        let fetcher = Arc::new(MemoryFetcher::default());
        let (assets, _) = setup(fetcher).await;
        assert!(matches!(assets.model_weights().await, Err(AssetError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_purge_empties_both_caches() {
        let (assets, store) = setup(Arc::new(full_fetcher())).await;
        assets.warm(&registry()).await;
        assert_eq!(assets.purge().await.unwrap(), 5);
        assert!(!store.cache(IMAGES_CACHE).contains("/temp-accounts/alice.jpg").await.unwrap());
        assert_eq!(assets.purge().await.unwrap(), 0);
    }
}
