use coffer_cache::CacheManager;
use coffer_config::Settings;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Explicit runtime context handed to every constructor.
///
/// Cloning is cheap; clones share settings, cache manager and cancellation
/// token.
#[derive(Debug, Clone)]
pub struct Context {
    settings: Arc<Settings>,
    cache: Arc<CacheManager>,
    cancellation: CancellationToken,
    ephemeral_cache: bool,
}

impl Context {
    pub fn new(settings: Settings) -> Self {
        let cache = Arc::new(CacheManager::new(settings.cache_dir.clone()));
        Self { settings: Arc::new(settings), cache, cancellation: CancellationToken::new(), ephemeral_cache: false }
    }

    /// Remove each repository's cache when the repository is closed.
    pub fn with_ephemeral_cache(mut self, ephemeral: bool) -> Self {
        self.ephemeral_cache = ephemeral;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn ephemeral_cache(&self) -> bool {
        self.ephemeral_cache
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Context whose token is cancelled with this one, but can also be
    /// cancelled on its own.
    pub fn child(&self) -> Self {
        Self { cancellation: self.cancellation.child_token(), ..self.clone() }
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
