//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use lookalike_core::{CorpusIndex, CorpusStore, MatchCascade, MemoryCorpusStore, OrbMatcher};

use crate::config::Config;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Match cascade over the reference corpus
    pub cascade: Arc<MatchCascade>,
    /// Corpus index shared with the cascade
    pub index: Arc<CorpusIndex>,
    /// Settings the server was started with
    pub config: Arc<Config>,
}

impl AppState {
    /// Build state around an opened corpus store
    pub fn new(store: Arc<dyn CorpusStore>, config: Config) -> Self {
        let index = Arc::new(CorpusIndex::new(store));
        Self::with_index(index, config)
    }

    /// Build state around an existing (possibly already synced) index
    pub fn with_index(index: Arc<CorpusIndex>, config: Config) -> Self {
        let matcher = OrbMatcher::default().with_max_distance(config.feature_max_distance);
        let cascade = Arc::new(MatchCascade::with_matcher(
            Arc::clone(&index),
            matcher,
            config.match_config(),
        ));

        Self {
            cascade,
            index,
            config: Arc::new(config),
        }
    }

    /// State backed by an empty in-memory store
    pub fn in_memory(config: Config) -> Self {
        Self::new(Arc::new(MemoryCorpusStore::new()), config)
    }
}
