//! In-process cache, for tests and single-node setups without a shared cache.

use dashmap::DashMap;
use launcher_core::{AudioCache, AudioData, CacheKey, LauncherError, LauncherResult, Stage};

/// Cache backed by a concurrent hash map. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<CacheKey, AudioData>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check whether an entry exists.
    pub fn contains(&self, stage: Stage, session_id: Option<&str>, item_id: &str) -> bool {
        self.entries
            .contains_key(&CacheKey::new(stage, session_id, item_id))
    }
}

impl AudioCache for MemoryCache {
    fn read_audio(
        &self,
        stage: Stage,
        session_id: Option<&str>,
        item_id: &str,
    ) -> LauncherResult<AudioData> {
        let key = CacheKey::new(stage, session_id, item_id);
        self.entries
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LauncherError::cache(format!("no entry at {key}")))
    }

    fn save_audio(
        &self,
        stage: Stage,
        session_id: Option<&str>,
        item_id: &str,
        audio: &AudioData,
    ) -> LauncherResult<()> {
        self.entries
            .insert(CacheKey::new(stage, session_id, item_id), audio.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
