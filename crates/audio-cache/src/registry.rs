//! Backend registry used by the `--cache-implementation` flag.

use std::path::PathBuf;
use std::sync::Arc;

use launcher_core::{AudioCache, LauncherError, LauncherResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{FileCache, MemoryCache};

/// Available cache backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// WAV files under a shared directory.
    #[default]
    File,
    /// Process-local map.
    Memory,
}

impl CacheBackend {
    /// All registered backends.
    pub const ALL: [CacheBackend; 2] = [CacheBackend::File, CacheBackend::Memory];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

impl std::str::FromStr for CacheBackend {
    type Err = LauncherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            _ => {
                let known: Vec<_> = Self::ALL.iter().map(|b| b.as_str()).collect();
                Err(LauncherError::config(format!(
                    "unknown cache implementation '{s}' (expected one of: {})",
                    known.join(", ")
                )))
            }
        }
    }
}

impl std::fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the selected cache.
///
/// # Arguments
/// * `backend` - Registered backend
/// * `dir` - Root directory for the file backend
pub fn select_cache_implementation(
    backend: CacheBackend,
    dir: PathBuf,
) -> LauncherResult<Arc<dyn AudioCache>> {
    let cache: Arc<dyn AudioCache> = match backend {
        CacheBackend::File => {
            std::fs::create_dir_all(&dir).map_err(|e| {
                LauncherError::config(format!(
                    "cannot create cache directory {}: {e}",
                    dir.display()
                ))
            })?;
            Arc::new(FileCache::new(dir))
        }
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
    };
    info!(backend = cache.name(), "Selected audio cache");
    Ok(cache)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("file".parse::<CacheBackend>().unwrap(), CacheBackend::File);
        assert_eq!("Memory".parse::<CacheBackend>().unwrap(), CacheBackend::Memory);
        let err = "mongo".parse::<CacheBackend>().unwrap_err();
        assert!(err.to_string().contains("file, memory"));
    }

    #[test]
    fn test_select_file_backend_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("audio_cache");
        let cache = select_cache_implementation(CacheBackend::File, root.clone()).unwrap();
        assert_eq!(cache.name(), "file");
        assert!(root.is_dir());
    }

    #[test]
    fn test_select_memory_backend() {
        let cache =
            select_cache_implementation(CacheBackend::Memory, PathBuf::from("/unused")).unwrap();
        assert_eq!(cache.name(), "memory");
    }
}
