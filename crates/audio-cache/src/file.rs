//! File-backed cache: one float WAV per entry.
//!
//! Layout: `<root>/<session>/<stage>/<item>.wav`, with entries that have no
//! session stored under `.no_session`. Session and item ids must be single
//! path components without a leading dot, so no id can reach that directory
//! or leave the root.

use std::path::{Component, Path, PathBuf};

use launcher_core::{AudioCache, AudioData, LauncherError, LauncherResult, Stage};
use tracing::debug;
use uuid::Uuid;

use crate::wav::{read_wav, write_wav};

const NO_SESSION_DIR: &str = ".no_session";

/// Cache that stores entries as WAV files under a root directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Create a file cache rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding an entry.
    ///
    /// # Errors
    /// `Cache` if the session or item id is not a plain name.
    pub fn entry_path(
        &self,
        stage: Stage,
        session_id: Option<&str>,
        item_id: &str,
    ) -> LauncherResult<PathBuf> {
        let session_dir = match session_id {
            Some(session) => plain_name("session id", session)?,
            None => NO_SESSION_DIR,
        };
        let item = plain_name("item id", item_id)?;
        Ok(self
            .root
            .join(session_dir)
            .join(stage.as_str())
            .join(format!("{item}.wav")))
    }
}

fn plain_name<'a>(what: &str, name: &'a str) -> LauncherResult<&'a str> {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single || name.starts_with('.') || name.contains(['/', '\\']) {
        return Err(LauncherError::cache(format!(
            "{what} '{name}' is not a plain name"
        )));
    }
    Ok(name)
}

impl AudioCache for FileCache {
    fn read_audio(
        &self,
        stage: Stage,
        session_id: Option<&str>,
        item_id: &str,
    ) -> LauncherResult<AudioData> {
        let path = self.entry_path(stage, session_id, item_id)?;
        if !path.is_file() {
            return Err(LauncherError::cache(format!(
                "no {stage} entry '{item_id}' (looked for {})",
                path.display()
            )));
        }
        read_wav(&path).map_err(|e| {
            LauncherError::cache(format!("cannot read {}: {e}", path.display()))
        })
    }

    fn save_audio(
        &self,
        stage: Stage,
        session_id: Option<&str>,
        item_id: &str,
        audio: &AudioData,
    ) -> LauncherResult<()> {
        let path = self.entry_path(stage, session_id, item_id)?;
        let dir = path
            .parent()
            .ok_or_else(|| LauncherError::internal("cache entry path has no parent"))?;
        std::fs::create_dir_all(dir).map_err(|e| {
            LauncherError::cache(format!("cannot create {}: {e}", dir.display()))
        })?;

        // Write beside the target and rename so readers never see a partial file.
        let staging = dir.join(format!(".{item_id}.{}.partial", Uuid::new_v4()));
        let written = write_wav(&staging, audio).and_then(|()| {
            std::fs::rename(&staging, &path).map_err(LauncherError::from)
        });
        if let Err(e) = written {
            let _ = std::fs::remove_file(&staging);
            return Err(LauncherError::cache(format!(
                "cannot write {}: {e}",
                path.display()
            )));
        }

        debug!(path = %path.display(), samples = audio.num_samples(), "Saved cache entry");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
