//! Scratch directories shared with the inference process.
//!
//! Each request works in its own `<root>/<request id>/` subdirectory under
//! the input and output roots, and removes both when it finishes. Anything
//! else found in the roots belongs to a request that never finished and is
//! removed by [`Scratch::purge_orphans`].

use std::io;
use std::path::{Path, PathBuf};

use launcher_core::{LauncherResult, PathsConfig};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The input and output scratch roots.
#[derive(Debug, Clone)]
pub struct Scratch {
    input_root: PathBuf,
    output_root: PathBuf,
}

impl Scratch {
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
        }
    }

    pub fn from_paths(paths: &PathsConfig) -> Self {
        Self::new(paths.input_dir(), paths.output_dir())
    }

    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Delete everything in both roots. Only safe while no request is running.
    ///
    /// # Returns
    /// Number of entries removed.
    pub fn purge_orphans(&self) -> LauncherResult<usize> {
        let mut removed = 0;
        for root in [&self.input_root, &self.output_root] {
            std::fs::create_dir_all(root)?;
            for entry in std::fs::read_dir(root)? {
                let path = entry?.path();
                remove_path(&path)?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "Purged orphaned scratch files");
        }
        Ok(removed)
    }

    /// Create the directories for one request.
    pub fn create_request(&self) -> LauncherResult<RequestScratch> {
        let id = Uuid::new_v4();
        let input_dir = self.input_root.join(id.to_string());
        let output_dir = self.output_root.join(id.to_string());
        let scratch = RequestScratch {
            id,
            input_dir,
            output_dir,
            removed: false,
        };
        std::fs::create_dir_all(&scratch.input_dir)?;
        std::fs::create_dir_all(&scratch.output_dir)?;
        debug!(request_id = %id, "Created request scratch");
        Ok(scratch)
    }
}

/// Scratch directories owned by a single request.
///
/// Removed by [`RequestScratch::remove`]; dropping an unremoved scratch
/// removes it too, so a cancelled request still cleans up.
#[derive(Debug)]
pub struct RequestScratch {
    id: Uuid,
    input_dir: PathBuf,
    output_dir: PathBuf,
    removed: bool,
}

impl RequestScratch {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Files currently in the input directory.
    pub fn input_files(&self) -> Vec<PathBuf> {
        list_files(&self.input_dir)
    }

    /// Files currently in the output directory.
    pub fn output_files(&self) -> Vec<PathBuf> {
        list_files(&self.output_dir)
    }

    /// Human-readable listing of both directories, for error reports.
    pub fn describe(&self) -> String {
        let mut report = String::new();
        describe_into(&mut report, "Input", &self.input_files());
        describe_into(&mut report, "Output", &self.output_files());
        report
    }

    /// Delete both directories and everything in them.
    pub fn remove(&mut self) -> io::Result<()> {
        self.removed = true;
        let input = remove_path(&self.input_dir);
        let output = remove_path(&self.output_dir);
        debug!(request_id = %self.id, "Removed request scratch");
        input.and(output)
    }
}

impl Drop for RequestScratch {
    fn drop(&mut self) {
        if !self.removed {
            if let Err(e) = self.remove() {
                warn!(request_id = %self.id, "Failed to remove scratch on drop: {e}");
            }
        }
    }
}

fn describe_into(report: &mut String, label: &str, files: &[PathBuf]) {
    if files.is_empty() {
        report.push_str(&format!("No {} files to report\n", label.to_lowercase()));
        return;
    }
    report.push_str(&format!("{label} files:\n"));
    for file in files {
        report.push_str(&format!("  {}\n", file.display()));
    }
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    files.sort();
    files
}

/// Remove a file or directory tree; a missing path is not an error.
fn remove_path(path: &Path) -> io::Result<()> {
    let result = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
