//! Character (voice) resolution.
//!
//! A character directory holds exactly one weights file, exactly one config
//! file and optionally a default style clip. The inference code looks for
//! weights in a fixed directory, so the weights are linked there per request.

use std::path::{Path, PathBuf};

use launcher_core::config::ModelFilesConfig;
use launcher_core::{LauncherError, LauncherResult};
use tracing::debug;
use uuid::Uuid;

/// Files making up one installed voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceProfile {
    pub name: String,
    pub dir: PathBuf,
    pub weights: PathBuf,
    pub config: PathBuf,
    /// Default style clip, used when no reference audio is given.
    pub style: Option<PathBuf>,
}

/// Resolve a character name to its model files.
///
/// # Errors
/// `CharacterNotFound` if the directory is missing; `ModelFiles` if the
/// weights or config file is missing or ambiguous.
pub fn resolve_character(
    characters_dir: &Path,
    files: &ModelFilesConfig,
    name: &str,
) -> LauncherResult<VoiceProfile> {
    let dir = characters_dir.join(name);
    if !dir.is_dir() {
        return Err(LauncherError::CharacterNotFound {
            name: name.to_owned(),
            path: dir,
        });
    }

    let weights = single_file(&dir, &[files.weights_extension.as_str()], "weights")?;
    let config_exts: Vec<&str> = files.config_extensions.iter().map(String::as_str).collect();
    let config = single_file(&dir, &config_exts, "config")?;
    let style = files_with_extensions(&dir, &[files.style_extension.as_str()])?
        .into_iter()
        .next();

    debug!(
        character = name,
        weights = %weights.display(),
        config = %config.display(),
        has_style = style.is_some(),
        "Resolved character"
    );

    Ok(VoiceProfile {
        name: name.to_owned(),
        dir,
        weights,
        config,
        style,
    })
}

/// Point `<link_dir>/<character><ext>` at the character's weights.
///
/// The link is replaced atomically, so concurrent requests for the same
/// character never observe a missing link.
pub fn link_weights(
    profile: &VoiceProfile,
    link_dir: &Path,
    weights_extension: &str,
) -> LauncherResult<PathBuf> {
    std::fs::create_dir_all(link_dir)?;
    let link = link_dir.join(format!("{}{weights_extension}", profile.name));
    let staging = link_dir.join(format!(".{}.{}.link", profile.name, Uuid::new_v4()));

    create_symlink(&profile.weights, &staging)?;
    if let Err(e) = std::fs::rename(&staging, &link) {
        let _ = std::fs::remove_file(&staging);
        return Err(e.into());
    }

    debug!(link = %link.display(), target = %profile.weights.display(), "Linked weights");
    Ok(link)
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

fn single_file(dir: &Path, extensions: &[&str], what: &str) -> LauncherResult<PathBuf> {
    let mut found = files_with_extensions(dir, extensions)?;
    match found.len() {
        0 => Err(LauncherError::model_files(
            dir,
            format!("no {what} file with extension {}", extensions.join(" or ")),
        )),
        1 => Ok(found.remove(0)),
        n => {
            let names: Vec<String> = found
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect();
            Err(LauncherError::model_files(
                dir,
                format!("expected exactly one {what} file, found {n}: {}", names.join(", ")),
            ))
        }
    }
}

/// Regular files in `dir` whose names end in one of `extensions`
/// (case-insensitive), sorted by name.
fn files_with_extensions(dir: &Path, extensions: &[&str]) -> LauncherResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
            continue;
        };
        if extensions
            .iter()
            .any(|ext| name.ends_with(&ext.to_lowercase()))
        {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}
