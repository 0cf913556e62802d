//! Configuration structures for the launcher.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LauncherError, LauncherResult};

/// Top-level launcher configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub model_files: ModelFilesConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LauncherConfig {
    /// Load a configuration from a JSON file. Missing sections take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> LauncherResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LauncherError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            LauncherError::config(format!("cannot parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot check.
    pub fn validate(&self) -> LauncherResult<()> {
        if self.inference.max_concurrent_jobs == 0 {
            return Err(LauncherError::config(
                "inference.max_concurrent_jobs must be at least 1",
            ));
        }
        if self.model_files.config_extensions.is_empty() {
            return Err(LauncherError::config(
                "model_files.config_extensions must not be empty",
            ));
        }
        let extensions = std::iter::once(&self.model_files.weights_extension)
            .chain(&self.model_files.config_extensions)
            .chain(std::iter::once(&self.model_files.style_extension));
        for ext in extensions {
            if !ext.starts_with('.') {
                return Err(LauncherError::config(format!(
                    "file extension '{ext}' must start with '.'"
                )));
            }
        }
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address.
    #[serde(default = "default_server_host")]
    pub host: String,
    /// Server port.
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    6578
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

/// Filesystem layout of the installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory shared by all architectures.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    /// Architecture name; names the code, venv and model directories.
    #[serde(default = "default_architecture")]
    pub architecture: String,
    /// Interpreter override. Defaults to `<root>/.venvs/<arch>/bin/python`.
    #[serde(default)]
    pub python_executable: Option<PathBuf>,
    /// Inference script override. Defaults to `<root>/<arch>/command_line_interface.py`.
    #[serde(default)]
    pub inference_script: Option<PathBuf>,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("/home/luna/hay_say")
}

fn default_architecture() -> String {
    "styletts_2".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            architecture: default_architecture(),
            python_executable: None,
            inference_script: None,
        }
    }
}

impl PathsConfig {
    /// Layout rooted at `root_dir` with default names.
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    pub fn architecture_root(&self) -> PathBuf {
        self.root_dir.join(&self.architecture)
    }

    /// Scratch root for files handed to the inference process.
    pub fn input_dir(&self) -> PathBuf {
        self.architecture_root().join("input")
    }

    /// Scratch root the inference process writes into.
    pub fn output_dir(&self) -> PathBuf {
        self.architecture_root().join("output")
    }

    /// Where the inference code expects weights; holds links into character directories.
    pub fn weights_link_dir(&self) -> PathBuf {
        self.architecture_root().join("Models").join("LJSpeech")
    }

    pub fn characters_dir(&self) -> PathBuf {
        self.root_dir
            .join("models")
            .join(&self.architecture)
            .join("characters")
    }

    pub fn python_executable(&self) -> PathBuf {
        self.python_executable.clone().unwrap_or_else(|| {
            self.root_dir
                .join(".venvs")
                .join(&self.architecture)
                .join("bin")
                .join("python")
        })
    }

    pub fn inference_script(&self) -> PathBuf {
        self.inference_script
            .clone()
            .unwrap_or_else(|| self.architecture_root().join("command_line_interface.py"))
    }

    pub fn default_cache_dir(&self) -> PathBuf {
        self.root_dir.join("audio_cache")
    }
}

/// File extensions expected inside a character directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFilesConfig {
    #[serde(default = "default_weights_extension")]
    pub weights_extension: String,
    /// Accepted config extensions; exactly one matching file must exist.
    #[serde(default = "default_config_extensions")]
    pub config_extensions: Vec<String>,
    #[serde(default = "default_style_extension")]
    pub style_extension: String,
}

fn default_weights_extension() -> String {
    ".pth".to_string()
}

fn default_config_extensions() -> Vec<String> {
    vec![".yml".to_string(), ".yaml".to_string()]
}

fn default_style_extension() -> String {
    ".wav".to_string()
}

impl Default for ModelFilesConfig {
    fn default() -> Self {
        Self {
            weights_extension: default_weights_extension(),
            config_extensions: default_config_extensions(),
            style_extension: default_style_extension(),
        }
    }
}

/// Inference process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Kill the process after this many seconds. `None` waits forever.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: Option<u64>,
    /// Number of inference processes allowed to run at once.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

fn default_timeout_secs() -> Option<u64> {
    Some(600)
}

fn default_max_concurrent_jobs() -> usize {
    1
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Audio cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend name from the cache registry.
    #[serde(default = "default_cache_backend")]
    pub backend: String,
    /// File cache root. Defaults to `<root>/audio_cache`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_cache_backend() -> String {
    "file".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            dir: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format (json or text).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}
