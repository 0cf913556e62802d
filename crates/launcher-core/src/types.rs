//! Core data types for the launcher pipeline.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Processing stage an audio cache entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Audio as uploaded by the user.
    Raw,
    /// Audio after preprocessing; reference audio is read from here.
    Preprocessed,
    /// Audio produced by an architecture; synthesis results are written here.
    Output,
    /// Audio after postprocessing.
    Postprocessed,
}

impl Stage {
    /// Directory/key name for this stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Raw => "raw",
            Stage::Preprocessed => "preprocessed",
            Stage::Output => "output",
            Stage::Postprocessed => "postprocessed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded mono audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    /// Samples in [-1, 1].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioData {
    /// Create new audio data.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Get the number of samples.
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// Get the duration in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 * 1000.0 / self.sample_rate as f64
    }
}

/// Address of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub stage: Stage,
    pub session_id: Option<String>,
    pub item_id: String,
}

impl CacheKey {
    pub fn new(stage: Stage, session_id: Option<&str>, item_id: &str) -> Self {
        Self {
            stage,
            session_id: session_id.map(str::to_owned),
            item_id: item_id.to_owned(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.stage,
            self.session_id.as_deref().unwrap_or("<none>"),
            self.item_id
        )
    }
}

/// A numeric request option that remembers how the client wrote it.
///
/// The inference process receives options as text, so `1.0` must stay `1.0`
/// and `5` must stay `5`.
#[derive(Debug, Clone, PartialEq)]
pub struct Numeric(serde_json::Number);

impl Numeric {
    pub fn new(number: serde_json::Number) -> Self {
        Self(number)
    }

    pub fn as_f64(&self) -> f64 {
        self.0.as_f64().unwrap_or(f64::NAN)
    }
}

impl From<f64> for Numeric {
    fn from(value: f64) -> Self {
        Self(serde_json::Number::from_f64(value).unwrap_or_else(|| 0.into()))
    }
}

impl From<u64> for Numeric {
    fn from(value: u64) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// GPU selector as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuId {
    /// Integer device index.
    Index(i64),
    /// Free-form selector; empty selects the CPU.
    Name(String),
}

impl fmt::Display for GpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuId::Index(index) => write!(f, "{index}"),
            GpuId::Name(name) => f.write_str(name),
        }
    }
}

/// Reference audio settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceOptions {
    /// Use a cached preprocessed clip as the style reference.
    pub enabled: bool,
    /// Cache item id of the reference clip.
    pub item_id: Option<String>,
    /// Timbre blend in [0, 1].
    pub timbre_blend: Option<Numeric>,
    /// Prosody blend in [0, 1].
    pub prosody_blend: Option<Numeric>,
}

/// Synthesis options.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOptions {
    pub character: String,
    pub noise: Numeric,
    /// In [0, 1].
    pub style_blend: Numeric,
    /// At least 1.
    pub diffusion_steps: u64,
    pub embedding_scale: Numeric,
    pub use_long_form: bool,
    pub reference: ReferenceOptions,
}

/// A validated synthesis request.
///
/// Only [`crate::validate::parse_request`] produces one from client input, so
/// every field has already been type and range checked.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub options: SynthesisOptions,
    /// Output item id, without extension.
    pub output_id: String,
    pub gpu_id: GpuId,
    pub session_id: Option<String>,
}

impl SynthesisRequest {
    /// Create a request with default options for the given character.
    pub fn new(
        text: impl Into<String>,
        character: impl Into<String>,
        output_id: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            options: SynthesisOptions {
                character: character.into(),
                noise: Numeric::from(0.3),
                style_blend: Numeric::from(0.5),
                diffusion_steps: 5,
                embedding_scale: Numeric::from(1.0),
                use_long_form: false,
                reference: ReferenceOptions::default(),
            },
            output_id: output_id.into(),
            gpu_id: GpuId::Name(String::new()),
            session_id: None,
        }
    }

    /// Set the session id.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the GPU selector.
    pub fn with_gpu(mut self, gpu_id: GpuId) -> Self {
        self.gpu_id = gpu_id;
        self
    }

    /// Enable reference audio from the given preprocessed cache item.
    pub fn with_reference_audio(mut self, item_id: impl Into<String>) -> Self {
        self.options.reference.enabled = true;
        self.options.reference.item_id = Some(item_id.into());
        self
    }
}

/// An external process invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceJob {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,
    /// Variables set on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl InferenceJob {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(vars);
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments as lossy strings, for logging and tests.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

/// What a finished process left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOutput {
    /// Exit code; `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl JobOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_keeps_client_form() {
        let float: serde_json::Number = serde_json::from_str("1.0").unwrap();
        assert_eq!(Numeric::new(float).to_string(), "1.0");

        let int: serde_json::Number = serde_json::from_str("5").unwrap();
        assert_eq!(Numeric::new(int).to_string(), "5");

        assert_eq!(Numeric::from(0.5).as_f64(), 0.5);
    }

    #[test]
    fn test_gpu_id_display() {
        assert_eq!(GpuId::Index(1).to_string(), "1");
        assert_eq!(GpuId::Name("0,1".into()).to_string(), "0,1");
    }

    #[test]
    fn test_audio_data() {
        let audio = AudioData::new(vec![0.0; 24000], 24000);
        assert_eq!(audio.num_samples(), 24000);
        assert_eq!(audio.duration_ms(), 1000.0);
        assert_eq!(AudioData::new(vec![0.0], 0).duration_ms(), 0.0);
    }

    #[test]
    fn test_cache_key_display() {
        let key = CacheKey::new(Stage::Output, Some("s1"), "out1");
        assert_eq!(key.to_string(), "(output, s1, out1)");

        let key = CacheKey::new(Stage::Preprocessed, None, "ref");
        assert_eq!(key.to_string(), "(preprocessed, <none>, ref)");
    }

    #[test]
    fn test_synthesis_request_builder() {
        let req = SynthesisRequest::new("hello", "voiceA", "out1")
            .with_session("s1")
            .with_gpu(GpuId::Index(0))
            .with_reference_audio("clip");

        assert_eq!(req.text, "hello");
        assert_eq!(req.options.character, "voiceA");
        assert_eq!(req.session_id.as_deref(), Some("s1"));
        assert!(req.options.reference.enabled);
        assert_eq!(req.options.reference.item_id.as_deref(), Some("clip"));
    }

    #[test]
    fn test_inference_job_builder() {
        let job = InferenceJob::new("/usr/bin/python")
            .arg("script.py")
            .args(["--text", "hi"])
            .env("CUDA_VISIBLE_DEVICES", "0")
            .timeout(Some(Duration::from_secs(1)));

        assert_eq!(job.args_lossy(), vec!["script.py", "--text", "hi"]);
        assert_eq!(job.env.get("CUDA_VISIBLE_DEVICES").map(String::as_str), Some("0"));
        assert_eq!(job.timeout, Some(Duration::from_secs(1)));
    }
}
