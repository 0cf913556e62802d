//! # runtime
//!
//! Request handling for the StyleTTS 2 launcher.
//!
//! This crate provides:
//! - The synthesis pipeline (validate, prepare, invoke, collect, clean up)
//! - Character resolution and weight linking
//! - Per-request scratch directories
//! - The child-process job runner and hardware selection
//! - Structured logging and metrics

pub mod args;
pub mod character;
pub mod hardware;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod process;
pub mod scratch;

pub use args::{JobFiles, StyleSource, build_arguments};
pub use character::{VoiceProfile, link_weights, resolve_character};
pub use hardware::{Hardware, query_gpu_info, select_hardware};
pub use logging::{LogFormat, init_logging, init_logging_from_config};
pub use metrics::LauncherMetrics;
pub use pipeline::{JobFailure, Phase, SynthesisPipeline};
pub use process::ProcessRunner;
pub use scratch::{RequestScratch, Scratch};
