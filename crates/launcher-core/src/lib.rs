//! # launcher-core
//!
//! Core types, traits, and error definitions for the StyleTTS 2 job launcher.
//!
//! This crate provides the foundational abstractions used across all other crates
//! in the workspace, including:
//!
//! - Request, audio and job data types (`SynthesisRequest`, `AudioData`, `InferenceJob`)
//! - Request validation with field-level errors
//! - Traits for the external collaborators (`AudioCache`, `JobRunner`)
//! - Unified error handling via `LauncherError`
//! - Configuration structures

pub mod config;
pub mod error;
pub mod traits;
pub mod types;
pub mod validate;

pub use config::{LauncherConfig, PathsConfig};
pub use error::{ErrorKind, LauncherError, LauncherResult};
pub use traits::{AudioCache, JobRunner};
pub use types::{
    AudioData, CacheKey, GpuId, InferenceJob, JobOutput, Numeric, ReferenceOptions, Stage,
    SynthesisOptions, SynthesisRequest,
};
pub use validate::{Constraint, ValidationError};
