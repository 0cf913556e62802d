//! Command line for the inference script.
//!
//! The script treats the presence of an option as the switch, so values that
//! were not provided are left out entirely.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use launcher_core::SynthesisRequest;

/// Where the style for a synthesis comes from. At most one source is passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleSource {
    /// The model's built-in style.
    None,
    /// A clip materialized from the cache for this request.
    ReferenceAudio(PathBuf),
    /// The character's default style clip.
    DefaultStyle(PathBuf),
}

/// Resolved file locations for one invocation.
#[derive(Debug, Clone)]
pub struct JobFiles<'a> {
    pub weights: &'a Path,
    pub config: &'a Path,
    pub output: &'a Path,
    pub style: &'a StyleSource,
}

/// Build the argument list for the inference script.
pub fn build_arguments(request: &SynthesisRequest, files: &JobFiles<'_>) -> Vec<OsString> {
    let options = &request.options;
    let mut args: Vec<OsString> = Vec::with_capacity(24);

    push(&mut args, "--text", request.text.as_str().into());
    push(&mut args, "--weights_file", files.weights.into());
    push(&mut args, "--config_file", files.config.into());
    push(&mut args, "--output_filepath", files.output.into());
    push(&mut args, "--noise", options.noise.to_string().into());
    push(&mut args, "--style_blend", options.style_blend.to_string().into());
    push(&mut args, "--diffusion_steps", options.diffusion_steps.to_string().into());
    push(&mut args, "--embedding_scale", options.embedding_scale.to_string().into());
    if options.use_long_form {
        args.push("--use_long_form".into());
    }

    match files.style {
        StyleSource::None => {}
        StyleSource::ReferenceAudio(path) => {
            push(&mut args, "--reference_audio_file", path.into())
        }
        StyleSource::DefaultStyle(path) => push(&mut args, "--style_file", path.into()),
    }
    if let Some(blend) = &options.reference.timbre_blend {
        push(&mut args, "--timbre_reference_blend", blend.to_string().into());
    }
    if let Some(blend) = &options.reference.prosody_blend {
        push(&mut args, "--prosody_reference_blend", blend.to_string().into());
    }

    args
}

fn push(args: &mut Vec<OsString>, flag: &str, value: OsString) {
    args.push(flag.into());
    args.push(value);
}
