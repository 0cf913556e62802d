//! Synthesis pipeline: validate → prepare → invoke → collect → clean up.
//!
//! Every request gets its own scratch directories; they are removed after
//! every attempt, before the result is handed back to the caller.

use std::error::Error as _;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use audio_cache::{read_wav, write_wav};
use launcher_core::config::ModelFilesConfig;
use launcher_core::validate::parse_body;
use launcher_core::{
    AudioCache, ErrorKind, InferenceJob, JobOutput, JobRunner, LauncherConfig, LauncherError,
    LauncherResult, PathsConfig, Stage, SynthesisRequest,
};
use tokio::sync::Semaphore;
use tracing::{Span, debug, error, info, instrument, warn};

use crate::args::{JobFiles, StyleSource, build_arguments};
use crate::character::{link_weights, resolve_character};
use crate::hardware::{query_gpu_info, select_hardware};
use crate::metrics::LauncherMetrics;
use crate::process::ProcessRunner;
use crate::scratch::{RequestScratch, Scratch};

/// Lines of stderr quoted when the process left no output.
const STDERR_TAIL_LINES: usize = 20;

/// Where a request is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validating,
    Preparing,
    Invoking,
    Collecting,
    CleaningUp,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Validating => "validating",
            Phase::Preparing => "preparing",
            Phase::Invoking => "invoking",
            Phase::Collecting => "collecting",
            Phase::CleaningUp => "cleaning up",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// A failed request: what went wrong, where, and what was left on disk.
#[derive(Debug)]
pub struct JobFailure {
    pub phase: Phase,
    pub error: LauncherError,
    /// Scratch listing taken before cleanup.
    pub leftovers: String,
}

impl JobFailure {
    fn new(phase: Phase, error: LauncherError) -> Self {
        Self {
            phase,
            error,
            leftovers: String::new(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    /// Message for the client.
    ///
    /// Bad input gets the validation detail only. Internal failures get the
    /// error chain, the failed phase and the scratch listing.
    pub fn client_message(&self) -> String {
        if let LauncherError::BadInput(validation) = &self.error {
            return validation.to_string();
        }

        let mut message = self.error.to_string();
        let mut source = self.error.source();
        while let Some(cause) = source {
            message.push_str(&format!("\n  caused by: {cause}"));
            source = cause.source();
        }
        message.push_str(&format!("\n\nFailed while {}.\n", self.phase));
        if !self.leftovers.is_empty() {
            message.push('\n');
            message.push_str(&self.leftovers);
        }
        message
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed while {}: {}", self.phase, self.error)
    }
}

/// Counts a job as running until dropped, so a cancelled request still
/// decrements the gauge.
struct ActiveJob<'a> {
    active: &'a AtomicUsize,
    metrics: LauncherMetrics,
}

impl<'a> ActiveJob<'a> {
    fn start(active: &'a AtomicUsize, metrics: LauncherMetrics) -> Self {
        active.fetch_add(1, Ordering::Relaxed);
        metrics.job_started();
        Self { active, metrics }
    }
}

impl Drop for ActiveJob<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        self.metrics.job_finished();
    }
}

/// Everything needed to run and collect one job.
#[derive(Debug)]
struct PreparedJob {
    job: InferenceJob,
    output_path: PathBuf,
}

/// The request-handling service.
///
/// Owns the cache and runner it was constructed with; shared between HTTP
/// handlers behind an `Arc`.
pub struct SynthesisPipeline {
    paths: PathsConfig,
    model_files: ModelFilesConfig,
    timeout: Option<Duration>,
    cache: Arc<dyn AudioCache>,
    runner: Arc<dyn JobRunner>,
    scratch: Scratch,
    job_slots: Semaphore,
    active_jobs: AtomicUsize,
    metrics: LauncherMetrics,
}

impl fmt::Debug for SynthesisPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesisPipeline")
            .field("architecture_root", &self.paths.architecture_root())
            .field("cache", &self.cache.name())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SynthesisPipeline {
    /// Create a pipeline that runs jobs as child processes.
    pub fn new(config: &LauncherConfig, cache: Arc<dyn AudioCache>) -> Self {
        Self::with_runner(config, cache, Arc::new(ProcessRunner::new()))
    }

    /// Create a pipeline with a custom job runner.
    pub fn with_runner(
        config: &LauncherConfig,
        cache: Arc<dyn AudioCache>,
        runner: Arc<dyn JobRunner>,
    ) -> Self {
        Self {
            paths: config.paths.clone(),
            model_files: config.model_files.clone(),
            timeout: config.inference.timeout(),
            cache,
            runner,
            scratch: Scratch::from_paths(&config.paths),
            job_slots: Semaphore::new(config.inference.max_concurrent_jobs.max(1)),
            active_jobs: AtomicUsize::new(0),
            metrics: LauncherMetrics,
        }
    }

    pub fn scratch(&self) -> &Scratch {
        &self.scratch
    }

    pub fn cache(&self) -> &Arc<dyn AudioCache> {
        &self.cache
    }

    /// Number of inference jobs currently running.
    pub fn active_jobs(&self) -> usize {
        self.active_jobs.load(Ordering::Relaxed)
    }

    /// Remove scratch files left by earlier runs. Call before serving.
    pub fn purge_orphans(&self) -> LauncherResult<usize> {
        self.scratch.purge_orphans()
    }

    /// Validate a raw request body and run it.
    pub async fn handle_body(&self, body: &[u8]) -> Result<(), JobFailure> {
        let start = Instant::now();
        self.metrics.request_received();

        let result = match parse_body(body) {
            Ok(request) => self.generate(&request).await,
            Err(validation) => Err(JobFailure::new(Phase::Validating, validation.into())),
        };

        match &result {
            Ok(()) => self.metrics.request_completed(),
            Err(failure) => {
                self.metrics.request_failed(failure.kind());
                if matches!(failure.error, LauncherError::Timeout { .. }) {
                    self.metrics.request_timeout();
                }
                match failure.kind() {
                    ErrorKind::BadInput => warn!(error = %failure.error, "Rejected request"),
                    ErrorKind::Internal => error!(%failure, "Synthesis failed"),
                }
            }
        }
        self.metrics
            .record_total_latency(start.elapsed().as_secs_f64() * 1000.0);
        result
    }

    /// Run a validated request.
    ///
    /// Scratch files are removed before this returns, whatever the outcome.
    #[instrument(
        skip_all,
        fields(
            character = %request.options.character,
            output = %request.output_id,
            session = request.session_id.as_deref().unwrap_or(""),
            request_id
        )
    )]
    pub async fn generate(&self, request: &SynthesisRequest) -> Result<(), JobFailure> {
        let mut scratch = self
            .scratch
            .create_request()
            .map_err(|e| JobFailure::new(Phase::Preparing, e))?;
        Span::current().record("request_id", tracing::field::display(scratch.id()));

        let outcome = self.run(request, &scratch).await.map_err(|(phase, error)| {
            JobFailure {
                phase,
                error,
                leftovers: scratch.describe(),
            }
        });

        debug!(phase = %Phase::CleaningUp, "Removing scratch");
        if let Err(e) = scratch.remove() {
            warn!("Failed to clean up scratch: {e}");
        }

        if outcome.is_ok() {
            info!(phase = %Phase::Done, "Synthesis complete");
        }
        outcome
    }

    /// Ask the architecture's interpreter which GPUs it can see.
    pub async fn gpu_info(&self) -> LauncherResult<serde_json::Value> {
        query_gpu_info(self.runner.as_ref(), &self.paths.python_executable()).await
    }

    async fn run(
        &self,
        request: &SynthesisRequest,
        scratch: &RequestScratch,
    ) -> Result<(), (Phase, LauncherError)> {
        let prepared = self
            .prepare(request, scratch)
            .map_err(|e| (Phase::Preparing, e))?;
        let output = self
            .invoke(&prepared.job)
            .await
            .map_err(|e| (Phase::Invoking, e))?;
        self.collect(request, &prepared.output_path, &output)
            .map_err(|e| (Phase::Collecting, e))
    }

    fn prepare(
        &self,
        request: &SynthesisRequest,
        scratch: &RequestScratch,
    ) -> LauncherResult<PreparedJob> {
        let options = &request.options;
        let profile = resolve_character(
            &self.paths.characters_dir(),
            &self.model_files,
            &options.character,
        )?;
        let weights = link_weights(
            &profile,
            &self.paths.weights_link_dir(),
            &self.model_files.weights_extension,
        )?;

        let style = match (options.reference.enabled, options.reference.item_id.as_deref()) {
            (true, Some(item_id)) => StyleSource::ReferenceAudio(
                self.prepare_reference(request, scratch, item_id)
                    .map_err(LauncherError::reference_audio)?,
            ),
            _ => profile
                .style
                .clone()
                .map_or(StyleSource::None, StyleSource::DefaultStyle),
        };

        let output_path = scratch
            .output_dir()
            .join(format!("{}.wav", request.output_id));
        let args = build_arguments(
            request,
            &JobFiles {
                weights: &weights,
                config: &profile.config,
                output: &output_path,
                style: &style,
            },
        );

        let job = InferenceJob::new(self.paths.python_executable())
            .arg(self.paths.inference_script())
            .args(args)
            .envs(select_hardware(&request.gpu_id))
            .working_dir(self.paths.architecture_root())
            .timeout(self.timeout);

        Ok(PreparedJob { job, output_path })
    }

    /// Write the cached reference clip where the inference process can read it.
    fn prepare_reference(
        &self,
        request: &SynthesisRequest,
        scratch: &RequestScratch,
        item_id: &str,
    ) -> LauncherResult<PathBuf> {
        let audio = self.cache.read_audio(
            Stage::Preprocessed,
            request.session_id.as_deref(),
            item_id,
        )?;
        let path = scratch.input_dir().join(format!("{item_id}.wav"));
        write_wav(&path, &audio)?;
        debug!(path = %path.display(), samples = audio.num_samples(), "Wrote reference audio");
        Ok(path)
    }

    async fn invoke(&self, job: &InferenceJob) -> LauncherResult<JobOutput> {
        let _slot = self
            .job_slots
            .acquire()
            .await
            .map_err(|e| LauncherError::internal(format!("job slots closed: {e}")))?;

        let active = ActiveJob::start(&self.active_jobs, self.metrics);
        let start = Instant::now();
        let result = self.runner.run(job).await;
        drop(active);
        self.metrics
            .record_inference_latency(start.elapsed().as_secs_f64() * 1000.0);

        let output = result?;
        if !output.success() {
            warn!(
                code = ?output.code,
                stderr = %tail(&output.stderr, STDERR_TAIL_LINES),
                "Inference process exited unsuccessfully"
            );
        }
        Ok(output)
    }

    fn collect(
        &self,
        request: &SynthesisRequest,
        output_path: &std::path::Path,
        output: &JobOutput,
    ) -> LauncherResult<()> {
        let audio = read_wav(output_path).map_err(|e| {
            let mut reason = e.to_string();
            if !output.success() {
                reason.push_str(&format!(
                    "; process exited with {:?}, stderr:\n{}",
                    output.code,
                    tail(&output.stderr, STDERR_TAIL_LINES)
                ));
            }
            LauncherError::output_missing(output_path, reason)
        })?;

        self.cache.save_audio(
            Stage::Output,
            request.session_id.as_deref(),
            &request.output_id,
            &audio,
        )?;
        info!(
            samples = audio.num_samples(),
            sample_rate = audio.sample_rate,
            duration_ms = audio.duration_ms(),
            "Cached output"
        );
        Ok(())
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
