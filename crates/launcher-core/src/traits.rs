//! Trait definitions for the pipeline's external collaborators.

use crate::error::LauncherResult;
use crate::types::{AudioData, InferenceJob, JobOutput, Stage};

/// Audio cache shared with the other services of the installation.
///
/// Entries are addressed by stage, session and item id. Calls are blocking;
/// implementations must be safe to share between concurrent requests.
pub trait AudioCache: Send + Sync {
    /// Read an entry.
    ///
    /// # Returns
    /// The cached audio, or an error if the entry is missing or unreadable.
    fn read_audio(
        &self,
        stage: Stage,
        session_id: Option<&str>,
        item_id: &str,
    ) -> LauncherResult<AudioData>;

    /// Write an entry, replacing any previous entry at the same address.
    fn save_audio(
        &self,
        stage: Stage,
        session_id: Option<&str>,
        item_id: &str,
        audio: &AudioData,
    ) -> LauncherResult<()>;

    /// Backend name, for logs.
    fn name(&self) -> &'static str;
}

/// Runs external processes.
///
/// The runner only reports what happened; interpreting exit codes is left to
/// the caller.
#[async_trait::async_trait]
pub trait JobRunner: Send + Sync {
    /// Run the job to completion or until its timeout.
    ///
    /// # Errors
    /// `Launch` if the program could not be started, `Timeout` if it ran past
    /// `job.timeout`.
    async fn run(&self, job: &InferenceJob) -> LauncherResult<JobOutput>;
}
