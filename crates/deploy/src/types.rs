//! Session events and workflow outcomes.

use std::path::PathBuf;

use forcesync_protocol::{ComponentFailure, DeployResult};

/// Lifecycle notification broadcast by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// An incremental save started.
    SaveStarted { file_name: String },
    /// An incremental save completed.
    SaveCompleted { file_name: String },
    /// The org rejected the saved source; `failure` locates the problem.
    SaveFailed {
        file_path: PathBuf,
        failure: ComponentFailure,
    },
    /// An incremental save ended in an error with no source location.
    SaveError { file_name: String, message: String },
    /// The org began executing an archive deploy.
    DeployStarted { job_id: String },
    /// An archive deploy succeeded.
    DeployCompleted { job_id: String, result: DeployResult },
    /// An archive deploy failed. `job_id` is `None` when the failure
    /// happened before the org accepted the submission.
    DeployFailed {
        job_id: Option<String>,
        message: String,
        failures: Vec<ComponentFailure>,
    },
}

/// Result of one incremental save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Another save was already running on the session; nothing was sent.
    Skipped,
    Completed,
    /// Compile failure, with the first reported problem.
    Failed(ComponentFailure),
    Error(String),
}

impl SaveOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}
