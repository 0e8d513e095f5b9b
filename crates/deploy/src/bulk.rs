//! Archive-based multi-file deploy.
//!
//! Builds a manifest and archive for the given files, submits them as one
//! asynchronous deploy and polls the job until it ends. Unlike incremental
//! saves there is no per-session guard: concurrent bulk deploys on one
//! session are not serialized.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use forcesync_package::{ArchiveAssembler, PackageDescriptor};
use forcesync_protocol::{DeployOptions, DeployResult, DeployStatus, OAuthCredentials, SourceFile};
use tracing::{debug, error, info};

use crate::error::DeployError;
use crate::poll::poll_until;
use crate::session::RemoteSession;
use crate::types::SessionEvent;

/// Deploys `file_paths` as one archive.
///
/// A non-empty comma-separated `test_filter` runs only the named test
/// classes; otherwise the org's default test level applies. Every failure
/// after the credential check is also broadcast as
/// [`SessionEvent::DeployFailed`].
pub(crate) async fn deploy_many(
    session: &RemoteSession,
    file_paths: &[PathBuf],
    test_filter: Option<&str>,
) -> Result<DeployResult, DeployError> {
    if !session.config().metadata_enabled {
        return Err(DeployError::FeatureDisabled {
            feature: "metadata",
        });
    }
    let creds = session.require_credentials()?;
    let options = DeployOptions::with_test_filter(test_filter);

    let job_id = match submit(session, &creds, file_paths, &options).await {
        Ok(id) => id,
        Err(e) => return Err(fail(session, None, e)),
    };

    let result = match watch(session, &creds, &job_id).await {
        Ok(result) => result,
        Err(e) => return Err(fail(session, Some(job_id), e)),
    };

    if result.status == DeployStatus::Succeeded {
        info!(job = %job_id, components = result.number_components_deployed, "deploy completed");
        session.emit(SessionEvent::DeployCompleted {
            job_id,
            result: result.clone(),
        });
        return Ok(result);
    }

    let message = result.failure_message();
    let failures = result.component_failures().to_vec();
    let err = if failures.is_empty() {
        DeployError::RemoteDeployError(message)
    } else {
        DeployError::RemoteDeployFailed { message, failures }
    };
    Err(fail(session, Some(job_id), err))
}

/// Packages the files and submits the archive; returns the job id.
async fn submit(
    session: &RemoteSession,
    creds: &OAuthCredentials,
    file_paths: &[PathBuf],
    options: &DeployOptions,
) -> Result<String, DeployError> {
    let sources = file_paths
        .iter()
        .map(|path| SourceFile::new(path.as_path()))
        .collect::<Result<Vec<_>, _>>()?;

    let manifest = PackageDescriptor::from_sources(sources.iter().map(|s| &s.name))
        .with_api_version(&session.config().api_version);
    let archive = ArchiveAssembler::new().assemble(sources, manifest.to_xml())?;

    info!(files = file_paths.len(), test_level = ?options.test_level, "submitting deploy");
    let job_id = session
        .connection()
        .submit_deploy(creds, archive, options)
        .await?;
    debug!(job = %job_id, "deploy accepted");
    Ok(job_id)
}

/// Polls the job until it ends, announcing when it starts executing.
async fn watch(
    session: &RemoteSession,
    creds: &OAuthCredentials,
    job_id: &str,
) -> Result<DeployResult, DeployError> {
    let conn = session.connection();
    let started = AtomicBool::new(false);
    let started = &started;

    poll_until(&session.config().poll, |attempt| async move {
        let result = conn
            .deploy_status(creds, job_id)
            .await
            .map_err(|e| DeployError::PollTransport(e.to_string()))?;
        debug!(
            attempt,
            status = %result.status,
            deployed = result.number_components_deployed,
            total = result.number_components_total,
            "deploy status"
        );

        // Submission is queued separately from execution; announce the
        // start only once the job leaves the queue.
        if result.status.has_started() && !started.swap(true, Ordering::AcqRel) {
            session.emit(SessionEvent::DeployStarted {
                job_id: job_id.to_string(),
            });
        }

        Ok((result.done || result.status.is_terminal()).then_some(result))
    })
    .await
}

/// Broadcasts a failed deploy and hands the error back.
fn fail(session: &RemoteSession, job_id: Option<String>, err: DeployError) -> DeployError {
    error!(job = ?job_id, error = %err, "deploy failed");
    let failures = match &err {
        DeployError::RemoteDeployFailed { failures, .. } => failures.clone(),
        _ => Vec::new(),
    };
    let message = match &err {
        DeployError::RemoteDeployFailed { message, .. } | DeployError::RemoteDeployError(message) => {
            message.clone()
        }
        other => other.to_string(),
    };
    session.emit(SessionEvent::DeployFailed {
        job_id,
        message,
        failures,
    });
    err
}
