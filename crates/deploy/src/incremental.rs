//! Incremental single-file save.
//!
//! Apex classes, triggers and pages are saved through an ephemeral
//! `MetadataContainer`:
//!
//! 1. **Acquire**: create the container and resolve the file's record id
//!    concurrently
//! 2. **Attach**: add a `<Type>Member` artifact carrying the new body
//! 3. **Deploy**: start a container deploy (`IsCheckOnly = false`)
//! 4. **Poll**: check the deploy status until it leaves the queue
//! 5. **Clean up**: delete the container, then release the session
//!
//! A container cannot deploy the same member twice after a successful
//! save, so it is deleted after every attempt. Static resources skip the
//! container and update their record directly.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use forcesync_protocol::constants::CONTAINER_NAME_PREFIX;
use forcesync_protocol::{
    ContainerAsyncRequest, ContainerMember, ContainerState, OAuthCredentials, SourceName,
};
use tracing::{debug, info, warn};

use crate::error::DeployError;
use crate::guard::SaveTicket;
use crate::poll::poll_until;
use crate::session::RemoteSession;
use crate::types::{SaveOutcome, SessionEvent};

/// Saves `content` as the new body of the file at `file_path`.
///
/// Returns [`SaveOutcome::Skipped`] without contacting the org when
/// another save is running on the session. Once a save starts, its
/// outcome is both broadcast as an event and returned; `Err` is reserved
/// for requests refused before anything was sent: a bad file name,
/// source that is not UTF-8, missing credentials or disabled tooling.
pub(crate) async fn save_one(
    session: &RemoteSession,
    file_path: &Path,
    content: &[u8],
) -> Result<SaveOutcome, DeployError> {
    let name = SourceName::from_path(file_path)?;
    if !session.config().tooling_enabled {
        return Err(DeployError::FeatureDisabled { feature: "tooling" });
    }
    let creds = session.require_credentials()?;

    // Container members carry source text; static resources are sent as
    // base64 and may hold any bytes.
    let member = name
        .kind()
        .member_sobject()
        .map(|sobject| match String::from_utf8(content.to_vec()) {
            Ok(body) => Ok((sobject, body)),
            Err(_) => Err(DeployError::InvalidEncoding {
                file_name: name.file_name().to_string(),
            }),
        })
        .transpose()?;

    let Some(ticket) = session.save_state().try_begin() else {
        debug!(file = %name, "save already in flight, skipping");
        return Ok(SaveOutcome::Skipped);
    };

    info!(file = %name, kind = %name.kind(), "saving");
    session.emit(SessionEvent::SaveStarted {
        file_name: name.file_name().to_string(),
    });

    let outcome = match member {
        Some((member_sobject, body)) => {
            let result =
                container_save(session, &ticket, &creds, &name, member_sobject, body).await;
            let outcome = classify(result);
            emit_outcome(session, file_path, &name, &outcome);
            teardown(session, &ticket, &creds).await;
            outcome
        }
        None => {
            let outcome = direct_update(session, &creds, &name, content).await;
            emit_outcome(session, file_path, &name, &outcome);
            outcome
        }
    };

    drop(ticket);
    Ok(outcome)
}

/// Updates a static resource body in place.
async fn direct_update(
    session: &RemoteSession,
    creds: &OAuthCredentials,
    name: &SourceName,
    content: &[u8],
) -> SaveOutcome {
    let conn = session.connection();
    let result = async {
        let id = session.identity_cache().resolve(conn, creds, name).await?;
        let fields = serde_json::json!({ "Body": BASE64.encode(content) });
        conn.update_record(creds, name.kind().api_name(), &id, &fields)
            .await
    }
    .await;

    match result {
        Ok(()) => SaveOutcome::Completed,
        Err(e) => SaveOutcome::Error(e.to_string()),
    }
}

/// Runs the container steps up to the terminal deploy status.
async fn container_save(
    session: &RemoteSession,
    ticket: &SaveTicket<'_>,
    creds: &OAuthCredentials,
    name: &SourceName,
    member_sobject: &str,
    body: String,
) -> Result<ContainerAsyncRequest, DeployError> {
    let conn = session.connection();
    let container_name = container_name();

    // Both halves always run to completion, so a created container is
    // recorded for teardown even when the lookup fails.
    let (container, entity) = tokio::join!(
        async {
            let id = conn.create_container(creds, &container_name).await?;
            debug!(container = %id, "container created");
            ticket.record_container(id.clone());
            Ok::<_, DeployError>(id)
        },
        session.identity_cache().resolve(conn, creds, name),
    );
    let container_id = container?;
    let entity_id = entity?;

    let member = ContainerMember {
        metadata_container_id: container_id.clone(),
        content_entity_id: entity_id,
        body,
    };
    conn.add_container_member(creds, member_sobject, &member)
        .await?;

    let request_id = conn.deploy_container(creds, &container_id, false).await?;
    debug!(request = %request_id, "container deploy started");

    let request_id = request_id.as_str();
    poll_until(&session.config().poll, |attempt| async move {
        let status = conn
            .container_deploy_status(creds, request_id)
            .await
            .map_err(|e| DeployError::PollTransport(e.to_string()))?;
        debug!(attempt, state = %status.state, "container deploy status");
        Ok((!status.state.is_pending()).then_some(status))
    })
    .await
}

/// Maps the end of a container save to its outcome.
fn classify(result: Result<ContainerAsyncRequest, DeployError>) -> SaveOutcome {
    let status = match result {
        Ok(status) => status,
        Err(e) => return SaveOutcome::Error(e.to_string()),
    };

    match status.state {
        ContainerState::Completed => SaveOutcome::Completed,
        ContainerState::Failed => match status.first_failure() {
            Some(failure) => SaveOutcome::Failed(failure.clone()),
            None => SaveOutcome::Error(
                non_empty(status.error_msg).unwrap_or_else(|| "deploy failed".into()),
            ),
        },
        ContainerState::Error => SaveOutcome::Error(
            non_empty(status.error_msg).unwrap_or_else(|| "unknown error".into()),
        ),
        other => SaveOutcome::Error(match non_empty(status.error_msg) {
            Some(msg) => format!("container deploy {other}: {msg}"),
            None => format!("container deploy {other}"),
        }),
    }
}

fn non_empty(msg: Option<String>) -> Option<String> {
    msg.filter(|m| !m.is_empty())
}

fn emit_outcome(session: &RemoteSession, file_path: &Path, name: &SourceName, outcome: &SaveOutcome) {
    let file_name = name.file_name().to_string();
    let event = match outcome {
        SaveOutcome::Skipped => return,
        SaveOutcome::Completed => {
            info!(file = %name, "save completed");
            SessionEvent::SaveCompleted { file_name }
        }
        SaveOutcome::Failed(failure) => {
            info!(file = %name, problem = %failure, "save failed");
            SessionEvent::SaveFailed {
                file_path: file_path.to_path_buf(),
                failure: failure.clone(),
            }
        }
        SaveOutcome::Error(message) => {
            warn!(file = %name, error = %message, "save error");
            SessionEvent::SaveError {
                file_name,
                message: message.clone(),
            }
        }
    };
    session.emit(event);
}

/// Deletes the container this save opened, if any. Failures are logged
/// and never change the save's outcome.
async fn teardown(session: &RemoteSession, ticket: &SaveTicket<'_>, creds: &OAuthCredentials) {
    let Some(id) = ticket.take_container() else {
        return;
    };
    match session.connection().delete_container(creds, &id).await {
        Ok(()) => debug!(container = %id, "container deleted"),
        Err(e) => warn!(container = %id, error = %e, "failed to delete container"),
    }
}

/// A fresh container name within the 32-character limit.
fn container_name() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{CONTAINER_NAME_PREFIX}{}", &suffix[..16])
}
