//! In-memory org used by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use forcesync_package::ArchiveStream;
use forcesync_protocol::{
    ContainerAsyncRequest, ContainerMember, ContainerState, DeployDetails, DeployOptions,
    DeployResult, DeployStatus, Environment, OAuthCredentials,
};
use tokio::time::Instant;

use crate::connection::{BoxFuture, OrgConnection};
use crate::error::DeployError;

pub(crate) const CONTAINER_ID: &str = "1dc000000000001";
pub(crate) const ASYNC_REQUEST_ID: &str = "1dr000000000001";
pub(crate) const DEPLOY_JOB_ID: &str = "0Af000000000001";

/// A call the mock received.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Query(String),
    CreateContainer(String),
    AddMember(String, ContainerMember),
    DeployContainer(String, bool),
    ContainerStatus(String, Instant),
    DeleteContainer(String),
    UpdateRecord(String, String, serde_json::Value),
    SubmitDeploy(Vec<String>, DeployOptions),
    DeployStatus(String),
    Refresh(String),
}

/// Mock org that records calls and replays canned statuses.
#[derive(Default)]
pub(crate) struct MockOrg {
    calls: Mutex<Vec<Call>>,
    record_ids: Mutex<Vec<String>>,
    query_delay: Option<Duration>,
    fail_create: bool,
    fail_delete: bool,
    fail_submit: bool,
    container_states: Mutex<VecDeque<ContainerAsyncRequest>>,
    deploy_results: Mutex<VecDeque<DeployResult>>,
    archive: Mutex<Option<Vec<u8>>>,
}

impl MockOrg {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Ids every query returns.
    pub(crate) fn with_record_ids(self, ids: &[&str]) -> Self {
        self.set_record_ids(ids);
        self
    }

    pub(crate) fn set_record_ids(&self, ids: &[&str]) {
        *self.record_ids.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
    }

    pub(crate) fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = Some(delay);
        self
    }

    pub(crate) fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub(crate) fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub(crate) fn failing_submit(mut self) -> Self {
        self.fail_submit = true;
        self
    }

    /// Container deploy statuses returned by successive polls.
    pub(crate) fn with_container_states(self, states: Vec<ContainerAsyncRequest>) -> Self {
        *self.container_states.lock().unwrap() = states.into();
        self
    }

    /// Archive deploy results returned by successive polls.
    pub(crate) fn with_deploy_results(self, results: Vec<DeployResult>) -> Self {
        *self.deploy_results.lock().unwrap() = results.into();
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    /// Bytes of the last submitted archive.
    pub(crate) fn archive(&self) -> Option<Vec<u8>> {
        self.archive.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

/// A container deploy status in `state`.
pub(crate) fn container_status(state: ContainerState) -> ContainerAsyncRequest {
    ContainerAsyncRequest {
        id: ASYNC_REQUEST_ID.into(),
        state,
        error_msg: None,
        deploy_details: None,
        is_check_only: false,
    }
}

/// A failed container deploy reporting `failures`.
pub(crate) fn failed_container_status(
    failures: Vec<forcesync_protocol::ComponentFailure>,
) -> ContainerAsyncRequest {
    ContainerAsyncRequest {
        deploy_details: Some(DeployDetails {
            component_failures: failures,
        }),
        ..container_status(ContainerState::Failed)
    }
}

/// An archive deploy result in `status`.
pub(crate) fn deploy_result(status: DeployStatus) -> DeployResult {
    DeployResult {
        id: DEPLOY_JOB_ID.into(),
        status,
        done: status.is_terminal(),
        success: status == DeployStatus::Succeeded,
        ..DeployResult::default()
    }
}

impl OrgConnection for MockOrg {
    fn query_record_ids<'a>(
        &'a self,
        _creds: &'a OAuthCredentials,
        soql: &'a str,
    ) -> BoxFuture<'a, Vec<String>> {
        self.record(Call::Query(soql.to_string()));
        Box::pin(async move {
            if let Some(delay) = self.query_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.record_ids.lock().unwrap().clone())
        })
    }

    fn create_container<'a>(
        &'a self,
        _creds: &'a OAuthCredentials,
        name: &'a str,
    ) -> BoxFuture<'a, String> {
        self.record(Call::CreateContainer(name.to_string()));
        Box::pin(async move {
            if self.fail_create {
                return Err(DeployError::Connection("container limit reached".into()));
            }
            Ok(CONTAINER_ID.to_string())
        })
    }

    fn add_container_member<'a>(
        &'a self,
        _creds: &'a OAuthCredentials,
        sobject: &'a str,
        member: &'a ContainerMember,
    ) -> BoxFuture<'a, String> {
        self.record(Call::AddMember(sobject.to_string(), member.clone()));
        Box::pin(async move { Ok("401000000000001".to_string()) })
    }

    fn deploy_container<'a>(
        &'a self,
        _creds: &'a OAuthCredentials,
        container_id: &'a str,
        check_only: bool,
    ) -> BoxFuture<'a, String> {
        self.record(Call::DeployContainer(container_id.to_string(), check_only));
        Box::pin(async move { Ok(ASYNC_REQUEST_ID.to_string()) })
    }

    fn container_deploy_status<'a>(
        &'a self,
        _creds: &'a OAuthCredentials,
        request_id: &'a str,
    ) -> BoxFuture<'a, ContainerAsyncRequest> {
        self.record(Call::ContainerStatus(request_id.to_string(), Instant::now()));
        Box::pin(async move {
            self.container_states
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| DeployError::Connection("no container status".into()))
        })
    }

    fn delete_container<'a>(
        &'a self,
        _creds: &'a OAuthCredentials,
        container_id: &'a str,
    ) -> BoxFuture<'a, ()> {
        self.record(Call::DeleteContainer(container_id.to_string()));
        Box::pin(async move {
            if self.fail_delete {
                return Err(DeployError::Connection("delete refused".into()));
            }
            Ok(())
        })
    }

    fn update_record<'a>(
        &'a self,
        _creds: &'a OAuthCredentials,
        sobject: &'a str,
        id: &'a str,
        fields: &'a serde_json::Value,
    ) -> BoxFuture<'a, ()> {
        self.record(Call::UpdateRecord(
            sobject.to_string(),
            id.to_string(),
            fields.clone(),
        ));
        Box::pin(async move { Ok(()) })
    }

    fn submit_deploy<'a>(
        &'a self,
        _creds: &'a OAuthCredentials,
        archive: ArchiveStream,
        options: &'a DeployOptions,
    ) -> BoxFuture<'a, String> {
        self.record(Call::SubmitDeploy(
            archive.entries().to_vec(),
            options.clone(),
        ));
        Box::pin(async move {
            if self.fail_submit {
                return Err(DeployError::Connection("upload refused".into()));
            }
            let bytes = archive
                .into_bytes()
                .await
                .map_err(|e| DeployError::Connection(e.to_string()))?;
            *self.archive.lock().unwrap() = Some(bytes);
            Ok(DEPLOY_JOB_ID.to_string())
        })
    }

    fn deploy_status<'a>(
        &'a self,
        _creds: &'a OAuthCredentials,
        job_id: &'a str,
    ) -> BoxFuture<'a, DeployResult> {
        self.record(Call::DeployStatus(job_id.to_string()));
        Box::pin(async move {
            self.deploy_results
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| DeployError::Connection("no deploy status".into()))
        })
    }

    fn refresh_access_token<'a>(
        &'a self,
        _env: Environment,
        _client_id: &'a str,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, OAuthCredentials> {
        self.record(Call::Refresh(refresh_token.to_string()));
        Box::pin(async move {
            Ok(OAuthCredentials::new(
                "refreshed",
                "https://na1.salesforce.com",
            ))
        })
    }
}
