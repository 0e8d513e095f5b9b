//! Metadata API archive deploy: options, request and result.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tooling::{ComponentFailure, DeployDetails};

/// Which Apex tests run as part of a deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestLevel {
    NoTestRun,
    RunSpecifiedTests,
    RunLocalTests,
    RunAllTestsInOrg,
}

/// Options sent with an archive deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOptions {
    pub check_only: bool,
    pub rollback_on_error: bool,
    pub single_package: bool,
    /// `None` leaves the platform's default test level in effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_level: Option<TestLevel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub run_tests: Vec<String>,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            check_only: false,
            rollback_on_error: true,
            single_package: false,
            test_level: None,
            run_tests: Vec::new(),
        }
    }
}

impl DeployOptions {
    /// Options for a deploy that runs only the tests named in `filter`
    /// (comma-separated). An empty or absent filter keeps the default
    /// test level.
    pub fn with_test_filter(filter: Option<&str>) -> Self {
        let tests = filter.map(parse_test_filter).unwrap_or_default();
        if tests.is_empty() {
            return Self::default();
        }
        Self {
            test_level: Some(TestLevel::RunSpecifiedTests),
            run_tests: tests,
            ..Self::default()
        }
    }
}

/// Splits a comma-separated list of test class names, trimming blanks.
pub fn parse_test_filter(filter: &str) -> Vec<String> {
    filter
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Status of an archive deploy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployStatus {
    #[default]
    Pending,
    InProgress,
    Succeeded,
    SucceededPartial,
    Failed,
    Canceling,
    Canceled,
    /// A status this client does not know. Polled like `Pending` until
    /// the job reports `done`.
    #[serde(other)]
    Unknown,
}

impl DeployStatus {
    /// True once the remote job has left the submission queue.
    pub fn has_started(self) -> bool {
        !matches!(self, Self::Pending | Self::Unknown)
    }

    /// True for states the job never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::SucceededPartial | Self::Failed | Self::Canceled
        )
    }
}

impl fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of an archive deploy, as reported while polling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResult {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: DeployStatus,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_status_code: Option<String>,
    #[serde(default)]
    pub state_detail: Option<String>,
    #[serde(default)]
    pub number_components_deployed: u32,
    #[serde(default)]
    pub number_components_total: u32,
    #[serde(default)]
    pub number_component_errors: u32,
    #[serde(default)]
    pub number_tests_completed: u32,
    #[serde(default)]
    pub number_test_errors: u32,
    #[serde(default)]
    pub details: Option<DeployDetails>,
}

impl DeployResult {
    /// Component failures reported by the deploy.
    pub fn component_failures(&self) -> &[ComponentFailure] {
        self.details
            .as_ref()
            .map(|d| d.component_failures.as_slice())
            .unwrap_or_default()
    }

    /// A one-line description of why the deploy did not succeed.
    pub fn failure_message(&self) -> String {
        if let Some(msg) = self.error_message.as_deref().filter(|m| !m.is_empty()) {
            return msg.to_string();
        }
        match self.component_failures() {
            [] => format!("deploy {}", self.status),
            [first, ..] => first.to_string(),
        }
    }
}

/// Envelope of the deploy request resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_options: Option<DeployOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_result: Option<DeployResult>,
}
