//! Tooling API payloads: queries, container artifacts and container deploy status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result page of a Tooling query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult<T> {
    pub total_size: u32,
    pub done: bool,
    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
}

/// A query record projected to its `Id` only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordId {
    #[serde(rename = "Id")]
    pub id: String,
}

/// Error entry returned by the REST API, either in an error response body
/// or inside a [`SaveResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorDetail {
    #[serde(default, alias = "statusCode")]
    pub error_code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl fmt::Display for ApiErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.error_code.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.error_code, self.message)
        }
    }
}

/// Response of an sobject create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResult {
    pub id: String,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

/// Body of a `MetadataContainer` create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContainer {
    #[serde(rename = "Name")]
    pub name: String,
}

/// A `<Type>Member` artifact attached to a container: new body for an
/// existing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerMember {
    pub metadata_container_id: String,
    pub content_entity_id: String,
    pub body: String,
}

/// Body of a `ContainerAsyncRequest` create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewContainerDeploy {
    pub metadata_container_id: String,
    pub is_check_only: bool,
}

/// State of a container deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerState {
    Queued,
    InProgress,
    Completed,
    Failed,
    Error,
    Aborted,
    Invalidated,
    /// Forward compatibility: unknown states deserialize here.
    #[serde(other)]
    Unknown,
}

impl ContainerState {
    /// True while the deploy has not reached a terminal state.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Queued | Self::InProgress)
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Compile problem reported for one component.
///
/// Carries the line, column and message a linter needs to place a
/// diagnostic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentFailure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u32>,
    #[serde(default)]
    pub problem: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
}

impl fmt::Display for ComponentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line_number, self.column_number) {
            (Some(line), Some(col)) => write!(f, "{line}:{col}: {}", self.problem),
            (Some(line), None) => write!(f, "{line}: {}", self.problem),
            _ => f.write_str(&self.problem),
        }
    }
}

/// Per-component results of a deploy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployDetails {
    #[serde(default)]
    pub component_failures: Vec<ComponentFailure>,
}

/// Status record of a container deploy (`ContainerAsyncRequest`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerAsyncRequest {
    pub id: String,
    pub state: ContainerState,
    #[serde(default)]
    pub error_msg: Option<String>,
    #[serde(default)]
    pub deploy_details: Option<DeployDetails>,
    #[serde(default)]
    pub is_check_only: bool,
}

impl ContainerAsyncRequest {
    /// First reported component failure, if any.
    pub fn first_failure(&self) -> Option<&ComponentFailure> {
        self.deploy_details
            .as_ref()
            .and_then(|d| d.component_failures.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_failed_container_request() {
        let json = r#"{
            "attributes": {"type": "ContainerAsyncRequest"},
            "Id": "1drx0000000001",
            "State": "Failed",
            "ErrorMsg": null,
            "IsCheckOnly": false,
            "DeployDetails": {
                "allComponentMessages": [],
                "componentFailures": [
                    {"lineNumber": 5, "columnNumber": 1, "problem": "syntax error",
                     "problemType": "Error", "fullName": "Foo", "componentType": "ApexClass"}
                ],
                "componentSuccesses": []
            }
        }"#;
        let req: ContainerAsyncRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.state, ContainerState::Failed);
        let failure = req.first_failure().unwrap();
        assert_eq!(failure.line_number, Some(5));
        assert_eq!(failure.column_number, Some(1));
        assert_eq!(failure.problem, "syntax error");
        assert_eq!(failure.to_string(), "5:1: syntax error");
    }

    #[test]
    fn unknown_state_is_tolerated() {
        let req: ContainerAsyncRequest =
            serde_json::from_str(r#"{"Id":"1dr","State":"Exploded"}"#).unwrap();
        assert_eq!(req.state, ContainerState::Unknown);
        assert!(!req.state.is_pending());
        assert!(req.first_failure().is_none());
    }

    #[test]
    fn pending_states() {
        assert!(ContainerState::Queued.is_pending());
        assert!(ContainerState::InProgress.is_pending());
        assert!(!ContainerState::Completed.is_pending());
        assert!(!ContainerState::Error.is_pending());
    }

    #[test]
    fn container_member_uses_pascal_case() {
        let member = ContainerMember {
            metadata_container_id: "1dc".into(),
            content_entity_id: "01p".into(),
            body: "public class Foo {}".into(),
        };
        let value = serde_json::to_value(&member).unwrap();
        assert_eq!(value["MetadataContainerId"], "1dc");
        assert_eq!(value["ContentEntityId"], "01p");
        assert_eq!(value["Body"], "public class Foo {}");
    }

    #[test]
    fn query_result_records() {
        let json = r#"{"size":1,"totalSize":1,"done":true,
            "records":[{"attributes":{"type":"ApexClass"},"Id":"01p000000000001"}]}"#;
        let result: QueryResult<RecordId> = serde_json::from_str(json).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].id, "01p000000000001");
    }

    #[test]
    fn api_error_accepts_status_code_alias() {
        let detail: ApiErrorDetail =
            serde_json::from_str(r#"{"statusCode":"DUPLICATE_VALUE","message":"dup","fields":[]}"#)
                .unwrap();
        assert_eq!(detail.to_string(), "DUPLICATE_VALUE: dup");
    }
}
