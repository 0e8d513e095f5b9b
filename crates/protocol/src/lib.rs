//! Wire types shared by the forcesync crates.
//!
//! Nothing here performs I/O: these are the shapes exchanged with the
//! remote org (Tooling and Metadata API payloads, OAuth credentials) and
//! the classification of local source files into remote metadata types.

pub mod auth;
pub mod constants;
pub mod metadata;
pub mod tooling;
pub mod types;

// Re-export primary types for convenience.
pub use auth::{AuthError, Environment, OAuthCredentials, authorization_uri};
pub use metadata::{
    DeployOptions, DeployRequest, DeployResult, DeployStatus, TestLevel, parse_test_filter,
};
pub use tooling::{
    ApiErrorDetail, ComponentFailure, ContainerAsyncRequest, ContainerMember, ContainerState,
    DeployDetails, NewContainer, NewContainerDeploy, QueryResult, RecordId, SaveResult,
};
pub use types::{MetadataType, NameFormatError, SourceFile, SourceName};
