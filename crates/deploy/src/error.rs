//! Deploy error types.

use forcesync_protocol::{ComponentFailure, MetadataType, NameFormatError};

/// Errors produced by sessions and deploy workflows.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    NameFormat(#[from] NameFormatError),

    #[error("not authenticated: no credentials for this org")]
    NotAuthenticated,

    #[error("{file_name} is not valid UTF-8")]
    InvalidEncoding { file_name: String },

    #[error("no refresh token stored for this org")]
    NoRefreshToken,

    #[error("{feature} deploys are disabled for this session")]
    FeatureDisabled { feature: &'static str },

    #[error("no {kind} record named {name}")]
    RecordNotFound { kind: MetadataType, name: String },

    #[error("{count} {kind} records named {name}")]
    AmbiguousRecord {
        kind: MetadataType,
        name: String,
        count: usize,
    },

    #[error("deploy failed: {message}")]
    RemoteDeployFailed {
        message: String,
        failures: Vec<ComponentFailure>,
    },

    #[error("deploy error: {0}")]
    RemoteDeployError(String),

    #[error("status poll failed: {0}")]
    PollTransport(String),

    #[error("job still pending after {attempts} status checks")]
    PollTimeout { attempts: u32 },

    #[error("package error: {0}")]
    Package(#[from] forcesync_package::PackageError),

    #[error("REST error: {0}")]
    Rest(#[from] forcesync_rest::Error),

    #[error("connection error: {0}")]
    Connection(String),
}
