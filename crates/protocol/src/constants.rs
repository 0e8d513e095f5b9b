use std::time::Duration;

/// OAuth consumer key of the forcesync connected app.
pub const DEFAULT_CLIENT_ID: &str =
    "3MVG9xOCXq4ID1uHM155ZfXCXD8FgKFU8zNRnyt3JS07eYXfuhyjwlV0iw.BOS8mS6os74WuS.xCLXM_kG7un";

/// API version used for REST paths and the package manifest.
pub const DEFAULT_API_VERSION: &str = "36.0";

/// Namespace carried by the root element of `package.xml`.
pub const METADATA_NAMESPACE: &str = "http://soap.sforce.com/2006/04/metadata";

/// Delay between two status checks of an asynchronous deploy.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Prefix for the ephemeral `MetadataContainer` created per save.
///
/// Container names are limited to 32 characters; the prefix leaves room
/// for a 16-character random suffix.
pub const CONTAINER_NAME_PREFIX: &str = "forcesync-";

/// Root folder of every deploy archive.
pub const ARCHIVE_ROOT: &str = "src";

/// Suffix of the metadata descriptor that sits next to every source file.
pub const META_SUFFIX: &str = "-meta.xml";

/// Scope requested during the implicit-grant flow.
pub const OAUTH_SCOPE: &str = "full refresh_token";

/// Tooling API sobject holding in-progress container saves.
pub const SOBJECT_METADATA_CONTAINER: &str = "MetadataContainer";

/// Tooling API sobject tracking a container deploy.
pub const SOBJECT_CONTAINER_ASYNC_REQUEST: &str = "ContainerAsyncRequest";
