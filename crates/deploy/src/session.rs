//! One authenticated connection to one org.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use forcesync_protocol::constants::{DEFAULT_API_VERSION, DEFAULT_CLIENT_ID};
use forcesync_protocol::{DeployResult, Environment, OAuthCredentials, authorization_uri};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::cache::EntityIdentityCache;
use crate::connection::OrgConnection;
use crate::error::DeployError;
use crate::guard::SaveState;
use crate::poll::PollConfig;
use crate::types::{SaveOutcome, SessionEvent};

const EVENT_CAPACITY: usize = 64;

/// Connection settings of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// OAuth consumer key.
    pub client_id: String,
    pub environment: Environment,
    /// API version for REST paths and manifests, e.g. `36.0`.
    pub api_version: String,
    /// Allows incremental (container) saves.
    pub tooling_enabled: bool,
    /// Allows archive deploys.
    pub metadata_enabled: bool,
    pub poll: PollConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(Environment::default())
    }
}

impl SessionConfig {
    /// Default settings for `environment`.
    pub fn new(environment: Environment) -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            environment,
            api_version: DEFAULT_API_VERSION.to_string(),
            tooling_enabled: true,
            metadata_enabled: true,
            poll: PollConfig::default(),
        }
    }
}

/// A session against one org.
///
/// Owns the credentials, the record-id cache, the incremental-save state
/// and the event channel. Share it behind an `Arc` to save from several
/// tasks; incremental saves on the same session never overlap.
pub struct RemoteSession {
    config: SessionConfig,
    connection: Arc<dyn OrgConnection>,
    credentials: RwLock<Option<OAuthCredentials>>,
    cache: EntityIdentityCache,
    save: SaveState,
    events: broadcast::Sender<SessionEvent>,
}

impl RemoteSession {
    /// Creates an unauthenticated session.
    pub fn new(config: SessionConfig, connection: Arc<dyn OrgConnection>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            connection,
            credentials: RwLock::new(None),
            cache: EntityIdentityCache::new(),
            save: SaveState::default(),
            events,
        }
    }

    /// Creates a session backed by a REST client for `config.api_version`.
    pub fn connect(config: SessionConfig) -> Result<Self, DeployError> {
        let client = forcesync_rest::Client::new()?.with_api_version(config.api_version.clone());
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn with_credentials(self, creds: OAuthCredentials) -> Self {
        self.set_credentials(creds);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn environment(&self) -> Environment {
        self.config.environment
    }

    /// URL the OAuth popup should load to authorize this session's org.
    pub fn authorization_uri(&self) -> String {
        authorization_uri(self.config.environment, &self.config.client_id)
    }

    pub fn set_credentials(&self, creds: OAuthCredentials) {
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(creds);
    }

    pub fn clear_credentials(&self) {
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn credentials(&self) -> Option<OAuthCredentials> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Subscribes to this session's lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// True while an incremental save is running.
    pub fn is_saving(&self) -> bool {
        self.save.is_saving()
    }

    /// Container held open by the running incremental save.
    pub fn open_container(&self) -> Option<String> {
        self.save.open_container()
    }

    pub fn identity_cache(&self) -> &EntityIdentityCache {
        &self.cache
    }

    /// Exchanges the stored refresh token for a new access token and
    /// stores the result. The refresh token itself is kept.
    pub async fn refresh_credentials(&self) -> Result<OAuthCredentials, DeployError> {
        let current = self.require_credentials()?;
        let refresh_token = current.refresh_token.ok_or(DeployError::NoRefreshToken)?;

        let mut fresh = self
            .connection
            .refresh_access_token(
                self.config.environment,
                &self.config.client_id,
                &refresh_token,
            )
            .await?;
        if fresh.refresh_token.is_none() {
            fresh.refresh_token = Some(refresh_token);
        }

        info!(env = %self.config.environment, instance = %fresh.instance_url, "access token refreshed");
        self.set_credentials(fresh.clone());
        Ok(fresh)
    }

    /// Saves one file through a container deploy, or a direct record
    /// update for static resources.
    ///
    /// Returns `Err` only when the save is refused before it starts
    /// (unrecognized file name, source that is not UTF-8, tooling
    /// disabled, no credentials). Once started, the outcome is returned
    /// and also broadcast as an event.
    /// A call made while another save runs returns [`SaveOutcome::Skipped`].
    pub async fn save_one(
        &self,
        file_path: impl AsRef<Path>,
        content: &[u8],
    ) -> Result<SaveOutcome, DeployError> {
        crate::incremental::save_one(self, file_path.as_ref(), content).await
    }

    /// Deploys files as one archive and waits for the job to finish.
    ///
    /// `test_filter` is a comma-separated list of test classes to run.
    pub async fn deploy_many(
        &self,
        file_paths: &[PathBuf],
        test_filter: Option<&str>,
    ) -> Result<DeployResult, DeployError> {
        crate::bulk::deploy_many(self, file_paths, test_filter).await
    }

    pub(crate) fn require_credentials(&self) -> Result<OAuthCredentials, DeployError> {
        self.credentials().ok_or(DeployError::NotAuthenticated)
    }

    pub(crate) fn connection(&self) -> &dyn OrgConnection {
        self.connection.as_ref()
    }

    pub(crate) fn save_state(&self) -> &SaveState {
        &self.save
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        debug!(?event, "session event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
