//! The project file and its store.
//!
//! The file lives at `<project root>/.forcesync`:
//!
//! ```json
//! {
//!   "primary": { "name": "dev", "env": "sandbox", "oauth": { "access_token": "…", "instance_url": "…" } },
//!   "others": [],
//!   "settings": { "apiVersion": "36.0", "pollIntervalMs": 500 }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use forcesync_deploy::{OrgConnection, PollConfig, RemoteSession, SessionConfig};
use forcesync_protocol::constants::{DEFAULT_API_VERSION, DEFAULT_POLL_INTERVAL};
use forcesync_protocol::{Environment, OAuthCredentials};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Name of the project file inside the project root.
pub const PROJECT_FILE_NAME: &str = ".forcesync";

/// Shortest delay allowed between two status checks.
const MIN_POLL_INTERVAL_MS: u64 = 100;

/// Errors from reading or updating the project file.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no project file at {}", .0.display())]
    NotConfigured(PathBuf),

    #[error("no org named {0} in this project")]
    UnknownOrg(String),

    #[error("REST error: {0}")]
    Rest(#[from] forcesync_rest::Error),
}

/// One authorized org.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgEntry {
    /// Label the user picked for the org.
    pub name: String,
    #[serde(default)]
    pub env: Environment,
    pub oauth: OAuthCredentials,
}

impl OrgEntry {
    pub fn new(name: impl Into<String>, env: Environment, oauth: OAuthCredentials) -> Self {
        Self {
            name: name.into(),
            env,
            oauth,
        }
    }

    /// Opens an authenticated session for this org over `connection`.
    pub fn open_session(
        &self,
        settings: &ProjectSettings,
        connection: Arc<dyn OrgConnection>,
    ) -> RemoteSession {
        debug!(org = %self.name, env = %self.env, "opening session");
        RemoteSession::new(settings.session_config(self.env), connection)
            .with_credentials(self.oauth.clone())
    }

    /// Opens an authenticated session backed by the REST client.
    pub fn connect(&self, settings: &ProjectSettings) -> Result<RemoteSession, ProjectError> {
        let client = forcesync_rest::Client::new()?.with_api_version(settings.api_version.clone());
        Ok(self.open_session(settings, Arc::new(client)))
    }
}

/// Settings shared by every session of the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSettings {
    /// API version for REST paths and generated manifests.
    pub api_version: String,
    /// Delay between two status checks, in milliseconds. Values under
    /// 100 are raised to 100.
    pub poll_interval_ms: u64,
    /// Give up polling after this many checks. Absent polls until the
    /// job ends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_poll_attempts: Option<u32>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            max_poll_attempts: None,
        }
    }
}

impl ProjectSettings {
    /// Session settings for an org in `env`.
    pub fn session_config(&self, env: Environment) -> SessionConfig {
        let interval_ms = self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS);
        SessionConfig {
            api_version: self.api_version.clone(),
            poll: PollConfig {
                interval: Duration::from_millis(interval_ms),
                max_attempts: self.max_poll_attempts,
            },
            ..SessionConfig::new(env)
        }
    }
}

/// Contents of the project file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub primary: OrgEntry,
    #[serde(default)]
    pub others: Vec<OrgEntry>,
    #[serde(default)]
    pub settings: ProjectSettings,
}

impl ProjectFile {
    pub fn new(primary: OrgEntry) -> Self {
        Self {
            primary,
            others: Vec::new(),
            settings: ProjectSettings::default(),
        }
    }

    fn entry_mut(&mut self, name: &str) -> Option<&mut OrgEntry> {
        if self.primary.name == name {
            return Some(&mut self.primary);
        }
        self.others.iter_mut().find(|o| o.name == name)
    }
}

/// Project file of one project root.
///
/// The document is cached in memory after the first read; every change
/// is written straight back to disk.
pub struct ProjectStore {
    path: PathBuf,
    data: RwLock<Option<ProjectFile>>,
}

impl ProjectStore {
    /// Opens the store for `project_root`, reading the project file when
    /// one exists. A missing file leaves the store unconfigured.
    pub fn open(project_root: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = project_root.as_ref().join(PROJECT_FILE_NAME);
        let data = read_project_file(&path)?;
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once the project has a primary org.
    pub fn is_configured(&self) -> bool {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Returns the project document, reading it from disk if it is not
    /// cached yet.
    pub fn load(&self) -> Result<ProjectFile, ProjectError> {
        if let Some(data) = self
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(data.clone());
        }

        let data = read_project_file(&self.path)?
            .ok_or_else(|| ProjectError::NotConfigured(self.path.clone()))?;
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = Some(data.clone());
        Ok(data)
    }

    /// Makes `entry` the primary org, creating the project file if needed.
    ///
    /// An existing entry with the same name is replaced rather than kept
    /// twice.
    pub fn write_primary(&self, entry: OrgEntry) -> Result<(), ProjectError> {
        self.update(|data| match data {
            Some(file) => {
                file.others.retain(|o| o.name != entry.name);
                if file.primary.name != entry.name {
                    let previous = std::mem::replace(&mut file.primary, entry);
                    file.others.insert(0, previous);
                } else {
                    file.primary = entry;
                }
                Ok(())
            }
            None => {
                *data = Some(ProjectFile::new(entry));
                Ok(())
            }
        })
    }

    /// Adds another org. An entry with the same name gets its
    /// environment and credentials replaced instead.
    pub fn add_org(&self, entry: OrgEntry) -> Result<(), ProjectError> {
        self.update(|data| {
            let file = data
                .as_mut()
                .ok_or_else(|| ProjectError::NotConfigured(self.path.clone()))?;
            match file.entry_mut(&entry.name) {
                Some(existing) => *existing = entry,
                None => file.others.push(entry),
            }
            Ok(())
        })
    }

    /// Swaps the org called `name` into the primary slot.
    pub fn select_primary(&self, name: &str) -> Result<OrgEntry, ProjectError> {
        let mut selected = None;
        self.update(|data| {
            let file = data
                .as_mut()
                .ok_or_else(|| ProjectError::NotConfigured(self.path.clone()))?;
            if file.primary.name != name {
                let index = file
                    .others
                    .iter()
                    .position(|o| o.name == name)
                    .ok_or_else(|| ProjectError::UnknownOrg(name.to_string()))?;
                std::mem::swap(&mut file.primary, &mut file.others[index]);
            }
            selected = Some(file.primary.clone());
            Ok(())
        })?;
        info!(org = %name, "primary org selected");
        selected.ok_or_else(|| ProjectError::UnknownOrg(name.to_string()))
    }

    /// Stores refreshed credentials for the org called `name`.
    pub fn update_credentials(
        &self,
        name: &str,
        oauth: OAuthCredentials,
    ) -> Result<(), ProjectError> {
        self.update(|data| {
            let entry = data
                .as_mut()
                .and_then(|file| file.entry_mut(name))
                .ok_or_else(|| ProjectError::UnknownOrg(name.to_string()))?;
            entry.oauth = oauth;
            Ok(())
        })
    }

    /// All orgs, primary first.
    pub fn orgs(&self) -> Vec<OrgEntry> {
        match self.data.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(file) => std::iter::once(&file.primary)
                .chain(&file.others)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn primary(&self) -> Option<OrgEntry> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|file| file.primary.clone())
    }

    /// Project settings, or the defaults for an unconfigured project.
    pub fn settings(&self) -> ProjectSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|file| file.settings.clone())
            .unwrap_or_default()
    }

    /// Applies `change` to the cached document and persists the result.
    /// Nothing is written when `change` fails.
    fn update<F>(&self, change: F) -> Result<(), ProjectError>
    where
        F: FnOnce(&mut Option<ProjectFile>) -> Result<(), ProjectError>,
    {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = data.clone();
        change(&mut next)?;
        if let Some(file) = next.as_ref() {
            write_project_file(&self.path, file)?;
        }
        *data = next;
        Ok(())
    }
}

fn read_project_file(path: &Path) -> Result<Option<ProjectFile>, ProjectError> {
    if !path.exists() {
        debug!(path = %path.display(), "no project file");
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    let file: ProjectFile = serde_json::from_str(&raw)?;
    debug!(path = %path.display(), orgs = file.others.len() + 1, "loaded project file");
    Ok(Some(file))
}

fn write_project_file(path: &Path, file: &ProjectFile) -> Result<(), ProjectError> {
    let json = serde_json::to_string_pretty(file)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)?;
    debug!(path = %path.display(), orgs = file.others.len() + 1, "persisted project file");
    Ok(())
}
