//! Per-project org list and settings.
//!
//! Each project keeps a small JSON file at its root naming the orgs it
//! deploys to. One entry is the primary org; the others are kept so the
//! user can switch without re-authorizing. The file also carries optional
//! settings that shape every session opened from it.

pub mod store;

pub use store::{
    OrgEntry, PROJECT_FILE_NAME, ProjectError, ProjectFile, ProjectSettings, ProjectStore,
};
