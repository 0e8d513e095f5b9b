//! Org sessions and the two deploy workflows.
//!
//! A [`RemoteSession`] holds the credentials for one org and drives:
//!
//! - **Incremental saves** ([`RemoteSession::save_one`]): one file goes
//!   through a throwaway metadata container that is created, filled,
//!   deployed, polled and deleted again. At most one save runs per session.
//! - **Bulk deploys** ([`RemoteSession::deploy_many`]): many files are
//!   packaged into a zip archive with a generated manifest and submitted
//!   as a single asynchronous deploy job.
//!
//! Neither workflow talks HTTP directly. Both go through the
//! [`OrgConnection`] trait, implemented for [`forcesync_rest::Client`]
//! and replaced by an in-memory org in the tests. Progress is reported as
//! [`SessionEvent`]s on a broadcast channel.

mod bulk;
pub mod cache;
pub mod connection;
pub mod error;
pub mod guard;
mod incremental;
pub mod poll;
mod rest;
pub mod session;
pub mod types;

#[cfg(test)]
mod mock;

// Re-export primary types for convenience.
pub use cache::{EntityIdentityCache, record_id_query};
pub use connection::{BoxFuture, OrgConnection};
pub use error::DeployError;
pub use guard::SaveState;
pub use poll::{PollConfig, poll_until};
pub use session::{RemoteSession, SessionConfig};
pub use types::{SaveOutcome, SessionEvent};
