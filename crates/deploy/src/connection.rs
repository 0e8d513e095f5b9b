//! Org connection trait.
//!
//! `OrgConnection` is the remote service contract the workflows drive.
//! [`forcesync_rest::Client`] implements it over HTTP (see `rest.rs`);
//! tests implement it with in-memory mocks.

use std::future::Future;
use std::pin::Pin;

use forcesync_package::ArchiveStream;
use forcesync_protocol::{
    ContainerAsyncRequest, ContainerMember, DeployOptions, DeployResult, Environment,
    OAuthCredentials,
};

use crate::error::DeployError;

/// Boxed future returned by [`OrgConnection`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DeployError>> + Send + 'a>>;

/// Abstract connection to a remote org.
///
/// Every call runs under the credential bundle it is given, so one
/// connection can back sessions against several orgs.
pub trait OrgConnection: Send + Sync {
    /// Runs a Tooling query and returns the `Id` of every matching record.
    fn query_record_ids<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        soql: &'a str,
    ) -> BoxFuture<'a, Vec<String>>;

    /// Creates a `MetadataContainer` and returns its id.
    fn create_container<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        name: &'a str,
    ) -> BoxFuture<'a, String>;

    /// Attaches an artifact (`sobject` is e.g. `ApexClassMember`) to a
    /// container and returns the artifact id.
    fn add_container_member<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        sobject: &'a str,
        member: &'a ContainerMember,
    ) -> BoxFuture<'a, String>;

    /// Starts an asynchronous deploy of a container and returns the
    /// `ContainerAsyncRequest` id.
    fn deploy_container<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        container_id: &'a str,
        check_only: bool,
    ) -> BoxFuture<'a, String>;

    /// Reads the status of a container deploy.
    fn container_deploy_status<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        request_id: &'a str,
    ) -> BoxFuture<'a, ContainerAsyncRequest>;

    fn delete_container<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        container_id: &'a str,
    ) -> BoxFuture<'a, ()>;

    /// Updates fields of a Tooling record.
    fn update_record<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        sobject: &'a str,
        id: &'a str,
        fields: &'a serde_json::Value,
    ) -> BoxFuture<'a, ()>;

    /// Submits an archive deploy and returns the remote job id.
    fn submit_deploy<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        archive: ArchiveStream,
        options: &'a DeployOptions,
    ) -> BoxFuture<'a, String>;

    /// Reads the status of an archive deploy.
    fn deploy_status<'a>(
        &'a self,
        creds: &'a OAuthCredentials,
        job_id: &'a str,
    ) -> BoxFuture<'a, DeployResult>;

    /// Exchanges a refresh token for a fresh credential bundle.
    fn refresh_access_token<'a>(
        &'a self,
        env: Environment,
        client_id: &'a str,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, OAuthCredentials>;
}
