//! Org REST client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication.
//! Every call takes the credential bundle it runs under, so one client can
//! serve sessions against several orgs.

use forcesync_protocol::constants::DEFAULT_API_VERSION;
use forcesync_protocol::{
    ApiErrorDetail, DeployOptions, DeployRequest, Environment, OAuthCredentials, QueryResult,
    SaveResult,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// Errors from the org client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request rejected: {0}")]
    Rejected(String),
}

impl Error {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Body of the OAuth endpoint's error responses.
#[derive(Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeployPayload<'a> {
    deploy_options: &'a DeployOptions,
}

/// Org REST client.
pub struct Client {
    http: reqwest::Client,
    api_version: String,
    login_url: Option<String>,
}

impl Client {
    /// Creates a client speaking the default API version.
    pub fn new() -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("forcesync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_version: DEFAULT_API_VERSION.to_string(),
            login_url: None,
        })
    }

    /// Uses `version` (e.g. `58.0`) in every data path.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Sets a custom login host (for testing).
    #[cfg(test)]
    pub(crate) fn with_login_url(mut self, url: String) -> Self {
        self.login_url = Some(url);
        self
    }

    fn data_url(&self, creds: &OAuthCredentials, path: &str) -> String {
        format!(
            "{}/services/data/v{}/{}",
            creds.instance_url.trim_end_matches('/'),
            self.api_version,
            path
        )
    }

    fn sobject_url(&self, creds: &OAuthCredentials, sobject: &str, id: Option<&str>) -> String {
        match id {
            Some(id) => self.data_url(creds, &format!("tooling/sobjects/{sobject}/{id}")),
            None => self.data_url(creds, &format!("tooling/sobjects/{sobject}/")),
        }
    }

    /// Sends a request, turning non-2xx responses into [`Error::Api`].
    async fn send(&self, req: RequestBuilder) -> Result<Response, Error> {
        let resp = req.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, Error> {
        let resp = self.send(req).await?;
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Runs a Tooling API query.
    pub async fn tooling_query<T: DeserializeOwned>(
        &self,
        creds: &OAuthCredentials,
        soql: &str,
    ) -> Result<QueryResult<T>, Error> {
        debug!(soql, "tooling query");
        let req = self
            .http
            .get(self.data_url(creds, "tooling/query/"))
            .bearer_auth(&creds.access_token)
            .query(&[("q", soql)]);
        self.send_json(req).await
    }

    /// Creates a Tooling sobject record and returns its id.
    pub async fn tooling_create<B: Serialize + ?Sized>(
        &self,
        creds: &OAuthCredentials,
        sobject: &str,
        body: &B,
    ) -> Result<String, Error> {
        debug!(sobject, "tooling create");
        let req = self
            .http
            .post(self.sobject_url(creds, sobject, None))
            .bearer_auth(&creds.access_token)
            .json(body);
        let result: SaveResult = self.send_json(req).await?;

        if !result.success {
            let message = if result.errors.is_empty() {
                format!("create {sobject} failed")
            } else {
                join_details(&result.errors)
            };
            return Err(Error::Rejected(message));
        }
        Ok(result.id)
    }

    /// Reads a Tooling sobject record.
    pub async fn tooling_get<T: DeserializeOwned>(
        &self,
        creds: &OAuthCredentials,
        sobject: &str,
        id: &str,
    ) -> Result<T, Error> {
        let req = self
            .http
            .get(self.sobject_url(creds, sobject, Some(id)))
            .bearer_auth(&creds.access_token);
        self.send_json(req).await
    }

    /// Updates fields of a Tooling sobject record.
    pub async fn tooling_update<B: Serialize + ?Sized>(
        &self,
        creds: &OAuthCredentials,
        sobject: &str,
        id: &str,
        body: &B,
    ) -> Result<(), Error> {
        debug!(sobject, id, "tooling update");
        let req = self
            .http
            .patch(self.sobject_url(creds, sobject, Some(id)))
            .bearer_auth(&creds.access_token)
            .json(body);
        self.send(req).await?;
        Ok(())
    }

    /// Deletes a Tooling sobject record.
    pub async fn tooling_delete(
        &self,
        creds: &OAuthCredentials,
        sobject: &str,
        id: &str,
    ) -> Result<(), Error> {
        debug!(sobject, id, "tooling delete");
        let req = self
            .http
            .delete(self.sobject_url(creds, sobject, Some(id)))
            .bearer_auth(&creds.access_token);
        self.send(req).await?;
        Ok(())
    }

    /// Submits a zip archive for an asynchronous Metadata deploy.
    ///
    /// The archive is streamed into the `file` part of the multipart body
    /// as it is read, so it never has to fit in memory.
    pub async fn deploy<R>(
        &self,
        creds: &OAuthCredentials,
        archive: R,
        options: &DeployOptions,
    ) -> Result<DeployRequest, Error>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        let json = serde_json::to_string(&DeployPayload {
            deploy_options: options,
        })?;
        let json_part = Part::text(json).mime_str("application/json")?;
        let file_part = Part::stream(Body::wrap_stream(ReaderStream::new(archive)))
            .file_name("deploy.zip")
            .mime_str("application/zip")?;
        let form = Form::new().part("json", json_part).part("file", file_part);

        debug!("submitting metadata deploy");
        let req = self
            .http
            .post(self.data_url(creds, "metadata/deployRequest"))
            .bearer_auth(&creds.access_token)
            .multipart(form);
        self.send_json(req).await
    }

    /// Reads the status of a Metadata deploy, including component details.
    pub async fn deploy_status(
        &self,
        creds: &OAuthCredentials,
        id: &str,
    ) -> Result<DeployRequest, Error> {
        let req = self
            .http
            .get(self.data_url(creds, &format!("metadata/deployRequest/{id}")))
            .bearer_auth(&creds.access_token)
            .query(&[("includeDetails", "true")]);
        self.send_json(req).await
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// The returned bundle carries no refresh token; callers keep the one
    /// they already hold.
    pub async fn refresh_token(
        &self,
        env: Environment,
        client_id: &str,
        refresh_token: &str,
    ) -> Result<OAuthCredentials, Error> {
        let url = match &self.login_url {
            Some(base) => format!("{base}/services/oauth2/token"),
            None => env.token_url(),
        };
        debug!(%env, "refreshing access token");

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("refresh_token", refresh_token),
        ];
        self.send_json(self.http.post(url).form(&params)).await
    }
}

/// Extracts a readable message from an error response body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Vec<ApiErrorDetail>>(body) {
        Ok(details) if !details.is_empty() => return join_details(&details),
        _ => {}
    }
    if let Ok(oauth) = serde_json::from_str::<OAuthErrorBody>(body) {
        return oauth.error_description.unwrap_or(oauth.error);
    }
    body.trim().to_string()
}

fn join_details(details: &[ApiErrorDetail]) -> String {
    details
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
