//! Target environments and OAuth credential bundles.

use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use crate::constants::OAUTH_SCOPE;

/// Characters left unescaped by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Errors from parsing an OAuth redirect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("redirect URL has no fragment")]
    MissingFragment,

    #[error("authorization denied: {0}")]
    Denied(String),

    #[error("redirect is missing {0}")]
    MissingField(&'static str),
}

/// Kind of org a session targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Sandbox,
}

impl Environment {
    /// Login host subdomain: `login` for production, `test` for sandboxes.
    pub fn subdomain(self) -> &'static str {
        match self {
            Self::Production => "login",
            Self::Sandbox => "test",
        }
    }

    /// Base URL of the login host, without a trailing slash.
    pub fn login_url(self) -> String {
        format!("https://{}.salesforce.com", self.subdomain())
    }

    /// Redirect URI registered for the user-agent flow.
    pub fn redirect_uri(self) -> String {
        format!("{}/services/oauth2/success", self.login_url())
    }

    /// Token endpoint used to refresh an access token.
    pub fn token_url(self) -> String {
        format!("{}/services/oauth2/token", self.login_url())
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Production => "production",
            Self::Sandbox => "sandbox",
        })
    }
}

/// Builds the implicit-grant authorization URL an OAuth popup should load.
pub fn authorization_uri(env: Environment, client_id: &str) -> String {
    format!(
        "{}/services/oauth2/authorize?response_type=token&client_id={}&redirect_uri={}&scope={}",
        env.login_url(),
        utf8_percent_encode(client_id, COMPONENT),
        utf8_percent_encode(&env.redirect_uri(), COMPONENT),
        OAUTH_SCOPE.replace(' ', "+"),
    )
}

/// Credential bundle returned by the OAuth flow.
///
/// Serialized as the `oauth` object of the project file, so unknown
/// optional fields are kept when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthCredentials {
    pub access_token: String,
    pub instance_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl OAuthCredentials {
    /// Creates a bundle with just an access token and instance URL.
    pub fn new(access_token: impl Into<String>, instance_url: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            instance_url: instance_url.into(),
            refresh_token: None,
            id: None,
            issued_at: None,
            signature: None,
            scope: None,
            token_type: None,
        }
    }

    /// Parses the URL the user-agent flow redirects to.
    ///
    /// The credentials arrive in the fragment
    /// (`…/success#access_token=…&instance_url=…`). An `error` parameter
    /// means the user denied access.
    pub fn from_redirect_url(url: &str) -> Result<Self, AuthError> {
        let (_, fragment) = url.split_once('#').ok_or(AuthError::MissingFragment)?;
        if fragment.is_empty() {
            return Err(AuthError::MissingFragment);
        }

        let mut creds = Self::new(String::new(), String::new());
        let mut error = None;
        let mut error_description = None;

        for pair in fragment.split('&') {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode_component(raw);
            match key {
                "access_token" => creds.access_token = value,
                "instance_url" => creds.instance_url = value,
                "refresh_token" => creds.refresh_token = Some(value),
                "id" => creds.id = Some(value),
                "issued_at" => creds.issued_at = Some(value),
                "signature" => creds.signature = Some(value),
                "scope" => creds.scope = Some(value),
                "token_type" => creds.token_type = Some(value),
                "error" => error = Some(value),
                "error_description" => error_description = Some(value),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Err(AuthError::Denied(error_description.unwrap_or(error)));
        }
        if creds.access_token.is_empty() {
            return Err(AuthError::MissingField("access_token"));
        }
        if creds.instance_url.is_empty() {
            return Err(AuthError::MissingField("instance_url"));
        }
        Ok(creds)
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
