//! Authentication against Google APIs
//!
//! Provides a unified interface for obtaining an OAuth bearer token, letting
//! operators pick the method in config.toml.

use crate::Error;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Authentication provider configuration
///
/// # Examples
///
/// ## Static bearer token
/// ```toml
/// [auth]
/// provider = "token"
/// token = "${GOOGLE_ACCESS_TOKEN}"
/// ```
///
/// ## Google Cloud CLI
/// ```toml
/// [auth]
/// provider = "gcloud"
/// account = "drive-reader@lab.iam.gserviceaccount.com"  # optional
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum AuthProvider {
    /// A pre-issued OAuth access token
    #[serde(rename = "token")]
    Token {
        #[serde(flatten)]
        config: TokenConfig,
    },

    /// Token minted by `gcloud auth print-access-token`
    #[serde(rename = "gcloud")]
    GCloud {
        #[serde(flatten)]
        config: GCloudConfig,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GCloudConfig {
    /// Account to impersonate (optional - active gcloud account otherwise)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

impl AuthProvider {
    /// Resolve a bearer token from this provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the token is empty or gcloud is missing or
    /// not logged in.
    pub async fn access_token(&self) -> crate::Result<String> {
        match self {
            AuthProvider::Token { config } => {
                if config.token.trim().is_empty() {
                    return Err(Error::auth_error("access token is empty"));
                }
                Ok(config.token.trim().to_string())
            }
            AuthProvider::GCloud { config } => gcloud_access_token(config.account.as_deref()).await,
        }
    }

    /// Returns the provider type as a string for display purposes
    pub fn provider_name(&self) -> &str {
        match self {
            AuthProvider::Token { .. } => "Static token",
            AuthProvider::GCloud { .. } => "Google Cloud (gcloud)",
        }
    }
}

/// Get access token from gcloud CLI
///
/// Executes `gcloud auth print-access-token [account]`. Requires gcloud CLI
/// to be installed and authenticated.
async fn gcloud_access_token(account: Option<&str>) -> crate::Result<String> {
    let mut command = Command::new("gcloud");
    command.args(["auth", "print-access-token"]);
    if let Some(account) = account {
        command.arg(account);
    }

    let output = command.output().await.map_err(|e| {
        Error::Auth(format!(
            "Failed to run gcloud command. Is gcloud CLI installed? Error: {}",
            e
        ))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Auth(format!(
            "gcloud auth failed: {}. Run 'gcloud auth login' to authenticate",
            stderr.trim()
        )));
    }

    let token = String::from_utf8(output.stdout)
        .map_err(|e| Error::Auth(format!("Invalid gcloud output: {}", e)))?
        .trim()
        .to_string();

    if token.is_empty() {
        return Err(Error::Auth(
            "Empty token from gcloud. Run 'gcloud auth login' to authenticate".into(),
        ));
    }

    Ok(token)
}
