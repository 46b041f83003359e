//! Google userinfo client.
//!
//! Exchanges a Google-issued access token for the verified profile of its
//! owner. The upstream consent flow already proved email control to Google;
//! the local pipeline still runs its own OTP proof afterwards.

use crate::errors::{ServiceError, ServiceResult};
use serde::Deserialize;

const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

/// A third-party-verified identity as asserted by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct OauthProfile {
    pub email: String,
    pub name: Option<String>,
    #[serde(rename = "picture")]
    pub avatar_url: Option<String>,
}

pub struct GoogleOauthClient {
    http: reqwest::Client,
}

impl GoogleOauthClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Fetches the profile behind an access token.
    ///
    /// # Errors
    /// `Unauthorized` if Google rejects the token, `ExternalService` if the
    /// userinfo endpoint is unreachable or returns garbage.
    pub async fn fetch_profile(&self, access_token: &str) -> ServiceResult<OauthProfile> {
        let response = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                ServiceError::external_service(format!("Userinfo request failed: {e}"))
            })?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ServiceError::unauthorized("Invalid access token"));
        }

        if !response.status().is_success() {
            return Err(ServiceError::external_service(format!(
                "Userinfo request returned {}",
                response.status()
            )));
        }

        response.json::<OauthProfile>().await.map_err(|e| {
            ServiceError::external_service(format!("Malformed userinfo response: {e}"))
        })
    }
}

impl Default for GoogleOauthClient {
    fn default() -> Self {
        Self::new()
    }
}
