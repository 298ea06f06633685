//! Identity service client over HTTP

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{AuthError, Credential, Identity, IdentityService};

const CREDENTIAL_HEADER: &str = "X-API-Key";
const IDENTITY_PATH: &str = "/api/v1/auth/me";

#[derive(Debug, Deserialize)]
struct IdentityEnvelope {
    data: Option<IdentityPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityPayload {
    api_key: Option<ApiKeyInfo>,
    user: Option<UserInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiKeyInfo {
    id: Option<String>,
    #[serde(default)]
    scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    id: Option<String>,
}

/// Validates credentials with `GET {base}/api/v1/auth/me`
#[derive(Debug, Clone)]
pub struct HttpIdentityService {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpIdentityService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), IDENTITY_PATH),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_transport_error(&self, error: reqwest::Error) -> AuthError {
        if error.is_timeout() {
            AuthError::Timeout(self.timeout)
        } else {
            AuthError::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl IdentityService for HttpIdentityService {
    async fn resolve(&self, credential: &Credential) -> Result<Identity, AuthError> {
        let request = self
            .client
            .get(&self.endpoint)
            .header(CREDENTIAL_HEADER, credential.expose())
            .send();

        // Bound the whole round trip, body included
        let response = tokio::time::timeout(self.timeout, async {
            let response = request.await.map_err(|e| self.map_transport_error(e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(AuthError::Rejected {
                    status: status.as_u16(),
                });
            }

            response
                .json::<IdentityEnvelope>()
                .await
                .map_err(|e| AuthError::InvalidResponse(e.to_string()))
        })
        .await
        .map_err(|_| AuthError::Timeout(self.timeout))??;

        let payload = response
            .data
            .ok_or_else(|| AuthError::InvalidResponse("missing data".to_string()))?;

        let (api_key_id, scopes) = match payload.api_key {
            Some(key) => (key.id, key.scopes),
            None => (None, Vec::new()),
        };
        let identity_id = payload.user.and_then(|u| u.id);

        debug!(
            api_key_id = api_key_id.as_deref().unwrap_or(""),
            scope_count = scopes.len(),
            "Identity service accepted credential"
        );

        Ok(Identity::new(identity_id, api_key_id, scopes))
    }

    fn service_name(&self) -> &'static str {
        "http"
    }
}
