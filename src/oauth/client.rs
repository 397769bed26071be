//! OAuth Client
//!
//! Client-credentials token exchange against the LibApps token endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// A token as issued by the authorization server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Bearer token
    pub access_token: String,
    /// Lifetime reported by the server, if any
    pub expires_in: Option<Duration>,
}

/// Anything that can mint a fresh access token
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Perform one token exchange
    async fn fetch_token(&self) -> Result<IssuedToken>;
}

/// OAuth token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Client-credentials grant for a fixed client id/secret
pub struct ClientCredentials {
    /// HTTP client for token requests
    http_client: Client,
    /// `{base}/oauth/token`
    token_endpoint: String,
    client_id: String,
    client_secret: String,
}

impl ClientCredentials {
    /// Create a token source for the given endpoint and credentials
    #[must_use]
    pub fn new(
        http_client: Client,
        token_endpoint: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            http_client,
            token_endpoint,
            client_id,
            client_secret,
        }
    }
}

#[async_trait]
impl TokenSource for ClientCredentials {
    async fn fetch_token(&self) -> Result<IssuedToken> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        debug!(endpoint = %self.token_endpoint, "Requesting client-credentials token");

        let response = self
            .http_client
            .post(&self.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Token exchange rejected");
            debug!(body = %body, "Token endpoint response");
            return Err(Error::Auth(format!("Token exchange failed: HTTP {status}")));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("Failed to parse token response: {e}")))?;

        let access_token = token_response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Auth("Token response has no access_token".to_string()))?;

        if let Some(ref kind) = token_response.token_type {
            if !kind.eq_ignore_ascii_case("bearer") {
                warn!(token_type = %kind, "Unexpected token type, using as bearer");
            }
        }

        info!(expires_in = ?token_response.expires_in, "Obtained access token");

        Ok(IssuedToken {
            access_token,
            expires_in: token_response.expires_in.map(Duration::from_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> ClientCredentials {
        ClientCredentials::new(
            Client::new(),
            format!("{}/oauth/token", server.uri()),
            "client-123".to_string(),
            "s3cret".to_string(),
        )
    }

    #[tokio::test]
    async fn test_client_credentials_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=client-123"))
            .and(body_string_contains("client_secret=s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = source(&server).fetch_token().await.unwrap();
        assert_eq!(token.access_token, "tok-1");
        assert_eq!(token.expires_in, Some(Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn test_missing_access_token_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": null})),
            )
            .mount(&server)
            .await;

        let err = source(&server).fetch_token().await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn test_rejected_exchange_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let err = source(&server).fetch_token().await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
