//! LibApps API client
//!
//! Issues authenticated GET requests against the upstream API. Tokens come
//! from a shared [`TokenCache`]; a `401` clears it and the request is retried
//! once with a fresh token.

mod types;

pub use types::{
    AvailabilityMode, AvailabilityWindow, Location, ResolvedLocation, SpaceItem, parse_listing,
};

use std::sync::Arc;

use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, CONTENT_TYPE},
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::LibAppsConfig;
use crate::oauth::{ClientCredentials, TokenCache};
use crate::{Error, Result};

/// Page size requested from `/space/items`
const SPACE_PAGE_SIZE: &str = "100";

/// Authenticated client for the LibApps API
pub struct UpstreamClient {
    http_client: Client,
    base_url: String,
    tokens: Arc<TokenCache>,
}

impl UpstreamClient {
    /// Build a client, its token cache and credentials from configuration
    pub fn from_config(config: &LibAppsConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("libtools/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let source = ClientCredentials::new(
            http_client.clone(),
            format!("{base_url}/oauth/token"),
            config.client_id.clone(),
            config.client_secret.clone(),
        );
        let tokens = Arc::new(TokenCache::new(Arc::new(source), config.token_ttl));

        Ok(Self::new(http_client, &base_url, tokens))
    }

    /// Create a client around an existing token cache
    #[must_use]
    pub fn new(http_client: Client, base_url: &str, tokens: Arc<TokenCache>) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Shared token cache
    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// GET `{base}{path}` with bearer auth.
    ///
    /// Returns `Ok(None)` when upstream answers with a non-JSON body.
    pub async fn request(&self, path: &str, query: &[(&str, String)]) -> Result<Option<Value>> {
        let url = format!("{}{path}", self.base_url);
        let mut retried = false;

        loop {
            let token = self.tokens.get_token().await?;

            let response = self
                .http_client
                .get(&url)
                .bearer_auth(&token.access_token)
                .header(ACCEPT, "application/json")
                .header(CONTENT_TYPE, "application/json")
                .query(query)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                self.tokens.invalidate();
                if retried {
                    return Err(Error::Auth(format!("{path} rejected a fresh token")));
                }
                warn!(endpoint = %path, "Token rejected, retrying with a fresh one");
                retried = true;
                continue;
            }
            if !status.is_success() {
                return Err(Error::Upstream {
                    status: status.as_u16(),
                    endpoint: path.to_string(),
                });
            }

            let is_json = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains("application/json"));

            let body = response.bytes().await?;
            if body.is_empty() {
                return Err(Error::EmptyResponse);
            }
            if !is_json {
                warn!(endpoint = %path, "Upstream answered with a non-JSON body");
                return Ok(None);
            }

            debug!(endpoint = %path, bytes = body.len(), "Upstream response");
            return Ok(Some(serde_json::from_slice(&body)?));
        }
    }

    /// `GET /space/locations?details=0`
    pub async fn locations(&self) -> Result<Option<Value>> {
        self.request("/space/locations", &[("details", "0".to_string())])
            .await
    }

    /// `GET /space/items/{lid}?page_size=100[&availability=...]`
    pub async fn space_items(
        &self,
        location_id: &str,
        mode: AvailabilityMode,
        today: &str,
    ) -> Result<Option<Value>> {
        let mut query = vec![("page_size", SPACE_PAGE_SIZE.to_string())];
        if let Some(availability) = mode.query_value(today) {
            query.push(("availability", availability));
        }
        self.request(&format!("/space/items/{location_id}"), &query)
            .await
    }

    /// `GET /hours/{lid}?from={date}`
    pub async fn hours(&self, location_id: &str, from: &str) -> Result<Option<Value>> {
        self.request(
            &format!("/hours/{location_id}"),
            &[("from", from.to_string())],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_token(server: &MockServer, tokens: &[&str]) {
        for token in tokens {
            Mock::given(method("POST"))
                .and(path("/oauth/token"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "access_token": token,
                    "expires_in": 3600
                })))
                .up_to_n_times(1)
                .mount(server)
                .await;
        }
    }

    fn client(server: &MockServer) -> UpstreamClient {
        UpstreamClient::from_config(&LibAppsConfig {
            base_url: format!("{}/", server.uri()),
            client_id: "client-123".to_string(),
            client_secret: "s3cret".to_string(),
            request_timeout: Duration::from_secs(5),
            ..LibAppsConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_locations_request_shape() {
        let server = MockServer::start().await;
        mount_token(&server, &["tok-1"]).await;
        Mock::given(method("GET"))
            .and(path("/space/locations"))
            .and(query_param("details", "0"))
            .and(header("authorization", "Bearer tok-1"))
            .and(header("accept", "application/json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"lid": 1, "name": "A"}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let value = client(&server).locations().await.unwrap();
        assert_eq!(value, Some(json!([{"lid": 1, "name": "A"}])));
    }

    #[tokio::test]
    async fn test_space_items_query_per_mode() {
        let server = MockServer::start().await;
        mount_token(&server, &["tok-1"]).await;
        Mock::given(method("GET"))
            .and(path("/space/items/13231"))
            .and(query_param("page_size", "100"))
            .and(query_param("availability", "next_only"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["next"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/space/items/13231"))
            .and(query_param("availability", "2025-03-03"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["full"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/space/items/13231"))
            .and(query_param_is_missing("availability"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["all"])))
            .mount(&server)
            .await;

        let client = client(&server);
        for (mode, expected) in [
            (AvailabilityMode::Next, "next"),
            (AvailabilityMode::Full, "full"),
            (AvailabilityMode::All, "all"),
        ] {
            let value = client
                .space_items("13231", mode, "2025-03-03")
                .await
                .unwrap();
            assert_eq!(value, Some(json!([expected])));
        }
        // one token serves every request
        assert_eq!(client.tokens().refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_hours_request_shape() {
        let server = MockServer::start().await;
        mount_token(&server, &["tok-1"]).await;
        Mock::given(method("GET"))
            .and(path("/hours/17168"))
            .and(query_param("from", "2025-03-03"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let value = client(&server).hours("17168", "2025-03-03").await.unwrap();
        assert_eq!(value, Some(json!([])));
    }

    #[tokio::test]
    async fn test_non_json_body_is_no_data() {
        let server = MockServer::start().await;
        mount_token(&server, &["tok-1"]).await;
        Mock::given(method("GET"))
            .and(path("/hours/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html>maintenance</html>", "text/html"),
            )
            .mount(&server)
            .await;

        assert_eq!(client(&server).hours("1", "2025-03-03").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_body_is_error() {
        let server = MockServer::start().await;
        mount_token(&server, &["tok-1"]).await;
        Mock::given(method("GET"))
            .and(path("/hours/1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = client(&server).hours("1", "2025-03-03").await.unwrap_err();
        assert!(matches!(err, Error::EmptyResponse));
    }

    #[tokio::test]
    async fn test_auth_failure_surfaces_as_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client.locations().await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(!client.tokens().has_valid_token());
    }

    #[tokio::test]
    async fn test_stale_token_is_cleared_and_retried_once() {
        let server = MockServer::start().await;
        mount_token(&server, &["stale", "fresh"]).await;
        Mock::given(method("GET"))
            .and(path("/space/locations"))
            .and(header("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/space/locations"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(client.locations().await.unwrap(), Some(json!([])));
        assert_eq!(client.tokens().refresh_count(), 2);
    }

    #[tokio::test]
    async fn test_second_rejection_gives_up() {
        let server = MockServer::start().await;
        mount_token(&server, &["one", "two", "three"]).await;
        Mock::given(method("GET"))
            .and(path("/space/locations"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client.locations().await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(!client.tokens().has_valid_token());
    }

    #[tokio::test]
    async fn test_upstream_error_status() {
        let server = MockServer::start().await;
        mount_token(&server, &["tok-1"]).await;
        Mock::given(method("GET"))
            .and(path("/space/items/9"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server)
            .space_items("9", AvailabilityMode::Next, "2025-03-03")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 503, .. }));
    }
}
