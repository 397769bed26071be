//! End-to-end route tests
//!
//! Drives the outward router against a mocked LibApps upstream:
//! - Site routes under the mount path
//! - Availability aggregation from live windows
//! - Hours today with last-block semantics
//! - Error mapping (`No Response`, unknown sites, bad query values)

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use libtools::{
    config::{CacheConfig, LibAppsConfig, SitesConfig},
    gateway::{AppState, create_router},
    service::LibTools,
    timezone,
    upstream::UpstreamClient,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

async fn mount_locations(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/space/locations"))
        .and(query_param("details", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"lid": 13231, "name": "McKeldin Library"},
            {"lid": 17167, "name": "Michelle Smith Performing Arts Library"}
        ])))
        .mount(server)
        .await;
}

fn router(server: &MockServer) -> Router {
    let upstream = UpstreamClient::from_config(&LibAppsConfig {
        base_url: server.uri(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        request_timeout: Duration::from_secs(5),
        ..LibAppsConfig::default()
    })
    .unwrap();
    let service = LibTools::new(upstream, SitesConfig::default(), &CacheConfig::default());
    let state = Arc::new(AppState {
        service: Arc::new(service),
    });
    create_router(state, "/api/libtools", Duration::from_secs(10))
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_root_and_health() {
    let server = MockServer::start().await;
    let router = router(&server);

    assert_eq!(get(&router, "/").await, (StatusCode::OK, json!(true)));

    let (status, health) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["token_cached"], false);
    assert_eq!(health["sites"][0], "mckeldin");
}

#[tokio::test]
async fn test_availability_route() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_locations(&server).await;

    let now = Utc::now();
    let window = |from_h: i64, to_h: i64| {
        json!({
            "from": (now + chrono::Duration::hours(from_h)).with_timezone(&timezone::LIBRARY_TZ).to_rfc3339(),
            "to": (now + chrono::Duration::hours(to_h)).with_timezone(&timezone::LIBRARY_TZ).to_rfc3339(),
        })
    };

    Mock::given(method("GET"))
        .and(path("/space/items/17167"))
        .and(query_param("availability", "next_only"))
        .and(query_param("page_size", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "groupId": 10, "groupName": "Practice Rooms", "availability": [window(-1, 1)]},
            {"id": 2, "groupId": 11, "groupName": "Studios", "availability": [window(2, 3)]},
            {"id": 3, "groupId": 10, "groupName": "Practice Rooms", "availability": [window(-2, -1)]}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let router = router(&server);
    let (status, body) = get(&router, "/api/libtools/mspal/availability").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["10"]["name"], "Practice Rooms");
    assert_eq!(body["10"]["available"], "1");
    assert_eq!(body["10"]["total"], "2");
    assert_eq!(body["10"]["next_available"], window(-2, -1)["from"]);
    assert_eq!(body["11"]["available"], "0");
    assert_eq!(body["11"]["total"], "1");
    assert_eq!(body["overall_available"], 1);
    assert_eq!(body["total"], 3);

    // served from the 60s listing cache
    let (status, again) = get(&router, "/api/libtools/mspal/availability").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["total"], 3);
}

#[tokio::test]
async fn test_details_route_modes() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_locations(&server).await;

    let today = timezone::today();
    Mock::given(method("GET"))
        .and(path("/space/items/13231"))
        .and(query_param("availability", today.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "full"}])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/space/items/13231"))
        .and(query_param("availability", "next_only"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "next"}])))
        .mount(&server)
        .await;

    let router = router(&server);
    let (status, body) = get(&router, "/api/libtools/mckeldin/details").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([[{"id": "full"}]]));

    let (_, body) = get(&router, "/api/libtools/mckeldin/details?availability=next").await;
    assert_eq!(body, json!([[{"id": "next"}]]));

    let (status, body) = get(&router, "/api/libtools/mckeldin/details?availability=weekly").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("weekly"));
}

#[tokio::test]
async fn test_hours_today_route() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    let today = timezone::today();

    Mock::given(method("GET"))
        .and(path("/hours/13231"))
        .and(query_param("from", today.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "lid": 13231,
            "dates": {today.clone(): {"status": "open", "hours": [
                {"from": "09:00", "to": "12:00"},
                {"from": "13:00", "to": "17:00"}
            ]}}
        }])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hours/25040"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("closed", "text/plain"))
        .expect(1)
        .mount(&server)
        .await;

    let router = router(&server);
    for _ in 0..2 {
        let (status, body) = get(&router, "/api/libtools/mckeldin/hours/today").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "open", "hours_from": "13:00", "hours_to": "17:00"})
        );

        let (status, body) = get(&router, "/api/libtools/makerspace/hours/today").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);
    }

    let (status, stats) = get(&router, "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["hours_today"]["hits"], 2);
    assert_eq!(stats["hours_today"]["size"], 2);
    assert_eq!(stats["token_refreshes"], 1);
}

#[tokio::test]
async fn test_auth_failure_is_no_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_client"})))
        .mount(&server)
        .await;

    let router = router(&server);
    let (status, body) = get(&router, "/api/libtools/stem/availability").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"detail": "No Response"}));
}

#[tokio::test]
async fn test_empty_upstream_body_is_server_error() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/hours/17166"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let router = router(&server);
    let (status, body) = get(&router, "/api/libtools/art/hours/today").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"detail": "Response is empty"}));
}

#[tokio::test]
async fn test_unknown_sites() {
    let server = MockServer::start().await;
    let router = router(&server);

    let (status, _) = get(&router, "/api/libtools/atlantis/hours/today").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // hours-only site has no space listing
    let (status, _) = get(&router, "/api/libtools/makerspace/availability").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_location_not_found_is_no_response() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_locations(&server).await;

    let router = router(&server);
    let (status, body) = get(&router, "/api/libtools/art/details").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"detail": "No Response"}));
}
