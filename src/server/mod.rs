//! HTTP endpoint backing the resolver's IP source
//!
//! Serves `GET /api/geo/ip`. The caller is identified by the first
//! `X-Forwarded-For` entry when present, otherwise by the socket peer. The
//! response is always 200; failure is reported in the body.

mod upstream;

pub use upstream::{is_local_address, ProviderError, UpstreamConfig, UpstreamLookup};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::data::IpLocationResponse;

/// Route the resolver's default endpoint points at
pub const IP_LOOKUP_PATH: &str = "/api/geo/ip";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<UpstreamLookup>,
}

/// Builds the endpoint router
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route(IP_LOOKUP_PATH, get(ip_location))
        .with_state(state)
}

/// Picks the address to geolocate for a request
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    forwarded.or_else(|| peer.map(|addr| addr.ip()))
}

async fn ip_location(State(state): State<AppState>, request: Request) -> Json<IpLocationResponse> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer);
    drop(request);

    Json(state.upstream.lookup(ip).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request as HttpRequest, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app_for(primary: &MockServer, fallback: &MockServer) -> Router {
        let upstream = UpstreamLookup::new(UpstreamConfig {
            ipapi_base_url: primary.uri(),
            ip_api_base_url: fallback.uri(),
            timeout: Duration::from_secs(3),
        })
        .expect("client");
        build_app(AppState {
            upstream: Arc::new(upstream),
        })
    }

    #[test]
    fn test_client_ip_prefers_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "127.0.0.1:5555".parse().unwrap();

        assert_eq!(
            client_ip(&headers, Some(peer)),
            Some("203.0.113.7".parse().unwrap())
        );
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "198.51.100.4:443".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(peer)), Some(peer.ip()));
        assert_eq!(client_ip(&headers, None), None);
    }

    #[test]
    fn test_client_ip_ignores_garbage_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "unknown".parse().unwrap());

        assert_eq!(client_ip(&headers, None), None);
    }

    #[tokio::test]
    async fn test_endpoint_returns_forwarded_client_location() {
        let primary = MockServer::start().await;
        let fallback = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/14.161.2.3/json/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "latitude": 10.82,
                "longitude": 106.63,
                "city": "Ho Chi Minh City",
                "country_name": "Vietnam"
            })))
            .mount(&primary)
            .await;

        let response = app_for(&primary, &fallback)
            .oneshot(
                HttpRequest::builder()
                    .uri(IP_LOOKUP_PATH)
                    .header("x-forwarded-for", "14.161.2.3")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(json["latitude"], 10.82);
        assert_eq!(json["country"], "Vietnam");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn test_endpoint_reports_failure_in_body() {
        let primary = MockServer::start().await;
        let fallback = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&primary)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&fallback)
            .await;

        let response = app_for(&primary, &fallback)
            .oneshot(
                HttpRequest::builder()
                    .uri(IP_LOOKUP_PATH)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(
            json,
            serde_json::json!({"latitude": null, "longitude": null, "error": true})
        );
    }
}
