//! Web surface: index page, health check and zone renderings.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::DiscoError;
use crate::metrics::{self, Timer};
use crate::registry::Registry;
use crate::zone::{self, BIND_CONTENT_TYPE, HOSTS_CONTENT_TYPE};

const ROOT_DOCUMENT: &str = r#"<html>
<head><title>Docker Container Discovery</title></head>
<body>
<h1>Docker Container Discovery</h1>
<p><a href="/zone">Zone</a></p>
<p><a href="/hosts">Hosts</a></p>
<p><a href="/health">Health</a></p>
</body>
</html>
"#;

/// Build the router over a shared registry.
pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/zone", get(zone_file))
        .route("/hosts", get(hosts_file))
        .fallback(not_found)
        .layer(middleware::from_fn(track_requests))
        .with_state(registry)
}

/// Serve the web surface until the token is cancelled.
pub async fn run(
    listen_addr: SocketAddr,
    registry: Arc<Registry>,
    cancel: CancellationToken,
) -> Result<(), DiscoError> {
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!(addr = %listen_addr, "starting web server");

    axum::serve(listener, router(registry))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    Ok(())
}

/// Record request count and duration per method and path.
async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let timer = Timer::start();

    debug!(%method, %path, "receiving web request");
    let response = next.run(request).await;

    metrics::record_request(
        &method,
        &path,
        response.status().as_u16(),
        timer.elapsed(),
    );

    response
}

async fn root() -> Html<&'static str> {
    Html(ROOT_DOCUMENT)
}

async fn health() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json;charset=utf-8")],
        r#"{"status": "ok"}"#,
    )
}

async fn zone_file(State(registry): State<Arc<Registry>>) -> Response {
    match zone::render_bind(&registry) {
        Ok(body) => ([(header::CONTENT_TYPE, BIND_CONTENT_TYPE)], body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn hosts_file(State(registry): State<Arc<Registry>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, HOSTS_CONTENT_TYPE)],
        zone::render_hosts(&registry),
    )
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DnsConfig, SoaConfig};
    use crate::container::ContainerInfo;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use tower::ServiceExt;

    fn test_registry() -> Arc<Registry> {
        let config = DnsConfig {
            listen_addr: "127.0.0.1:10053".parse().unwrap(),
            tld: "containers.internal".to_string(),
            res_ttl: 60,
            soa: SoaConfig::default(),
            advertise: Some("127.2.4.6/32".to_string()),
            container_cidr: None,
            templates: Vec::new(),
        };
        let registry = Registry::new(&config).unwrap();

        registry.add_container(&ContainerInfo {
            id: "abc123".to_string(),
            names: vec!["web".to_string()],
            primary_address: Some("10.0.0.5".parse().unwrap()),
            ..Default::default()
        });

        Arc::new(registry)
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn root_serves_html() {
        let app = router(test_registry());
        let response = app
            .oneshot(HttpRequest::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("Docker Container Discovery"));
    }

    #[tokio::test]
    async fn health_serves_json() {
        let app = router(test_registry());
        let response = app
            .oneshot(HttpRequest::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json;charset=utf-8"
        );
        assert_eq!(body_string(response).await, r#"{"status": "ok"}"#);
    }

    #[tokio::test]
    async fn zone_serves_bind_text() {
        let app = router(test_registry());
        let response = app
            .oneshot(HttpRequest::get("/zone").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            BIND_CONTENT_TYPE
        );
        let body = body_string(response).await;
        assert!(body.contains("IN\tSOA"));
        assert!(body.contains("abc123.containers.internal.\t60\tIN\tA\t10.0.0.5"));
    }

    #[tokio::test]
    async fn hosts_serves_plain_pairs() {
        let app = router(test_registry());
        let response = app
            .oneshot(HttpRequest::get("/hosts").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("10.0.0.5 abc123.containers.internal"));
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let app = router(test_registry());
        let response = app
            .oneshot(HttpRequest::get("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn non_get_is_rejected() {
        let app = router(test_registry());
        let response = app
            .oneshot(HttpRequest::post("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
