//! HTTP surface of the gateway.

use crate::app::App;
use crate::models::Attempt;
use crate::orchestrator::{ExhaustionReport, GenerationOutcome};
use crate::{Error, Result};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{any, get},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub fn build_router(app: Arc<App>) -> Router {
    Router::new()
        .route("/api/gemini", any(generate))
        .route("/api/ai", any(generate))
        .route("/health", get(health))
        .layer(cors_layer())
        .with_state(app)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::OPTIONS,
            Method::PATCH,
            Method::DELETE,
            Method::POST,
            Method::PUT,
        ])
        .allow_headers([
            HeaderName::from_static("x-csrf-token"),
            HeaderName::from_static("x-requested-with"),
            header::ACCEPT,
            HeaderName::from_static("accept-version"),
            header::CONTENT_LENGTH,
            HeaderName::from_static("content-md5"),
            header::CONTENT_TYPE,
            header::DATE,
            HeaderName::from_static("x-api-version"),
        ])
}

/// Bind and serve until Ctrl-C.
pub async fn serve(app: Arc<App>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Gateway listening on {}", listener.local_addr()?);

    axum::serve(listener, build_router(app))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn generate(State(app): State<Arc<App>>, method: Method, body: Bytes) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("generate", %request_id, %method);

    async move {
        if method == Method::OPTIONS {
            return StatusCode::OK.into_response();
        }
        if method != Method::POST {
            return error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
        }

        match app.generate(&body).await {
            Ok(outcome) => outcome_response(outcome),
            Err(Error::MissingApiKey) => {
                error!("GEMINI_API_KEY is not set");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "API Key is missing")
            }
            Err(Error::InvalidRequest(details)) => {
                warn!("Rejected request body: {}", details);
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Invalid request body", "details": details })),
                )
                    .into_response()
            }
            Err(e) => {
                error!("Server error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Server Error", "details": e.to_string() })),
                )
                    .into_response()
            }
        }
    }
    .instrument(span)
    .await
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[derive(Serialize)]
struct ExhaustedEnvelope<'a> {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_google_error: Option<&'a Value>,
    debug_models_tried: &'a [Attempt],
}

fn outcome_response(outcome: GenerationOutcome) -> Response {
    match outcome {
        GenerationOutcome::Success(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            Body::from(body),
        )
            .into_response(),
        GenerationOutcome::Fatal {
            status,
            reason,
            body,
        } => {
            warn!("Request failed fatally: {}", reason);
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(body)).into_response()
        }
        GenerationOutcome::Exhausted(report) => exhausted_response(&report),
    }
}

fn exhausted_response(report: &ExhaustionReport) -> Response {
    let (status, message) = if report.deadline_exceeded {
        (
            StatusCode::GATEWAY_TIMEOUT,
            "Upstream deadline exceeded before any model succeeded",
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "All model candidates failed",
        )
    };

    let envelope = ExhaustedEnvelope {
        error: message,
        last_google_error: report.last_error.as_ref(),
        debug_models_tried: &report.attempts_tried,
    };
    (status, Json(envelope)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppServices;
    use crate::config::Config;
    use crate::orchestrator::TracingObserver;
    use crate::upstream::MockUpstream;
    use axum::http::Request;
    use std::collections::HashMap;
    use tower::ServiceExt;

    const BODY: &str = r#"{"contents":[{"role":"user","parts":[{"text":"hi"}]}]}"#;

    fn router(mock: &MockUpstream, vars: &[(&str, &str)]) -> Router {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        let app = App::with_services(
            &config,
            AppServices {
                caller: Arc::new(mock.clone()),
                discovery: None,
                observer: Arc::new(TracingObserver),
            },
        );
        build_router(Arc::new(app))
    }

    fn keyed(mock: &MockUpstream) -> Router {
        router(mock, &[("GEMINI_API_KEY", "k"), ("GEMINI_FALLBACK_MODELS", "model-a")])
    }

    async fn send(router: Router, method: Method, body: &str) -> (StatusCode, Bytes) {
        let response = router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri("/api/gemini")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes)
    }

    fn json_of(bytes: &Bytes) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_options_returns_empty_ok() {
        let mock = MockUpstream::new();
        let (status, body) = send(keyed(&mock), Method::OPTIONS, "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert_eq!(mock.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_other_methods_rejected() {
        let mock = MockUpstream::new();
        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let (status, body) = send(keyed(&mock), method, BODY).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(json_of(&body), json!({ "error": "Method not allowed" }));
        }
        assert_eq!(mock.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_key_returns_500() {
        let mock = MockUpstream::new().with_success("{}");
        let (status, body) = send(router(&mock, &[]), Method::POST, BODY).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_of(&body), json!({ "error": "API Key is missing" }));
        assert_eq!(mock.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_body_returns_400() {
        let mock = MockUpstream::new();
        let (status, body) = send(keyed(&mock), Method::POST, "{\"contents\":").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body)["error"], "Invalid request body");
    }

    #[tokio::test]
    async fn test_success_body_passes_through_unchanged() {
        let raw = r#"{"zeta":[1, 2],"candidates":[{"content":{"parts":[{"text":"hello"}]}}]}"#;
        let mock = MockUpstream::new().with_success(raw);
        let (status, body) = send(keyed(&mock), Method::POST, BODY).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Bytes::from(raw));
        assert_eq!(mock.get_call_count(), 1);
    }

    #[tokio::test]
    async fn test_fatal_mirrors_upstream_status() {
        let upstream_body = json!({ "error": { "code": 401, "status": "UNAUTHENTICATED" } });
        let mock = MockUpstream::new()
            .with_error(401, upstream_body.clone())
            .with_success("{}");
        let (status, body) = send(keyed(&mock), Method::POST, BODY).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json_of(&body), upstream_body);
        assert_eq!(mock.get_call_count(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_envelope() {
        let last = json!({ "error": { "code": 500, "message": "boom" } });
        let mock = MockUpstream::new().with_fallback(crate::upstream::Outcome::UpstreamError {
            status: 500,
            body: last.clone(),
        });
        let (status, body) = send(keyed(&mock), Method::POST, BODY).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_of(&body);
        assert_eq!(body["error"], "All model candidates failed");
        assert_eq!(body["last_google_error"], last);
        assert_eq!(
            body["debug_models_tried"],
            json!([
                { "endpoint_version": "v1beta", "payload_shape": "modern", "model_id": "model-a" },
                { "endpoint_version": "v1", "payload_shape": "modern", "model_id": "model-a" }
            ])
        );
        assert_eq!(mock.get_call_count(), 2);
    }

    #[test]
    fn test_deadline_exhaustion_is_504() {
        let response = exhausted_response(&ExhaustionReport {
            attempts_tried: vec![],
            last_error: None,
            deadline_exceeded: true,
        });
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_both_routes_and_health() {
        let mock = MockUpstream::new().with_success("{}").with_success("{}");
        let router = keyed(&mock);

        for uri in ["/api/gemini", "/api/ai"] {
            let response = router
                .clone()
                .oneshot(
                    Request::builder()
                        .method(Method::POST)
                        .uri(uri)
                        .body(Body::from(BODY))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
