use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::engine::RiskEngine;
use crate::models::AnalysisResponse;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub url: Option<String>,
}

/// Build the application router around a ready engine.
pub fn router(engine: RiskEngine, server: &ServerConfig) -> Result<Router> {
    Ok(Router::new()
        .route("/api/analyze", post(analyze_url))
        .route("/api/health", get(health_check))
        .layer(cors_layer(&server.allowed_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(engine))
}

/// Bind and serve until Ctrl-C. The engine must already be initialized, so
/// no request ever waits on model loading.
pub async fn serve(engine: RiskEngine, server: &ServerConfig) -> Result<()> {
    let app = router(engine, server)?;
    let addr = format!("{}:{}", server.host, server.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("URL risk API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return Ok(cors.allow_origin(Any));
    }

    let allowed = origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin {:?}", o))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(cors.allow_origin(AllowOrigin::list(allowed)))
}

async fn analyze_url(
    State(engine): State<RiskEngine>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let url = match payload {
        Ok(Json(request)) => request.url.filter(|u| !u.is_empty()),
        Err(rejection) => {
            debug!(error = %rejection, "Rejected analyze request body");
            None
        }
    };

    let Some(url) = url else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No URL provided" })),
        )
            .into_response();
    };

    let assessment = engine.analyze(&url);
    Json(AnalysisResponse::from(&assessment)).into_response()
}

async fn health_check(State(engine): State<RiskEngine>) -> Json<serde_json::Value> {
    let status = engine.status();
    let structural = status
        .structural
        .map(|o| o.to_string())
        .unwrap_or_else(|| "custom".to_string());
    let text = if status.text_backend.is_some() {
        "ready"
    } else {
        "unavailable"
    };

    Json(json!({
        "status": "online",
        "structural_model": structural,
        "text_model": text,
        "text_backend": status.text_backend,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::tests::stub_engine;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn app(engine: RiskEngine) -> Router {
        router(engine, &ServerConfig::default()).unwrap()
    }

    async fn post_analyze(app: Router, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/analyze")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_url_is_rejected() {
        for body in [r#"{"url": ""}"#, "{}", r#"{"url": null}"#, "not json"] {
            let (status, json) = post_analyze(app(stub_engine(0.5)), body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(json, json!({ "error": "No URL provided" }));
        }
    }

    #[tokio::test]
    async fn test_analyze_payload() {
        let (status, json) =
            post_analyze(app(stub_engine(0.9)), r#"{"url": "http://192.168.1.1/login"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["url"], "http://192.168.1.1/login");
        // 0.6 * 0.9 + 0.4 * 0.5 = 0.74
        assert_eq!(json["status"], "Suspicious");
        assert_eq!(json["risk_level"], "Medium");
        assert_eq!(json["confidence_score"], 74.0);
        assert_eq!(json["details"]["ml_score"], 90.0);
        assert_eq!(json["details"]["ai_score"], 50.0);
    }

    #[tokio::test]
    async fn test_end_to_end_with_real_models() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.model.path = dir.path().join("rf_model.json");
        let engine = RiskEngine::from_config(&config).unwrap();

        let (status, json) = post_analyze(
            app(engine),
            r#"{"url": "secure-login.paypal.com.verify-account.example.net/update"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let object = json.as_object().unwrap();
        for key in ["url", "status", "confidence_score", "risk_level", "details"] {
            assert!(object.contains_key(key), "missing {key}");
        }

        let ml = json["details"]["ml_score"].as_f64().unwrap();
        let ai = json["details"]["ai_score"].as_f64().unwrap();
        let confidence = json["confidence_score"].as_f64().unwrap();
        assert!((confidence - (ml * 0.6 + ai * 0.4)).abs() <= 0.02);
        assert!((0.0..=100.0).contains(&confidence));
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(stub_engine(0.1))
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "online");
        assert_eq!(json["text_model"], "unavailable");
        assert!(json["text_backend"].is_null());
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin_by_default() {
        let response = app(stub_engine(0.1))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/analyze")
                    .header("origin", "http://localhost:5173")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"url": "example.com"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[test]
    fn test_invalid_origin_is_a_config_error() {
        let server = ServerConfig {
            allowed_origins: vec!["http://bad\nhost".to_string()],
            ..ServerConfig::default()
        };
        assert!(router(stub_engine(0.1), &server).is_err());
    }
}
