#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::routes;
    use crate::state::AppState;
    use crate::tests::{body_json, body_text};

    fn setup_test_app() -> Router {
        routes::router(AppState::new(AppConfig::default()))
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let app = setup_test_app();
        for uri in ["/health", "/api/health"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_text(response).await, "ok");
        }
    }

    #[tokio::test]
    async fn test_version_endpoint() {
        let response = setup_test_app()
            .oneshot(Request::builder().uri("/version").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["name"], env!("CARGO_PKG_NAME"));
        assert!(json["build"]["os"].is_string());
    }

    #[tokio::test]
    async fn test_metrics_json_and_prometheus() {
        let state = AppState::new(AppConfig::default());
        state.metrics.inc_rate_limited();
        let app = routes::router(state);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["requests_rate_limited"], 1);

        let response = app
            .oneshot(Request::builder().uri("/metrics/prometheus").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/plain; version=0.0.4");
        let text = body_text(response).await;
        assert!(text.contains("admission_requests_rate_limited 1"));
        assert!(text.contains("# TYPE admission_uptime_seconds gauge"));
    }

    #[tokio::test]
    async fn test_security_headers_applied() {
        let response = setup_test_app()
            .oneshot(Request::builder().uri("/version").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let headers = response.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["cache-control"], "no-store");
    }
}
