//! 可观测性模块集成测试
//!
//! 测试 metrics、middleware 和配置的核心功能。

// ============================================================================
// 指标记录测试
// ============================================================================

mod metrics_tests {
    use leitura_shared::observability::metrics::{
        record_desafio, record_http_request, record_queue_message, record_redelivery,
        record_webhook_request,
    };

    #[test]
    fn test_record_http_request() {
        record_http_request("POST", "/webhook", 202, 0.05);
        record_http_request("GET", "/stats", 200, 0.12);
        record_http_request("GET", "/readings/{iso3}", 400, 0.01);
        record_http_request("GET", "/users", 401, 0.01);
        record_http_request("GET", "/health", 503, 0.25);
    }

    #[test]
    fn test_record_pipeline_counters() {
        for status in [200, 202, 400, 401, 500] {
            record_webhook_request(status);
        }
        for outcome in ["acknowledged", "retried", "dead_lettered"] {
            record_queue_message(outcome);
        }
        for result in ["processed", "skipped", "country_not_found", "store_write_failure"] {
            record_desafio(result);
        }
        record_redelivery("retry");
        record_redelivery("dead_letter");
    }

    #[test]
    fn test_metrics_with_edge_cases() {
        record_http_request("", "", 0, 0.0);

        let long_path = "/readings/".to_string() + &"x".repeat(1000);
        record_http_request("GET", &long_path, 404, 0.01);

        record_http_request("GET", "/stats?cache=0", 200, 999.99);
        record_desafio("");
    }
}

// ============================================================================
// HTTP 中间件测试
// ============================================================================

mod middleware_tests {
    use axum::{
        Router,
        body::Body,
        extract::{Extension, Path},
        http::{Request, StatusCode},
        middleware,
        routing::get,
    };
    use leitura_shared::observability::middleware::{
        REQUEST_ID_HEADER, RequestId, http_tracing, request_id,
    };
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/readings/{iso3}",
                get(|Path(iso3): Path<String>| async move { iso3 }),
            )
            .route(
                "/echo-id",
                get(|Extension(id): Extension<RequestId>| async move { id.as_str().to_string() }),
            )
            .layer(middleware::from_fn(http_tracing))
            .layer(middleware::from_fn(request_id))
    }

    #[test]
    fn test_request_id_accessors() {
        let id = RequestId("req-abc".to_string());
        assert_eq!(id.as_str(), "req-abc");
        assert!(format!("{:?}", id.clone()).contains("req-abc"));
    }

    #[tokio::test]
    async fn test_handler_sees_request_id() {
        let response = app()
            .oneshot(
                Request::get("/echo-id")
                    .header(REQUEST_ID_HEADER, "req-xyz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"req-xyz");
    }

    #[tokio::test]
    async fn test_empty_request_id_is_replaced() {
        let response = app()
            .oneshot(
                Request::get("/readings/BRA")
                    .header(REQUEST_ID_HEADER, "")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let id = response.headers().get(REQUEST_ID_HEADER).unwrap();
        assert!(uuid::Uuid::parse_str(id.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_tracing_passes_through_not_found() {
        let response = app()
            .oneshot(Request::get("/nada").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }
}

// ============================================================================
// 配置测试
// ============================================================================

mod config_tests {
    use leitura_shared::config::{AppConfig, ObservabilityConfig};

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.service_name, "unknown-service");
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_custom_config() {
        let config = ObservabilityConfig {
            service_name: "webhook-api".to_string(),
            log_level: "debug".to_string(),
            json_logs: true,
            metrics_enabled: false,
            metrics_port: 9091,
        };

        assert_eq!(config.service_name, "webhook-api");
        assert_eq!(config.metrics_port, 9091);
        assert!(config.json_logs);
        assert!(!config.metrics_enabled);
    }

    #[test]
    fn test_app_config_embeds_observability() {
        let config = AppConfig::default();
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.observability.metrics_port, 9090);
    }
}

// ============================================================================
// Guard 测试
// ============================================================================

mod guard_tests {
    use leitura_shared::config::ObservabilityConfig;
    use leitura_shared::observability::{self, ObservabilityGuard};

    #[test]
    fn test_empty_guard() {
        let guard = ObservabilityGuard::empty();
        drop(guard);
    }

    /// 关闭指标导出时只安装日志订阅者，重复初始化不报错
    #[tokio::test]
    async fn test_init_without_metrics() {
        let config = ObservabilityConfig {
            service_name: "test-service".to_string(),
            metrics_enabled: false,
            ..Default::default()
        };

        let first = observability::init(&config).await;
        assert!(first.is_ok());
        let second = observability::init(&config).await;
        assert!(second.is_ok());
    }
}
