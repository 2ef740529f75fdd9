//! 路由配置模块
//!
//! `/webhook` 在 handler 内完成大小检查后再认证；只读接口统一走认证中间件。

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, post},
};
use leitura_shared::observability::middleware as obs_middleware;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::require_api_key;
use crate::handlers;
use crate::state::AppState;

/// 只读查询路由，供前端地图页面跨域访问
fn query_routes(state: &AppState) -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/stats", get(handlers::stats::get_stats))
        .route("/users", get(handlers::users::get_users))
        .route(
            "/readings/{iso3}",
            get(handlers::readings::get_country_readings),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(cors)
}

/// 构建完整路由
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(handlers::webhook::receive_webhook))
        .route("/health", get(handlers::health::health_check))
        .merge(query_routes(&state))
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
