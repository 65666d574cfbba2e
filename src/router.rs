use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    AppState,
    middleware::{RateLimiter, auth_middleware, log_errors, rate_limit},
    routes,
    utils::success_to_api_response,
};

async fn health() -> axum::Json<crate::utils::ApiResponse<&'static str>> {
    success_to_api_response("ok")
}

// 创建主路由，传入限流器时对所有接口限流
pub fn create_router(state: AppState, rate_limiter: Option<Arc<RateLimiter>>) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        // 路线
        .route("/paths", post(routes::path::create_path))
        .route(
            "/paths/mine",
            get(routes::path::get_my_path).delete(routes::path::delete_my_path),
        )
        .route("/paths/nearby-users", get(routes::path::find_nearby_users))
        .route("/paths/crossing", get(routes::path::find_crossing_paths))
        // 位置
        .route("/locations", post(routes::location::update_location))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = Router::new().merge(public_routes).merge(protected_routes);
    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    let router = router.layer(axum::middleware::from_fn(log_errors));
    let router = match rate_limiter {
        Some(limiter) => router.layer(axum::middleware::from_fn_with_state(limiter, rate_limit)),
        None => router,
    };

    router.with_state(state)
}
