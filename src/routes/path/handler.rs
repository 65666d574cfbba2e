use axum::{
    Extension,
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::model::{CreatePathRequest, CrossingQuery, NearbyUsersQuery, NearbyUsersResponse, PathInfo};
use crate::{
    AppState,
    error::AppError,
    geo::GeometryError,
    utils::{Claims, success_to_api_response},
};

fn invalid_point(e: GeometryError) -> AppError {
    AppError::Validation(format!("坐标无效: {}", e))
}

#[axum::debug_handler]
pub async fn create_path(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePathRequest>,
) -> Result<impl IntoResponse, AppError> {
    let source = req.source.validated().map_err(invalid_point)?;
    let destination = req.destination.validated().map_err(invalid_point)?;

    let path = state
        .matching
        .create_path(&claims.sub, source, destination)
        .await?;
    Ok((
        StatusCode::CREATED,
        success_to_api_response(PathInfo::from(path)),
    ))
}

#[axum::debug_handler]
pub async fn get_my_path(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let path = state.matching.current_path(&claims.sub).await?;
    Ok(success_to_api_response(PathInfo::from(path)))
}

#[axum::debug_handler]
pub async fn delete_my_path(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    state.matching.delete_current_path(&claims.sub).await?;
    Ok(success_to_api_response(serde_json::json!({
        "success": true
    })))
}

#[axum::debug_handler]
pub async fn find_nearby_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<NearbyUsersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let radius = query.radius.unwrap_or(state.config.default_search_radius);
    if !radius.is_finite() || radius <= 0.0 {
        return Err(AppError::Validation("radius必须为正数".into()));
    }
    let radius = radius.min(state.config.max_search_radius);

    let path = state
        .matching
        .resolve_path(query.path_id.as_deref(), &claims.sub)
        .await?;
    let result = state
        .matching
        .nearby_users(path, radius, &claims.sub, query.intersecting_only)
        .await?;

    Ok(success_to_api_response(NearbyUsersResponse::from(result)))
}

#[axum::debug_handler]
pub async fn find_crossing_paths(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<CrossingQuery>,
) -> Result<impl IntoResponse, AppError> {
    let path = state
        .matching
        .resolve_path(query.path_id.as_deref(), &claims.sub)
        .await?;
    let crossing = state.matching.crossing_paths(&path).await?;

    let infos = crossing.into_iter().map(PathInfo::from).collect::<Vec<_>>();
    Ok(success_to_api_response(infos))
}
