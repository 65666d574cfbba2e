use axum::{
    Extension,
    extract::{Json, State},
    response::IntoResponse,
};

use super::model::{LocationInfo, UpdateLocationRequest};
use crate::{
    AppState,
    error::AppError,
    geo::Point,
    utils::{Claims, success_to_api_response},
};

// 上报当前位置
#[axum::debug_handler]
pub async fn update_location(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateLocationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let position = Point::new(req.latitude, req.longitude)
        .map_err(|e| AppError::Validation(format!("坐标无效: {}", e)))?;
    let display_name = req
        .display_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| claims.sub.clone());

    let user = state
        .matching
        .record_location(&claims.sub, &display_name, position)
        .await?;
    Ok(success_to_api_response(LocationInfo::from(user)))
}
