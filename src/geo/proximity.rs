use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;

use super::{BoundingBox, GeometryError, Point, codec, haversine_distance};
use crate::cache::Clock;
use crate::database::{Path, RepositoryError, TrackedUser, UserLocationRepository};

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// 路径附近的用户及其到路径的距离
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyUser {
    pub user: TrackedUser,
    pub distance_meters: f64,
}

/// 点到折线的最近距离（米）。逐段投影取最小值，而不是只看顶点
pub fn distance_to_path(point: Point, path: &[Point]) -> Option<f64> {
    match path {
        [] => None,
        [only] => Some(haversine_distance(point, *only)),
        _ => path
            .windows(2)
            .map(|seg| distance_to_segment(point, seg[0], seg[1]))
            .min_by(f64::total_cmp),
    }
}

/// 以目标点为原点做局部平面近似求投影，再用 Haversine 计算到最近点的距离
fn distance_to_segment(point: Point, a: Point, b: Point) -> f64 {
    let scale = point.lat.to_radians().cos();
    let ax = (a.lng - point.lng) * scale;
    let ay = a.lat - point.lat;
    let dx = (b.lng - a.lng) * scale;
    let dy = b.lat - a.lat;

    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0)
    };

    let nearest = Point {
        lat: a.lat + t * (b.lat - a.lat),
        lng: a.lng + t * (b.lng - a.lng),
    };
    haversine_distance(point, nearest)
}

/// 查找路径附近的在线用户
pub struct ProximityMatcher {
    locations: Arc<dyn UserLocationRepository>,
    clock: Arc<dyn Clock>,
    live_window: Duration,
}

impl ProximityMatcher {
    pub fn new(
        locations: Arc<dyn UserLocationRepository>,
        clock: Arc<dyn Clock>,
        live_window: Duration,
    ) -> Self {
        Self {
            locations,
            clock,
            live_window,
        }
    }

    pub async fn find_users_near_path(
        &self,
        path: &Path,
        radius_meters: f64,
        exclude_user_id: Option<&str>,
    ) -> Result<Vec<NearbyUser>, MatchError> {
        let geometry = codec::decode(&path.geometry)?;
        let Some(bounds) = BoundingBox::from_points(&geometry) else {
            return Ok(Vec::new());
        };
        if radius_meters.is_nan() || radius_meters < 0.0 {
            return Ok(Vec::new());
        }

        // 先用经纬度范围粗过滤，再精确计算距离
        let since = self.clock.now() - self.live_window;
        let candidates = self
            .locations
            .find_live_users(&bounds.expand_by_meters(radius_meters), since)
            .await?;
        let total = candidates.len();

        let mut nearby = candidates
            .into_iter()
            .filter(|user| Some(user.id.as_str()) != exclude_user_id)
            .filter(|user| user.last_seen_at >= since)
            .filter_map(|user| {
                let distance = distance_to_path(user.position, &geometry)?;
                (distance <= radius_meters).then_some(NearbyUser {
                    user,
                    distance_meters: distance,
                })
            })
            .collect::<Vec<_>>();

        // 按距离排序
        nearby.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));

        tracing::debug!(
            "Path {} radius {}m: {} of {} candidates matched",
            path.id,
            radius_meters,
            nearby.len(),
            total
        );
        Ok(nearby)
    }
}
