// 地理计算模块
// 包含坐标类型、WKT 编解码、路径相交判断和路径邻近匹配

pub mod codec;
pub mod intersection;
pub mod proximity;

use serde::{Deserialize, Serialize};

pub use codec::{decode, encode};
pub use intersection::intersects;
pub use proximity::{MatchError, NearbyUser, ProximityMatcher, distance_to_path};

const EARTH_RADIUS_METERS: f64 = 6371000.0; // 地球半径（米）
const METERS_PER_DEGREE: f64 = 111000.0; // 1度纬度约111km

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("malformed geometry: {0}")]
    MalformedGeometry(String),

    #[error("coordinate out of range: lat={lat}, lng={lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },
}

/// 经纬度坐标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub fn new(lat: f64, lng: f64) -> Result<Self, GeometryError> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        if !valid {
            return Err(GeometryError::InvalidCoordinate { lat, lng });
        }
        Ok(Self { lat, lng })
    }

    /// 校验反序列化得到的坐标（serde 不会经过 `new`）
    pub fn validated(self) -> Result<Self, GeometryError> {
        Self::new(self.lat, self.lng)
    }
}

/// 使用 Haversine 公式计算两点间的球面距离（米）
pub fn haversine_distance(a: Point, b: Point) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_phi = (b.lat - a.lat).to_radians();
    let delta_lambda = (b.lng - a.lng).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// 经纬度范围，用于在存储层先做粗过滤
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let init = Self {
            min_lat: first.lat,
            max_lat: first.lat,
            min_lng: first.lng,
            max_lng: first.lng,
        };
        Some(points.iter().skip(1).fold(init, |b, p| Self {
            min_lat: b.min_lat.min(p.lat),
            max_lat: b.max_lat.max(p.lat),
            min_lng: b.min_lng.min(p.lng),
            max_lng: b.max_lng.max(p.lng),
        }))
    }

    /// 按米数向外扩展。111000 米/度略小于实际值，所以范围只会偏大不会偏小
    pub fn expand_by_meters(&self, meters: f64) -> Self {
        let lat_range = meters / METERS_PER_DEGREE;
        let min_lat = (self.min_lat - lat_range).max(-90.0);
        let max_lat = (self.max_lat + lat_range).min(90.0);

        let widest = min_lat.abs().max(max_lat.abs()).min(89.9);
        let lng_range = meters / (METERS_PER_DEGREE * widest.to_radians().cos());
        let touches_pole = min_lat <= -90.0 || max_lat >= 90.0;
        let (min_lng, max_lng) = if touches_pole
            || self.min_lng - lng_range < -180.0
            || self.max_lng + lng_range > 180.0
        {
            // 范围包含极点或跨越反子午线时直接放开经度范围
            (-180.0, 180.0)
        } else {
            (self.min_lng - lng_range, self.max_lng + lng_range)
        };

        Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lng..=self.max_lng).contains(&point.lng)
    }
}
