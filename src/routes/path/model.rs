use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::Path;
use crate::geo::{NearbyUser, Point};
use crate::matching::NearbyUsers;

#[derive(Debug, Deserialize)]
pub struct CreatePathRequest {
    pub source: Point,
    pub destination: Point,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PathInfo {
    pub path_id: String,
    pub owner_id: String,
    pub source: Point,
    pub destination: Point,
    pub geometry: String,
    pub created_at: DateTime<Utc>,
}

impl From<Path> for PathInfo {
    fn from(path: Path) -> Self {
        Self {
            path_id: path.id,
            owner_id: path.owner_id,
            source: path.source,
            destination: path.destination,
            geometry: path.geometry,
            created_at: path.created_at,
        }
    }
}

// 附近用户查询参数，不传 path_id 时使用自己的路线
#[derive(Debug, Deserialize)]
pub struct NearbyUsersQuery {
    pub path_id: Option<String>,
    pub radius: Option<f64>,
    #[serde(default)]
    pub intersecting_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct CrossingQuery {
    pub path_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyUserInfo {
    pub user_id: String,
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_meters: f64,
}

impl From<NearbyUser> for NearbyUserInfo {
    fn from(nearby: NearbyUser) -> Self {
        Self {
            user_id: nearby.user.id,
            display_name: nearby.user.display_name,
            latitude: nearby.user.position.lat,
            longitude: nearby.user.position.lng,
            distance_meters: nearby.distance_meters,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NearbyUsersResponse {
    pub path_id: String,
    pub radius: f64,
    pub cached: bool,
    pub users: Vec<NearbyUserInfo>,
}

impl From<NearbyUsers> for NearbyUsersResponse {
    fn from(result: NearbyUsers) -> Self {
        Self {
            path_id: result.path.id,
            radius: result.radius,
            cached: result.cached,
            users: result.users.into_iter().map(NearbyUserInfo::from).collect(),
        }
    }
}
