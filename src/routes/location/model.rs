use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::TrackedUser;

#[derive(Debug, Deserialize)]
pub struct UpdateLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LocationInfo {
    pub user_id: String,
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub last_seen_at: DateTime<Utc>,
}

impl From<TrackedUser> for LocationInfo {
    fn from(user: TrackedUser) -> Self {
        Self {
            user_id: user.id,
            display_name: user.display_name,
            latitude: user.position.lat,
            longitude: user.position.lng,
            last_seen_at: user.last_seen_at,
        }
    }
}
