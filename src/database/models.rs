use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::{GeometryError, Point, codec};

/// 用户当前路线。几何创建后不可修改，只能整体替换
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub id: String,
    pub owner_id: String,
    pub source: Point,
    pub destination: Point,
    pub geometry: String,
    pub created_at: DateTime<Utc>,
}

/// 待写入的路线，ID 由存储层分配
#[derive(Debug, Clone, PartialEq)]
pub struct NewPath {
    pub owner_id: String,
    pub source: Point,
    pub destination: Point,
    pub geometry: String,
    pub created_at: DateTime<Utc>,
}

impl NewPath {
    /// 起点和终点取几何的首尾两点，保证三者一致
    pub fn from_geometry(
        owner_id: &str,
        geometry: String,
        created_at: DateTime<Utc>,
    ) -> Result<Self, GeometryError> {
        let points = codec::decode(&geometry)?;
        let (Some(&source), Some(&destination)) = (points.first(), points.last()) else {
            return Err(GeometryError::MalformedGeometry(
                "path geometry needs at least two points".into(),
            ));
        };
        Ok(Self {
            owner_id: owner_id.to_string(),
            source,
            destination,
            geometry,
            created_at,
        })
    }

    pub fn into_path(self, id: String) -> Path {
        Path {
            id,
            owner_id: self.owner_id,
            source: self.source,
            destination: self.destination,
            geometry: self.geometry,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedUser {
    pub id: String,
    pub display_name: String,
    pub position: Point,
    pub last_seen_at: DateTime<Utc>,
}
