use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NewPath, Path, PathRepository, RepositoryError, TrackedUser, UserLocationRepository};
use crate::geo::{BoundingBox, Point};

/// 内存存储，开发环境和测试使用
#[derive(Default)]
pub struct MemoryStore {
    // owner_id -> 当前路线
    paths: RwLock<HashMap<String, Path>>,
    users: RwLock<HashMap<String, TrackedUser>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PathRepository for MemoryStore {
    async fn replace_current_path(&self, path: NewPath) -> Result<Path, RepositoryError> {
        let path = path.into_path(Uuid::new_v4().to_string());
        let previous = self
            .paths
            .write()
            .await
            .insert(path.owner_id.clone(), path.clone());
        if let Some(previous) = previous {
            tracing::debug!("Replaced path {} of user {}", previous.id, previous.owner_id);
        }
        Ok(path)
    }

    async fn find_path(&self, path_id: &str) -> Result<Option<Path>, RepositoryError> {
        let paths = self.paths.read().await;
        Ok(paths.values().find(|p| p.id == path_id).cloned())
    }

    async fn find_current_path(&self, owner_id: &str) -> Result<Option<Path>, RepositoryError> {
        Ok(self.paths.read().await.get(owner_id).cloned())
    }

    async fn list_current_paths(&self) -> Result<Vec<Path>, RepositoryError> {
        let mut paths = self.paths.read().await.values().cloned().collect::<Vec<_>>();
        paths.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paths)
    }

    async fn delete_current_path(&self, owner_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.paths.write().await.remove(owner_id).is_some())
    }
}

#[async_trait]
impl UserLocationRepository for MemoryStore {
    async fn upsert_location(
        &self,
        user_id: &str,
        display_name: &str,
        position: Point,
        seen_at: DateTime<Utc>,
    ) -> Result<TrackedUser, RepositoryError> {
        let user = TrackedUser {
            id: user_id.to_string(),
            display_name: display_name.to_string(),
            position,
            last_seen_at: seen_at,
        };
        self.users
            .write()
            .await
            .insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn find_live_users(
        &self,
        bounds: &BoundingBox,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrackedUser>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|u| u.last_seen_at >= since && bounds.contains(u.position))
            .cloned()
            .collect())
    }
}
