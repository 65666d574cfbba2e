// 路线匹配服务
// 组合路线获取、相交判断、附近用户匹配和结果缓存

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::try_join_all;

use crate::cache::{Clock, PathResultCache};
use crate::database::{NewPath, Path, PathRepository, TrackedUser, UserLocationRepository};
use crate::error::AppError;
use crate::geo::{NearbyUser, Point, ProximityMatcher, intersects};
use crate::routing::RouteProvider;

/// 附近用户查询结果
#[derive(Debug, Clone)]
pub struct NearbyUsers {
    pub path: Path,
    pub radius: f64,
    pub cached: bool,
    pub users: Vec<NearbyUser>,
}

pub struct PathMatchingService {
    paths: Arc<dyn PathRepository>,
    locations: Arc<dyn UserLocationRepository>,
    routes: RouteProvider,
    matcher: ProximityMatcher,
    cache: PathResultCache,
    clock: Arc<dyn Clock>,
}

impl PathMatchingService {
    pub fn new(
        paths: Arc<dyn PathRepository>,
        locations: Arc<dyn UserLocationRepository>,
        routes: RouteProvider,
        matcher: ProximityMatcher,
        cache: PathResultCache,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            paths,
            locations,
            routes,
            matcher,
            cache,
            clock,
        }
    }

    /// 获取路线并替换该用户当前的路线
    pub async fn create_path(
        &self,
        owner_id: &str,
        source: Point,
        destination: Point,
    ) -> Result<Path, AppError> {
        let geometry = self.routes.get_route(source, destination).await;
        let new_path = NewPath::from_geometry(owner_id, geometry, self.clock.now())?;
        let path = self.paths.replace_current_path(new_path).await?;
        tracing::info!("User {} created path {}", owner_id, path.id);
        Ok(path)
    }

    pub async fn current_path(&self, owner_id: &str) -> Result<Path, AppError> {
        self.paths
            .find_current_path(owner_id)
            .await?
            .ok_or(AppError::PathNotFound)
    }

    pub async fn delete_current_path(&self, owner_id: &str) -> Result<(), AppError> {
        if !self.paths.delete_current_path(owner_id).await? {
            return Err(AppError::PathNotFound);
        }
        tracing::info!("User {} deleted current path", owner_id);
        Ok(())
    }

    /// 指定了 path_id 就按 ID 查找，否则使用调用者自己的当前路线
    pub async fn resolve_path(&self, path_id: Option<&str>, caller_id: &str) -> Result<Path, AppError> {
        match path_id {
            Some(id) => self
                .paths
                .find_path(id)
                .await?
                .ok_or_else(|| AppError::UnknownPath(id.to_string())),
            None => self.current_path(caller_id).await,
        }
    }

    /// 路线附近的在线用户，结果按 (路线ID, 半径) 缓存
    ///
    /// 缓存中保存的是排除路线所有者后的结果；调用者自身和 `intersecting_only`
    /// 过滤在读缓存之后再做，相交判断不进缓存。
    pub async fn nearby_users(
        &self,
        path: Path,
        radius: f64,
        caller_id: &str,
        intersecting_only: bool,
    ) -> Result<NearbyUsers, AppError> {
        let (users, cached) = match self.cache.get(&path.id, radius) {
            Some(users) => (users, true),
            None => {
                let users = self
                    .matcher
                    .find_users_near_path(&path, radius, Some(path.owner_id.as_str()))
                    .await?;
                self.cache.put(&path.id, radius, users.clone());
                (users, false)
            }
        };

        let mut users = users
            .into_iter()
            .filter(|n| n.user.id != caller_id)
            .collect::<Vec<_>>();

        if intersecting_only {
            let crossing = self.owners_crossing(&path, &users).await?;
            users.retain(|n| crossing.contains(&n.user.id));
        }

        Ok(NearbyUsers {
            path,
            radius,
            cached,
            users,
        })
    }

    async fn owners_crossing(
        &self,
        path: &Path,
        users: &[NearbyUser],
    ) -> Result<HashSet<String>, AppError> {
        let their_paths = try_join_all(
            users
                .iter()
                .map(|n| self.paths.find_current_path(&n.user.id)),
        )
        .await?;

        Ok(their_paths
            .into_iter()
            .flatten()
            .filter(|other| crosses(path, other))
            .map(|other| other.owner_id)
            .collect())
    }

    /// 其他用户当前路线中与该路线相交的部分
    pub async fn crossing_paths(&self, path: &Path) -> Result<Vec<Path>, AppError> {
        let others = self.paths.list_current_paths().await?;
        Ok(others
            .into_iter()
            .filter(|other| other.owner_id != path.owner_id)
            .filter(|other| crosses(path, other))
            .collect())
    }

    /// 更新用户位置。任何位置变化都可能影响所有路线的附近用户，直接清空缓存
    pub async fn record_location(
        &self,
        user_id: &str,
        display_name: &str,
        position: Point,
    ) -> Result<TrackedUser, AppError> {
        let user = self
            .locations
            .upsert_location(user_id, display_name, position, self.clock.now())
            .await?;
        self.cache.invalidate_all();
        Ok(user)
    }
}

// 存储中的坏数据只跳过并记录，不影响其他路线
fn crosses(path: &Path, other: &Path) -> bool {
    match intersects(&path.geometry, &other.geometry) {
        Ok(hit) => hit,
        Err(e) => {
            tracing::warn!("Skipping path pair {} / {}: {}", path.id, other.id, e);
            false
        }
    }
}
