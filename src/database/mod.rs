// 数据库模块
// 路线与用户位置的存储接口，启动时按配置选择 Postgres 或内存实现

pub mod memory;
pub mod models;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::{Config, StoreBackend};
use crate::geo::{BoundingBox, Point};

pub use memory::MemoryStore;
pub use models::{NewPath, Path, TrackedUser};
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("stored row is invalid: {0}")]
    Corrupt(String),

    #[error("store misconfigured: {0}")]
    Config(String),
}

#[async_trait]
pub trait PathRepository: Send + Sync {
    /// 写入新路线并删除该用户之前的路线
    async fn replace_current_path(&self, path: NewPath) -> Result<Path, RepositoryError>;

    async fn find_path(&self, path_id: &str) -> Result<Option<Path>, RepositoryError>;

    async fn find_current_path(&self, owner_id: &str) -> Result<Option<Path>, RepositoryError>;

    async fn list_current_paths(&self) -> Result<Vec<Path>, RepositoryError>;

    /// 返回是否真的删除了路线
    async fn delete_current_path(&self, owner_id: &str) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait UserLocationRepository: Send + Sync {
    async fn upsert_location(
        &self,
        user_id: &str,
        display_name: &str,
        position: Point,
        seen_at: DateTime<Utc>,
    ) -> Result<TrackedUser, RepositoryError>;

    /// 查找范围内、`since` 之后上报过位置的用户
    async fn find_live_users(
        &self,
        bounds: &BoundingBox,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrackedUser>, RepositoryError>;
}

#[derive(Clone)]
pub struct Stores {
    pub paths: Arc<dyn PathRepository>,
    pub locations: Arc<dyn UserLocationRepository>,
}

impl Stores {
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            paths: store.clone(),
            locations: store,
        }
    }

    pub fn postgres(store: PgStore) -> Self {
        let store = Arc::new(store);
        Self {
            paths: store.clone(),
            locations: store,
        }
    }

    pub async fn connect(config: &Config) -> Result<Self, RepositoryError> {
        match config.store_backend {
            StoreBackend::Memory => {
                tracing::info!("Using in-memory store");
                Ok(Self::memory())
            }
            StoreBackend::Postgres => {
                let url = config.database_url.as_deref().ok_or_else(|| {
                    RepositoryError::Config("DATABASE_URL is required for postgres".into())
                })?;
                tracing::info!("Using postgres store");
                Ok(Self::postgres(PgStore::connect(url).await?))
            }
        }
    }
}
