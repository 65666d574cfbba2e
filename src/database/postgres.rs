use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, FromRow, PgPool};
use uuid::Uuid;

use super::{NewPath, Path, PathRepository, RepositoryError, TrackedUser, UserLocationRepository};
use crate::geo::{BoundingBox, Point};

/// Postgres 存储
pub struct PgStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct PathRow {
    path_id: String,
    owner_id: String,
    source_lat: f64,
    source_lng: f64,
    dest_lat: f64,
    dest_lng: f64,
    geometry: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PathRow> for Path {
    type Error = RepositoryError;

    fn try_from(row: PathRow) -> Result<Self, Self::Error> {
        let corrupt = |e: crate::geo::GeometryError| {
            RepositoryError::Corrupt(format!("path {}: {}", row.path_id, e))
        };
        let source = Point::new(row.source_lat, row.source_lng).map_err(corrupt)?;
        let destination = Point::new(row.dest_lat, row.dest_lng).map_err(corrupt)?;
        Ok(Path {
            id: row.path_id,
            owner_id: row.owner_id,
            source,
            destination,
            geometry: row.geometry,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LocationRow {
    user_id: String,
    display_name: String,
    latitude: f64,
    longitude: f64,
    last_seen_at: DateTime<Utc>,
}

impl TryFrom<LocationRow> for TrackedUser {
    type Error = RepositoryError;

    fn try_from(row: LocationRow) -> Result<Self, Self::Error> {
        let position = Point::new(row.latitude, row.longitude)
            .map_err(|e| RepositoryError::Corrupt(format!("user {}: {}", row.user_id, e)))?;
        Ok(TrackedUser {
            id: row.user_id,
            display_name: row.display_name,
            position,
            last_seen_at: row.last_seen_at,
        })
    }
}

const PATH_COLUMNS: &str =
    "path_id, owner_id, source_lat, source_lng, dest_lat, dest_lng, geometry, created_at";

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET application_name = 'geotrack_backend';")
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl PathRepository for PgStore {
    async fn replace_current_path(&self, path: NewPath) -> Result<Path, RepositoryError> {
        let path = path.into_path(Uuid::new_v4().to_string());

        // 单条语句按 owner_id 覆盖，同一用户并发创建时不会撞上唯一约束
        sqlx::query(
            r#"
            INSERT INTO paths (
                path_id, owner_id, source_lat, source_lng, dest_lat, dest_lng, geometry, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (owner_id) DO UPDATE SET
                path_id = EXCLUDED.path_id,
                source_lat = EXCLUDED.source_lat,
                source_lng = EXCLUDED.source_lng,
                dest_lat = EXCLUDED.dest_lat,
                dest_lng = EXCLUDED.dest_lng,
                geometry = EXCLUDED.geometry,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(&path.id)
        .bind(&path.owner_id)
        .bind(path.source.lat)
        .bind(path.source.lng)
        .bind(path.destination.lat)
        .bind(path.destination.lng)
        .bind(&path.geometry)
        .bind(path.created_at)
        .execute(&self.pool)
        .await?;

        Ok(path)
    }

    async fn find_path(&self, path_id: &str) -> Result<Option<Path>, RepositoryError> {
        let row = sqlx::query_as::<_, PathRow>(&format!(
            "SELECT {} FROM paths WHERE path_id = $1",
            PATH_COLUMNS
        ))
        .bind(path_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Path::try_from).transpose()
    }

    async fn find_current_path(&self, owner_id: &str) -> Result<Option<Path>, RepositoryError> {
        let row = sqlx::query_as::<_, PathRow>(&format!(
            "SELECT {} FROM paths WHERE owner_id = $1",
            PATH_COLUMNS
        ))
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Path::try_from).transpose()
    }

    async fn list_current_paths(&self) -> Result<Vec<Path>, RepositoryError> {
        let rows = sqlx::query_as::<_, PathRow>(&format!(
            "SELECT {} FROM paths ORDER BY created_at DESC",
            PATH_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Path::try_from).collect()
    }

    async fn delete_current_path(&self, owner_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM paths WHERE owner_id = $1")
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserLocationRepository for PgStore {
    async fn upsert_location(
        &self,
        user_id: &str,
        display_name: &str,
        position: Point,
        seen_at: DateTime<Utc>,
    ) -> Result<TrackedUser, RepositoryError> {
        let row = sqlx::query_as::<_, LocationRow>(
            r#"
            INSERT INTO user_locations (user_id, display_name, latitude, longitude, last_seen_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                last_seen_at = EXCLUDED.last_seen_at
            RETURNING user_id, display_name, latitude, longitude, last_seen_at
            "#,
        )
        .bind(user_id)
        .bind(display_name)
        .bind(position.lat)
        .bind(position.lng)
        .bind(seen_at)
        .fetch_one(&self.pool)
        .await?;
        TrackedUser::try_from(row)
    }

    async fn find_live_users(
        &self,
        bounds: &BoundingBox,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrackedUser>, RepositoryError> {
        let rows = sqlx::query_as::<_, LocationRow>(
            r#"
            SELECT user_id, display_name, latitude, longitude, last_seen_at
            FROM user_locations
            WHERE
                last_seen_at >= $1
                AND latitude BETWEEN $2 AND $3
                AND longitude BETWEEN $4 AND $5
            "#,
        )
        .bind(since)
        .bind(bounds.min_lat)
        .bind(bounds.max_lat)
        .bind(bounds.min_lng)
        .bind(bounds.max_lng)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TrackedUser::try_from).collect()
    }
}
