/// PostgreSQL-backed stores
///
/// Thin wrappers over the model queries. The only translation done here is
/// mapping unique violations on `users.email` to [`StoreError::Conflict`].

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{normalize_release, ReleaseStore, StoreError, StoreResult, UserStore};
use crate::db::pool::health_check;
use crate::models::release::{CreateRelease, Release, ReleaseStatus};
use crate::models::user::{CreateUser, User};

/// Store over a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wraps an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl ReleaseStore for PgStore {
    async fn create(&self, data: CreateRelease) -> StoreResult<Release> {
        let data = normalize_release(data)?;
        Ok(Release::create(&self.pool, data).await?)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Release>> {
        Ok(Release::find_by_id(&self.pool, id).await?)
    }

    async fn find_by_project_and_version(
        &self,
        project_name: &str,
        version: &str,
    ) -> StoreResult<Option<Release>> {
        Ok(Release::find_by_project_and_version(&self.pool, project_name, version).await?)
    }

    async fn create_if_absent(&self, data: CreateRelease) -> StoreResult<(Release, bool)> {
        let data = normalize_release(data)?;
        let (release, created) = Release::create_if_absent(&self.pool, data).await?;

        debug!(
            release_id = %release.id,
            project = %release.project_name,
            version = %release.version,
            created,
            "create_if_absent"
        );

        Ok((release, created))
    }

    async fn list_all(&self) -> StoreResult<Vec<Release>> {
        Ok(Release::list_all(&self.pool).await?)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Release>> {
        Ok(Release::list_by_owner(&self.pool, owner_id).await?)
    }

    async fn update_status(&self, id: Uuid, status: ReleaseStatus) -> StoreResult<Option<Release>> {
        Ok(Release::update_status(&self.pool, id, status).await?)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(Release::delete(&self.pool, id).await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(health_check(&self.pool).await?)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create(&self, data: CreateUser) -> StoreResult<User> {
        let email = data.email.clone();

        User::create(&self.pool, data).await.map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!("Email already registered: {}", email))
            } else {
                StoreError::Database(e)
            }
        })
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn list(&self, limit: i64, offset: i64) -> StoreResult<Vec<User>> {
        Ok(User::list(&self.pool, limit, offset).await?)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(User::delete(&self.pool, id).await?)
    }
}
