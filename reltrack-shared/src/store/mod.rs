/// Persistence behind async traits
///
/// Handlers, the capability gate and the importer talk to storage only through
/// [`ReleaseStore`] and [`UserStore`]. Two backends implement both traits:
///
/// - [`PgStore`]: PostgreSQL through the model queries in [`crate::models`]
/// - [`MemoryStore`]: process-local state for tests and database-less runs
///
/// # Duplicate prevention
///
/// `(project_name, version)` is not unique for hand-made releases, but
/// [`ReleaseStore::create_if_absent`] must never insert a second row for a pair
/// that already exists, even when called concurrently for the same pair.
///
/// # Example
///
/// ```
/// use reltrack_shared::models::release::{CreateRelease, ReleaseStatus};
/// use reltrack_shared::store::{MemoryStore, ReleaseStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let data = CreateRelease {
///     project_name: "alpha".to_string(),
///     version: "1.2.0".to_string(),
///     status: ReleaseStatus::Planned,
///     owner_id: None,
/// };
///
/// let (_, created) = store.create_if_absent(data.clone()).await?;
/// let (_, created_again) = store.create_if_absent(data).await?;
/// assert!(created && !created_again);
/// # Ok(())
/// # }
/// ```

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::release::{CreateRelease, Release, ReleaseStatus};
use crate::models::user::{CreateUser, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage error
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness rule was violated (e.g. duplicate email)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Input was rejected before reaching storage
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Backend failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Release persistence
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Records a new release; blank name or version is a validation error
    async fn create(&self, data: CreateRelease) -> StoreResult<Release>;

    /// Finds a release by ID
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Release>>;

    /// Finds the oldest release for a (project, version) pair
    async fn find_by_project_and_version(
        &self,
        project_name: &str,
        version: &str,
    ) -> StoreResult<Option<Release>>;

    /// Creates the release unless the pair already exists
    ///
    /// Returns the stored release and whether it was created by this call.
    /// The check and the insert are atomic per pair.
    async fn create_if_absent(&self, data: CreateRelease) -> StoreResult<(Release, bool)>;

    /// Every release, newest first
    async fn list_all(&self) -> StoreResult<Vec<Release>>;

    /// Releases owned by one user, newest first
    async fn list_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Release>>;

    /// Replaces the status; None if the release doesn't exist
    async fn update_status(&self, id: Uuid, status: ReleaseStatus) -> StoreResult<Option<Release>>;

    /// Deletes a release; false if it didn't exist
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;

    /// Verifies the backend is reachable
    async fn ping(&self) -> StoreResult<()>;
}

/// User account persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates a user; a taken email is [`StoreError::Conflict`]
    async fn create(&self, data: CreateUser) -> StoreResult<User>;

    /// Finds a user by ID
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Finds a user by email, case-insensitively
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Lists users, newest first
    async fn list(&self, limit: i64, offset: i64) -> StoreResult<Vec<User>>;

    /// Deletes a user; their releases lose their owner. False if absent.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

/// Normalizes release input, mapping rejections to [`StoreError::Validation`]
pub(crate) fn normalize_release(data: CreateRelease) -> StoreResult<CreateRelease> {
    data.normalized().map_err(StoreError::Validation)
}
