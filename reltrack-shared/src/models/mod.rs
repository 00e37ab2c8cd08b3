/// Database models for the release tracker
///
/// This module contains the persisted entities and their PostgreSQL operations.
///
/// # Models
///
/// - `user`: User accounts, credentials and roles
/// - `release`: Release records and the release status set
///
/// # Example
///
/// ```no_run
/// use reltrack_shared::models::release::{Release, CreateRelease, ReleaseStatus};
/// use reltrack_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let release = Release::create(&pool, CreateRelease {
///     project_name: "requests".to_string(),
///     version: "2.32.3".to_string(),
///     status: ReleaseStatus::Planned,
///     owner_id: None,
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod release;
pub mod user;
