/// Release model and database operations
///
/// A release record tracks one (project, version) pair and where it is in its
/// lifecycle. The status set is flat: any status may be replaced by any other.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE release_status AS ENUM (
///     'Planned', 'In Development', 'Released', 'Archived'
/// );
///
/// CREATE TABLE releases (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     project_name VARCHAR(255) NOT NULL CHECK (project_name <> ''),
///     version VARCHAR(255) NOT NULL CHECK (version <> ''),
///     status release_status NOT NULL DEFAULT 'Planned',
///     owner_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// (project_name, version) is deliberately not a unique key: manual creation may
/// record the same pair twice. The import path avoids duplicates through
/// [`Release::create_if_absent`], which serializes its check and insert on a
/// transaction-scoped advisory lock keyed by the pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Release lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "release_status")]
pub enum ReleaseStatus {
    /// Release is planned but work has not started
    #[sqlx(rename = "Planned")]
    #[serde(rename = "Planned", alias = "planned")]
    Planned,

    /// Release is being worked on
    #[sqlx(rename = "In Development")]
    #[serde(
        rename = "In Development",
        alias = "in_development",
        alias = "InDevelopment"
    )]
    InDevelopment,

    /// Release has shipped
    #[sqlx(rename = "Released")]
    #[serde(rename = "Released", alias = "released")]
    Released,

    /// Release is retired
    #[sqlx(rename = "Archived")]
    #[serde(rename = "Archived", alias = "archived")]
    Archived,
}

impl ReleaseStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [ReleaseStatus; 4] = [
        ReleaseStatus::Planned,
        ReleaseStatus::InDevelopment,
        ReleaseStatus::Released,
        ReleaseStatus::Archived,
    ];

    /// Gets the display label, which is also the stored value
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::Planned => "Planned",
            ReleaseStatus::InDevelopment => "In Development",
            ReleaseStatus::Released => "Released",
            ReleaseStatus::Archived => "Archived",
        }
    }
}

impl Default for ReleaseStatus {
    fn default() -> Self {
        ReleaseStatus::Planned
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseStatus {
    type Err = String;

    /// Parses a status label, ignoring case and treating `_`, `-` and spaces alike
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();

        match key.as_str() {
            "planned" => Ok(ReleaseStatus::Planned),
            "indevelopment" => Ok(ReleaseStatus::InDevelopment),
            "released" => Ok(ReleaseStatus::Released),
            "archived" => Ok(ReleaseStatus::Archived),
            _ => Err(format!("Unknown release status: {}", s.trim())),
        }
    }
}

/// Release model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Release {
    /// Unique release ID
    pub id: Uuid,

    /// Project (package) name
    pub project_name: String,

    /// Version string
    pub version: String,

    /// Current lifecycle status
    pub status: ReleaseStatus,

    /// User who owns the record (None if the owner was deleted)
    pub owner_id: Option<Uuid>,

    /// When the release was recorded; never changes
    pub created_at: DateTime<Utc>,

    /// When the release was last modified
    pub updated_at: DateTime<Utc>,
}

impl Release {
    /// Checks if this release is for the given (project, version) pair
    pub fn matches(&self, project_name: &str, version: &str) -> bool {
        self.project_name == project_name && self.version == version
    }
}

/// Input for creating a release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRelease {
    /// Project name (non-empty after trimming)
    pub project_name: String,

    /// Version (non-empty after trimming)
    pub version: String,

    /// Initial status
    #[serde(default)]
    pub status: ReleaseStatus,

    /// Owning user
    pub owner_id: Option<Uuid>,
}

impl CreateRelease {
    /// Trims the inputs and checks that neither name nor version is empty
    pub fn normalized(self) -> Result<Self, String> {
        let project_name = self.project_name.trim().to_string();
        let version = self.version.trim().to_string();

        if project_name.is_empty() {
            return Err("project_name must not be empty".to_string());
        }
        if version.is_empty() {
            return Err("version must not be empty".to_string());
        }

        Ok(Self {
            project_name,
            version,
            ..self
        })
    }
}

const RELEASE_COLUMNS: &str = "id, project_name, version, status, owner_id, created_at, updated_at";

impl Release {
    /// Inserts a new release
    ///
    /// Callers are expected to pass a [`CreateRelease::normalized`] value; the
    /// table's CHECK constraints reject empty strings regardless. The insert
    /// holds the same pair lock as [`Release::create_if_absent`].
    pub async fn create(pool: &PgPool, data: CreateRelease) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;
        Self::lock_pair(&mut tx, &data.project_name, &data.version).await?;

        let release = Self::insert(&mut tx, data).await?;

        tx.commit().await?;
        Ok(release)
    }

    /// Takes the transaction-scoped advisory lock for a (project, version) pair
    ///
    /// Released when the surrounding transaction commits or rolls back.
    pub async fn lock_pair(
        conn: &mut PgConnection,
        project_name: &str,
        version: &str,
    ) -> Result<(), sqlx::Error> {
        let lock_key = format!("{}\u{0}{}", project_name, version);
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(&lock_key)
            .execute(conn)
            .await?;

        Ok(())
    }

    async fn insert(conn: &mut PgConnection, data: CreateRelease) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Release>(&format!(
            r#"
            INSERT INTO releases (project_name, version, status, owner_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {RELEASE_COLUMNS}
            "#
        ))
        .bind(data.project_name)
        .bind(data.version)
        .bind(data.status)
        .bind(data.owner_id)
        .fetch_one(conn)
        .await
    }

    /// Finds a release by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let release = sqlx::query_as::<_, Release>(&format!(
            "SELECT {RELEASE_COLUMNS} FROM releases WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(release)
    }

    /// Finds the oldest release recorded for a (project, version) pair
    pub async fn find_by_project_and_version(
        pool: &PgPool,
        project_name: &str,
        version: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let release = sqlx::query_as::<_, Release>(&format!(
            r#"
            SELECT {RELEASE_COLUMNS}
            FROM releases
            WHERE project_name = $1 AND version = $2
            ORDER BY created_at ASC
            LIMIT 1
            "#
        ))
        .bind(project_name)
        .bind(version)
        .fetch_optional(pool)
        .await?;

        Ok(release)
    }

    /// Creates a release unless one already exists for the same pair
    ///
    /// The lookup and the insert run in one transaction holding
    /// `pg_advisory_xact_lock` on a hash of the pair, so concurrent callers for
    /// the same pair are serialized and exactly one of them inserts.
    ///
    /// # Returns
    ///
    /// `(release, true)` when a new row was inserted, `(existing, false)` otherwise
    pub async fn create_if_absent(
        pool: &PgPool,
        data: CreateRelease,
    ) -> Result<(Self, bool), sqlx::Error> {
        let mut tx = pool.begin().await?;

        Self::lock_pair(&mut tx, &data.project_name, &data.version).await?;

        let existing = sqlx::query_as::<_, Release>(&format!(
            r#"
            SELECT {RELEASE_COLUMNS}
            FROM releases
            WHERE project_name = $1 AND version = $2
            ORDER BY created_at ASC
            LIMIT 1
            "#
        ))
        .bind(&data.project_name)
        .bind(&data.version)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(release) = existing {
            tx.commit().await?;
            return Ok((release, false));
        }

        let created = Self::insert(&mut tx, data).await?;

        tx.commit().await?;
        Ok((created, true))
    }

    /// Lists every release, newest first
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let releases = sqlx::query_as::<_, Release>(&format!(
            "SELECT {RELEASE_COLUMNS} FROM releases ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await?;

        Ok(releases)
    }

    /// Lists releases owned by a user, newest first
    pub async fn list_by_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let releases = sqlx::query_as::<_, Release>(&format!(
            "SELECT {RELEASE_COLUMNS} FROM releases WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

        Ok(releases)
    }

    /// Sets the status of a release
    ///
    /// No transition table is consulted: every status is reachable from every other.
    ///
    /// # Returns
    ///
    /// The updated release, or None if it doesn't exist
    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        status: ReleaseStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let release = sqlx::query_as::<_, Release>(&format!(
            r#"
            UPDATE releases
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {RELEASE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(pool)
        .await?;

        Ok(release)
    }

    /// Deletes a release
    ///
    /// # Returns
    ///
    /// True if a row was deleted, false if the release didn't exist
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM releases WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
