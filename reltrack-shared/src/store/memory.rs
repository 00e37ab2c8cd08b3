/// In-memory stores
///
/// Used by tests and by the server when no `DATABASE_URL` is configured. State
/// lives behind one `tokio::sync::RwLock`; [`ReleaseStore::create_if_absent`]
/// holds the write lock across its lookup and insert, which is what makes it
/// atomic per (project, version) pair. Deleting a user clears the owner of
/// their releases, matching the `ON DELETE SET NULL` foreign key.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{normalize_release, ReleaseStore, StoreError, StoreResult, UserStore};
use crate::models::release::{CreateRelease, Release, ReleaseStatus};
use crate::models::user::{normalize_email, CreateUser, User};

#[derive(Debug, Default)]
struct State {
    /// Insertion order is creation order
    users: Vec<User>,
    releases: Vec<Release>,
}

impl State {
    fn oldest_release_for(&self, project_name: &str, version: &str) -> Option<&Release> {
        self.releases
            .iter()
            .find(|r| r.matches(project_name, version))
    }

    fn insert_release(&mut self, data: CreateRelease) -> Release {
        let now = Utc::now();
        let release = Release {
            id: Uuid::new_v4(),
            project_name: data.project_name,
            version: data.version,
            status: data.status,
            owner_id: data.owner_id,
            created_at: now,
            updated_at: now,
        };

        self.releases.push(release.clone());
        release
    }
}

/// Process-local store implementing both [`ReleaseStore`] and [`UserStore`]
///
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of releases held
    pub async fn release_count(&self) -> usize {
        self.state.read().await.releases.len()
    }
}

#[async_trait]
impl ReleaseStore for MemoryStore {
    async fn create(&self, data: CreateRelease) -> StoreResult<Release> {
        let data = normalize_release(data)?;
        Ok(self.state.write().await.insert_release(data))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Release>> {
        let state = self.state.read().await;
        Ok(state.releases.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_project_and_version(
        &self,
        project_name: &str,
        version: &str,
    ) -> StoreResult<Option<Release>> {
        let state = self.state.read().await;
        Ok(state.oldest_release_for(project_name, version).cloned())
    }

    async fn create_if_absent(&self, data: CreateRelease) -> StoreResult<(Release, bool)> {
        let data = normalize_release(data)?;
        let mut state = self.state.write().await;

        if let Some(existing) = state.oldest_release_for(&data.project_name, &data.version) {
            return Ok((existing.clone(), false));
        }

        Ok((state.insert_release(data), true))
    }

    async fn list_all(&self) -> StoreResult<Vec<Release>> {
        let state = self.state.read().await;
        Ok(state.releases.iter().rev().cloned().collect())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Release>> {
        let state = self.state.read().await;
        Ok(state
            .releases
            .iter()
            .rev()
            .filter(|r| r.owner_id == Some(owner_id))
            .cloned()
            .collect())
    }

    async fn update_status(&self, id: Uuid, status: ReleaseStatus) -> StoreResult<Option<Release>> {
        let mut state = self.state.write().await;

        Ok(state.releases.iter_mut().find(|r| r.id == id).map(|release| {
            release.status = status;
            release.updated_at = Utc::now();
            release.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let before = state.releases.len();
        state.releases.retain(|r| r.id != id);
        Ok(state.releases.len() < before)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, data: CreateUser) -> StoreResult<User> {
        let email = normalize_email(&data.email);
        let mut state = self.state.write().await;

        if state.users.iter().any(|u| u.email == email) {
            return Err(StoreError::Conflict(format!("Email already registered: {}", email)));
        }

        let user = User {
            id: Uuid::new_v4(),
            name: data.name.trim().to_string(),
            email,
            password_hash: data.password_hash,
            role: data.role,
            created_at: Utc::now(),
        };

        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = normalize_email(email);
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let before = state.users.len();
        state.users.retain(|u| u.id != id);

        if state.users.len() == before {
            return Ok(false);
        }

        for release in state.releases.iter_mut().filter(|r| r.owner_id == Some(id)) {
            release.owner_id = None;
        }
        Ok(true)
    }
}
