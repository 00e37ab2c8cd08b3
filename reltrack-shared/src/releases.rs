/// Release operations on behalf of a principal
///
/// Wraps a [`ReleaseStore`] with the capability checks every release
/// operation needs. Handlers call this service rather than the store.
///
/// | Operation | Capability | Failure |
/// |---|---|---|
/// | [`create`](ReleaseService::create) | `CreateRelease` (admin) | `Forbidden`, `Invalid` |
/// | [`list`](ReleaseService::list) | `ListReleases` | - |
/// | [`update_status`](ReleaseService::update_status) | `ModifyRelease` (owner or admin) | `NotFound`, `Forbidden` |
/// | [`delete`](ReleaseService::delete) | `ModifyRelease` (owner or admin) | `NotFound`, `Forbidden` |
///
/// Admins see every release; everyone else sees only releases they own.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::authorization::{require, AuthzError, Capability, Principal};
use crate::models::release::{CreateRelease, Release, ReleaseStatus};
use crate::store::{ReleaseStore, StoreError};

/// Error type for release operations
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    /// No release with this ID
    #[error("Release not found: {0}")]
    NotFound(Uuid),

    /// Caller lacks the capability
    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    /// Input rejected
    #[error("Invalid release: {0}")]
    Invalid(String),

    /// Storage failure
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ReleaseError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Validation(message) => ReleaseError::Invalid(message),
            other => ReleaseError::Store(other),
        }
    }
}

/// Capability-checked release operations
#[derive(Clone)]
pub struct ReleaseService {
    store: Arc<dyn ReleaseStore>,
}

impl ReleaseService {
    /// Creates the service over a store
    pub fn new(store: Arc<dyn ReleaseStore>) -> Self {
        Self { store }
    }

    /// Gets the underlying store
    pub fn store(&self) -> &Arc<dyn ReleaseStore> {
        &self.store
    }

    /// Records a release by hand
    ///
    /// Without an explicit owner the release belongs to the caller.
    pub async fn create(&self, principal: &Principal, data: CreateRelease) -> Result<Release, ReleaseError> {
        require(principal, Capability::CreateRelease)?;

        let data = CreateRelease {
            owner_id: data.owner_id.or(Some(principal.user_id)),
            ..data
        };
        let release = self.store.create(data).await?;

        info!(
            release_id = %release.id,
            project = %release.project_name,
            version = %release.version,
            created_by = %principal.user_id,
            "Release created"
        );
        Ok(release)
    }

    /// Lists releases visible to the caller, newest first
    pub async fn list(&self, principal: &Principal) -> Result<Vec<Release>, ReleaseError> {
        require(principal, Capability::ListReleases)?;

        let releases = if principal.is_admin() {
            self.store.list_all().await?
        } else {
            self.store.list_by_owner(principal.user_id).await?
        };
        Ok(releases)
    }

    async fn find_modifiable(&self, id: Uuid, principal: &Principal) -> Result<Release, ReleaseError> {
        let release = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(ReleaseError::NotFound(id))?;

        require(principal, Capability::ModifyRelease { owner: release.owner_id })?;
        Ok(release)
    }

    /// Moves a release to any status
    ///
    /// # Errors
    ///
    /// `NotFound` if the release doesn't exist (checked before ownership);
    /// `Forbidden` if the caller neither owns it nor is admin
    pub async fn update_status(
        &self,
        id: Uuid,
        status: ReleaseStatus,
        principal: &Principal,
    ) -> Result<Release, ReleaseError> {
        let current = self.find_modifiable(id, principal).await?;

        let updated = self
            .store
            .update_status(id, status)
            .await?
            .ok_or(ReleaseError::NotFound(id))?;

        info!(
            release_id = %id,
            from = %current.status,
            to = %updated.status,
            by = %principal.user_id,
            "Release status changed"
        );
        Ok(updated)
    }

    /// Deletes a release
    ///
    /// Deleting a missing release is an error, not a no-op.
    pub async fn delete(&self, id: Uuid, principal: &Principal) -> Result<(), ReleaseError> {
        self.find_modifiable(id, principal).await?;

        if !self.store.delete(id).await? {
            return Err(ReleaseError::NotFound(id));
        }

        info!(release_id = %id, by = %principal.user_id, "Release deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;
    use crate::store::MemoryStore;

    fn principal(role: UserRole) -> Principal {
        Principal::new(Uuid::new_v4(), "someone@example.com", role)
    }

    fn input(project: &str, owner_id: Option<Uuid>) -> CreateRelease {
        CreateRelease {
            project_name: project.to_string(),
            version: "1.0.0".to_string(),
            status: ReleaseStatus::Planned,
            owner_id,
        }
    }

    fn service() -> ReleaseService {
        ReleaseService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_create_requires_admin() {
        let service = service();

        let result = service.create(&principal(UserRole::User), input("alpha", None)).await;
        assert!(matches!(result, Err(ReleaseError::Forbidden(_))));

        let admin = principal(UserRole::Admin);
        let release = service.create(&admin, input("alpha", None)).await.unwrap();
        assert_eq!(release.owner_id, Some(admin.user_id));
    }

    #[tokio::test]
    async fn test_create_for_another_owner() {
        let service = service();
        let owner = Uuid::new_v4();

        let release = service
            .create(&principal(UserRole::Admin), input("alpha", Some(owner)))
            .await
            .unwrap();
        assert_eq!(release.owner_id, Some(owner));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_input() {
        let result = service()
            .create(&principal(UserRole::Admin), input("   ", None))
            .await;
        assert!(matches!(result, Err(ReleaseError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_list_is_scoped() {
        let service = service();
        let admin = principal(UserRole::Admin);
        let alice = principal(UserRole::User);

        service.create(&admin, input("mine", Some(alice.user_id))).await.unwrap();
        service.create(&admin, input("theirs", None)).await.unwrap();

        let visible = service.list(&alice).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].project_name, "mine");

        assert_eq!(service.list(&admin).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_status_not_found() {
        let result = service()
            .update_status(Uuid::new_v4(), ReleaseStatus::Released, &principal(UserRole::User))
            .await;
        assert!(matches!(result, Err(ReleaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_status_of_someone_elses_release_is_forbidden() {
        let service = service();
        let admin = principal(UserRole::Admin);
        let alice = principal(UserRole::User);
        let bob = principal(UserRole::User);

        let release = service.create(&admin, input("alpha", Some(alice.user_id))).await.unwrap();

        let result = service.update_status(release.id, ReleaseStatus::Released, &bob).await;
        assert!(matches!(result, Err(ReleaseError::Forbidden(_))));

        let updated = service
            .update_status(release.id, ReleaseStatus::Released, &alice)
            .await
            .unwrap();
        assert_eq!(updated.status, ReleaseStatus::Released);

        let updated = service
            .update_status(release.id, ReleaseStatus::Planned, &admin)
            .await
            .unwrap();
        assert_eq!(updated.status, ReleaseStatus::Planned);
    }

    #[tokio::test]
    async fn test_delete() {
        let service = service();
        let admin = principal(UserRole::Admin);
        let alice = principal(UserRole::User);
        let release = service.create(&admin, input("alpha", Some(alice.user_id))).await.unwrap();

        let result = service.delete(release.id, &principal(UserRole::User)).await;
        assert!(matches!(result, Err(ReleaseError::Forbidden(_))));

        service.delete(release.id, &alice).await.unwrap();

        let result = service.delete(release.id, &alice).await;
        assert!(matches!(result, Err(ReleaseError::NotFound(id)) if id == release.id));
    }
}
