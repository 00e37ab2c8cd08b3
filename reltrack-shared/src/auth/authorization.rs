/// Capability checks
///
/// Every action in the system is described by a [`Capability`] and decided by
/// one function, [`permits`]. Handlers and services never compare roles
/// directly; they ask whether the [`Principal`] holds the capability.
///
/// # Permission Model
///
/// | Capability | Who |
/// |---|---|
/// | `ListReleases`, `Scan` | any authenticated principal |
/// | `CreateRelease`, `ImportReleases`, `ManageUsers` | admin |
/// | `ModifyRelease { owner }` | the owner, or an admin |
///
/// # Example
///
/// ```
/// use reltrack_shared::auth::authorization::{permits, require, Capability, Principal};
/// use reltrack_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// let alice = Principal::new(Uuid::new_v4(), "alice@example.com", UserRole::User);
///
/// assert!(permits(&alice, Capability::Scan));
/// assert!(permits(&alice, Capability::ModifyRelease { owner: Some(alice.user_id) }));
/// assert!(require(&alice, Capability::ImportReleases).is_err());
/// ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserRole;

/// Authenticated caller, as established by the capability gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// User ID
    pub user_id: Uuid,

    /// Email address
    pub email: String,

    /// Role as currently stored for the user
    pub role: UserRole,
}

impl Principal {
    /// Creates a principal
    pub fn new(user_id: Uuid, email: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id,
            email: email.into(),
            role,
        }
    }

    /// Checks if the principal is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Something a principal may or may not be allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// List releases (scoped to the caller unless admin)
    ListReleases,

    /// Upload a manifest and resolve it
    Scan,

    /// Create a release by hand
    CreateRelease,

    /// Materialize scan rows into releases
    ImportReleases,

    /// List and delete user accounts
    ManageUsers,

    /// Change the status of, or delete, a release with the given owner
    ModifyRelease { owner: Option<Uuid> },
}

impl Capability {
    /// Short name used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Capability::ListReleases => "list_releases",
            Capability::Scan => "scan",
            Capability::CreateRelease => "create_release",
            Capability::ImportReleases => "import_releases",
            Capability::ManageUsers => "manage_users",
            Capability::ModifyRelease { .. } => "modify_release",
        }
    }
}

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Principal lacks the capability
    #[error("Not permitted to {}", .0.name())]
    Forbidden(Capability),
}

/// Decides whether `principal` holds `capability`
pub fn permits(principal: &Principal, capability: Capability) -> bool {
    if principal.is_admin() {
        return true;
    }

    match capability {
        Capability::ListReleases | Capability::Scan => true,
        Capability::CreateRelease | Capability::ImportReleases | Capability::ManageUsers => false,
        Capability::ModifyRelease { owner } => owner == Some(principal.user_id),
    }
}

/// Like [`permits`], but turns a refusal into [`AuthzError::Forbidden`]
///
/// # Errors
///
/// Returns `AuthzError::Forbidden` carrying the refused capability
pub fn require(principal: &Principal, capability: Capability) -> Result<(), AuthzError> {
    if permits(principal, capability) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(capability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Principal {
        Principal::new(Uuid::new_v4(), "user@example.com", UserRole::User)
    }

    fn admin() -> Principal {
        Principal::new(Uuid::new_v4(), "admin@example.com", UserRole::Admin)
    }

    #[test]
    fn test_admin_holds_every_capability() {
        let admin = admin();
        let stranger = Some(Uuid::new_v4());

        for capability in [
            Capability::ListReleases,
            Capability::Scan,
            Capability::CreateRelease,
            Capability::ImportReleases,
            Capability::ManageUsers,
            Capability::ModifyRelease { owner: stranger },
            Capability::ModifyRelease { owner: None },
        ] {
            assert!(permits(&admin, capability), "admin denied {:?}", capability);
        }
    }

    #[test]
    fn test_user_capabilities() {
        let user = user();

        assert!(permits(&user, Capability::ListReleases));
        assert!(permits(&user, Capability::Scan));
        assert!(!permits(&user, Capability::CreateRelease));
        assert!(!permits(&user, Capability::ImportReleases));
        assert!(!permits(&user, Capability::ManageUsers));
    }

    #[test]
    fn test_modify_release_requires_ownership() {
        let user = user();

        assert!(permits(&user, Capability::ModifyRelease { owner: Some(user.user_id) }));
        assert!(!permits(&user, Capability::ModifyRelease { owner: Some(Uuid::new_v4()) }));
        assert!(!permits(&user, Capability::ModifyRelease { owner: None }));
    }

    #[test]
    fn test_require() {
        let user = user();

        assert!(require(&user, Capability::Scan).is_ok());
        assert_eq!(
            require(&user, Capability::ImportReleases),
            Err(AuthzError::Forbidden(Capability::ImportReleases))
        );
        assert_eq!(
            AuthzError::Forbidden(Capability::ImportReleases).to_string(),
            "Not permitted to import_releases"
        );
    }
}
