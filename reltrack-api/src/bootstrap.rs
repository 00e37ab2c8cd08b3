/// Startup account provisioning
///
/// Registration never grants the admin role, so the first admin has to come
/// from configuration. [`ensure_admin`] is idempotent: it does nothing when
/// the email is already registered, whatever that account's role.

use crate::config::BootstrapAdmin;
use reltrack_shared::auth::password;
use reltrack_shared::models::user::{CreateUser, UserRole};
use reltrack_shared::store::{StoreError, UserStore};

/// Creates the configured admin unless the email is taken
///
/// Returns `true` when an account was created.
pub async fn ensure_admin(users: &dyn UserStore, admin: &BootstrapAdmin) -> anyhow::Result<bool> {
    if let Some(existing) = users.find_by_email(&admin.email).await? {
        if existing.role != UserRole::Admin {
            tracing::warn!(
                user_id = %existing.id,
                "Bootstrap admin email belongs to a non-admin account; leaving it unchanged"
            );
        }
        return Ok(false);
    }

    password::validate_password(&admin.password).map_err(|e| anyhow::anyhow!("BOOTSTRAP_ADMIN_PASSWORD: {}", e))?;
    let password_hash = password::hash_password(&admin.password)?;

    let created = users
        .create(CreateUser {
            name: admin.name.clone(),
            email: admin.email.clone(),
            password_hash,
            role: UserRole::Admin,
        })
        .await;

    match created {
        Ok(user) => {
            tracing::info!(user_id = %user.id, email = %user.email, "Bootstrap admin created");
            Ok(true)
        }
        // Another instance won the race
        Err(StoreError::Conflict(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}
