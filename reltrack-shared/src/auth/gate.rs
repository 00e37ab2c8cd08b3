/// Capability gate
///
/// Turns a bearer token into a [`Principal`], optionally demanding a role.
/// The gate is the only place tokens are interpreted; everything downstream
/// works with the principal it returns.
///
/// A token is accepted only if:
///
/// 1. it is present, well-formed, correctly signed and unexpired
/// 2. the user it names still exists
/// 3. the role embedded in it equals the user's stored role
///
/// Any failure there is [`GateError::Unauthenticated`]. If a role is required
/// and the stored role doesn't satisfy it, the result is [`GateError::Forbidden`].
/// Authorization has no side effects.
///
/// # Example
///
/// ```no_run
/// use reltrack_shared::auth::gate::CapabilityGate;
/// use reltrack_shared::models::user::UserRole;
/// use reltrack_shared::store::MemoryStore;
/// use std::sync::Arc;
///
/// # async fn example(token: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let gate = CapabilityGate::new("a-secret-of-at-least-thirty-two-bytes", Arc::new(MemoryStore::new()));
///
/// let principal = gate.authorize(Some(token), Some(UserRole::Admin)).await?;
/// println!("{} is an admin", principal.email);
/// # Ok(())
/// # }
/// ```

use chrono::Duration;
use std::sync::Arc;
use tracing::debug;

use super::authorization::Principal;
use super::jwt::{create_token, validate_token, Claims, JwtError, DEFAULT_EXPIRATION_SECS};
use crate::models::user::{User, UserRole};
use crate::store::{StoreError, UserStore};

/// Error type for the capability gate
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// No usable session
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Session is valid but the role is insufficient
    #[error("Forbidden: requires role {required}")]
    Forbidden { required: UserRole },

    /// Token could not be signed
    #[error("Failed to issue token: {0}")]
    Issue(#[from] JwtError),

    /// User lookup failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Validates sessions and checks roles
#[derive(Clone)]
pub struct CapabilityGate {
    secret: String,
    expiration: Duration,
    users: Arc<dyn UserStore>,
}

impl CapabilityGate {
    /// Creates a gate with the default token lifetime
    pub fn new(secret: impl Into<String>, users: Arc<dyn UserStore>) -> Self {
        Self {
            secret: secret.into(),
            expiration: Duration::seconds(DEFAULT_EXPIRATION_SECS),
            users,
        }
    }

    /// Overrides the lifetime of issued tokens
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    /// Issues a session token for a user
    pub fn issue(&self, user: &User) -> Result<String, GateError> {
        let claims = Claims::with_expiration(user.id, user.email.clone(), user.role, self.expiration);
        Ok(create_token(&claims, &self.secret)?)
    }

    /// Validates a token and, if given, checks the required role
    ///
    /// The returned principal carries the role as stored now, not as embedded
    /// in the token (the two must be equal for the token to be accepted).
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` for a missing, invalid or stale token
    /// - `Forbidden` when `required` isn't satisfied
    /// - `Store` if the user lookup itself fails
    pub async fn authorize(
        &self,
        token: Option<&str>,
        required: Option<UserRole>,
    ) -> Result<Principal, GateError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GateError::Unauthenticated("Missing token".to_string()))?;

        let claims = validate_token(token, &self.secret).map_err(|e| {
            debug!(error = %e, "Token rejected");
            match e {
                JwtError::Expired => GateError::Unauthenticated("Token has expired".to_string()),
                _ => GateError::Unauthenticated("Invalid token".to_string()),
            }
        })?;

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| {
                debug!(user_id = %claims.sub, "Token names a user that no longer exists");
                GateError::Unauthenticated("User no longer exists".to_string())
            })?;

        if user.role != claims.role {
            debug!(
                user_id = %user.id,
                token_role = %claims.role,
                stored_role = %user.role,
                "Token role is stale"
            );
            return Err(GateError::Unauthenticated("Token role is stale".to_string()));
        }

        if let Some(required) = required {
            if !user.role.satisfies(required) {
                return Err(GateError::Forbidden { required });
            }
        }

        Ok(Principal::new(user.id, user.email, user.role))
    }
}
