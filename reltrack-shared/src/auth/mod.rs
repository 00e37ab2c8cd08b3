/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and policy
/// - [`jwt`]: HS256 session tokens
/// - [`gate`]: token → principal, with optional role requirement
/// - [`authorization`]: the capability predicate every action goes through
///
/// # Example
///
/// ```no_run
/// use reltrack_shared::auth::authorization::{require, Capability};
/// use reltrack_shared::auth::gate::CapabilityGate;
///
/// # async fn example(gate: CapabilityGate, token: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let principal = gate.authorize(Some(token), None).await?;
/// require(&principal, Capability::ImportReleases)?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod gate;
pub mod jwt;
pub mod password;
