/// Package registry lookups
///
/// # Architecture
///
/// ```text
/// RegistryResolver ──(bounded fan-out, per-name timeout)──> dyn RegistryLookup
///                                                              ├─ PypiClient (HTTP)
///                                                              └─ test doubles
/// ```
///
/// A [`RegistryLookup`] answers one question for one package: what is the
/// latest version, when was it published and where does its source live.
/// The [`RegistryResolver`] runs many lookups at once and classifies each
/// outcome, so one slow or unknown package never fails a whole scan.

pub mod pypi;
pub mod resolver;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use pypi::PypiClient;
pub use resolver::{LookupStatus, RegistryResolver, Resolution, ResolveError, ResolverConfig};

/// Error type for a single registry lookup
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// Registry answered, and the package doesn't exist
    #[error("Package not found: {0}")]
    NotFound(String),

    /// Registry could not be reached or failed server-side
    #[error("Registry unreachable: {0}")]
    Unreachable(String),

    /// Request to the registry ran out of time
    #[error("Registry request timed out: {0}")]
    TimedOut(String),

    /// Registry answered with something that isn't package metadata
    #[error("Invalid registry response: {0}")]
    InvalidResponse(String),
}

/// Metadata for the latest release of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Latest published version
    pub latest_version: String,

    /// Upload time of the latest version's first file
    pub release_date: Option<DateTime<Utc>>,

    /// Source repository URL
    pub repo_url: Option<String>,

    /// Package page on the registry
    pub index_url: Option<String>,

    /// Project homepage
    pub homepage: Option<String>,
}

/// Looks up one package in a registry
///
/// Implementations must be cheap to share across tasks; the resolver calls
/// them concurrently from spawned tasks.
#[async_trait]
pub trait RegistryLookup: Send + Sync {
    /// Short name of the registry, for logs
    fn name(&self) -> &str;

    /// Fetches metadata for `package`
    async fn lookup(&self, package: &str) -> Result<PackageMetadata, LookupError>;
}
