/// Concurrent registry resolution
///
/// Resolves a batch of package names through a [`RegistryLookup`] with:
///
/// - **Bounded concurrency**: at most `max_concurrency` lookups in flight
/// - **Per-name deadline**: a lookup exceeding `lookup_timeout` becomes
///   [`Resolution::TimedOut`] for that name only
/// - **Detached lookups**: each lookup runs in its own task; if the caller
///   stops waiting, dispatched lookups still finish and their results are
///   dropped
///
/// Per-name failures are values, not errors. The batch fails only with
/// [`ResolveError::Systemic`], when every lookup in a non-empty batch found
/// the registry unreachable.
///
/// # Example
///
/// ```no_run
/// use reltrack_shared::registry::{PypiClient, RegistryResolver, ResolverConfig};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = PypiClient::new("https://pypi.org", Duration::from_secs(10))?;
/// let resolver = RegistryResolver::new(Arc::new(client), ResolverConfig::default());
///
/// let resolved = resolver.resolve_many(vec!["requests".to_string(), "flask".to_string()]).await?;
/// for (name, resolution) in &resolved {
///     println!("{}: {}", name, resolution.status());
/// }
/// # Ok(())
/// # }
/// ```

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{LookupError, PackageMetadata, RegistryLookup};

/// Default number of concurrent lookups
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Default per-lookup deadline
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolver tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Maximum lookups in flight (values below 1 are treated as 1)
    pub max_concurrency: usize,

    /// Deadline for each individual lookup
    pub lookup_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

/// Outcome of resolving one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Metadata found
    Resolved(PackageMetadata),

    /// Registry has no such package
    NotFound,

    /// Lookup exceeded its deadline
    TimedOut,

    /// Registry couldn't be reached for this lookup
    Unreachable(String),

    /// Lookup failed for another reason (bad response, task failure)
    Failed(String),
}

/// Lookup status label shown next to a scan row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStatus {
    Resolved,
    NotFound,
    TimedOut,
    #[default]
    Unavailable,
}

impl Resolution {
    /// Gets the metadata if resolution succeeded
    pub fn metadata(&self) -> Option<&PackageMetadata> {
        match self {
            Resolution::Resolved(metadata) => Some(metadata),
            _ => None,
        }
    }

    /// Consumes the resolution, returning metadata if it succeeded
    pub fn into_metadata(self) -> Option<PackageMetadata> {
        match self {
            Resolution::Resolved(metadata) => Some(metadata),
            _ => None,
        }
    }

    /// Coarse status for display
    pub fn status(&self) -> LookupStatus {
        match self {
            Resolution::Resolved(_) => LookupStatus::Resolved,
            Resolution::NotFound => LookupStatus::NotFound,
            Resolution::TimedOut => LookupStatus::TimedOut,
            Resolution::Unreachable(_) | Resolution::Failed(_) => LookupStatus::Unavailable,
        }
    }
}

impl std::fmt::Display for LookupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LookupStatus::Resolved => "resolved",
            LookupStatus::NotFound => "not_found",
            LookupStatus::TimedOut => "timed_out",
            LookupStatus::Unavailable => "unavailable",
        };
        f.write_str(label)
    }
}

impl From<LookupError> for Resolution {
    fn from(error: LookupError) -> Self {
        match error {
            LookupError::NotFound(_) => Resolution::NotFound,
            LookupError::Unreachable(reason) => Resolution::Unreachable(reason),
            LookupError::TimedOut(_) => Resolution::TimedOut,
            LookupError::InvalidResponse(reason) => Resolution::Failed(reason),
        }
    }
}

/// Batch-level resolution failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Every lookup in the batch found the registry unreachable
    #[error("Registry unreachable for all {attempted} lookups: {reason}")]
    Systemic { attempted: usize, reason: String },
}

/// Resolves package names concurrently
#[derive(Clone)]
pub struct RegistryResolver {
    lookup: Arc<dyn RegistryLookup>,
    config: ResolverConfig,
}

impl RegistryResolver {
    /// Creates a resolver over a lookup capability
    pub fn new(lookup: Arc<dyn RegistryLookup>, config: ResolverConfig) -> Self {
        Self { lookup, config }
    }

    /// Gets the configuration
    pub fn config(&self) -> ResolverConfig {
        self.config
    }

    async fn resolve_one(
        lookup: Arc<dyn RegistryLookup>,
        name: String,
        deadline: Duration,
    ) -> (String, Resolution) {
        let package = name.clone();
        let task = tokio::spawn(async move {
            tokio::time::timeout(deadline, lookup.lookup(&package)).await
        });

        let resolution = match task.await {
            Ok(Ok(Ok(metadata))) => Resolution::Resolved(metadata),
            Ok(Ok(Err(error))) => Resolution::from(error),
            Ok(Err(_elapsed)) => Resolution::TimedOut,
            Err(join_error) => Resolution::Failed(format!("lookup task failed: {}", join_error)),
        };

        debug!(package = %name, status = %resolution.status(), "Lookup finished");
        (name, resolution)
    }

    /// Resolves every distinct name in `names`
    ///
    /// The returned map has exactly one entry per distinct input name, however
    /// many lookups failed.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Systemic` when the batch is non-empty and every
    /// lookup reported the registry unreachable
    pub async fn resolve_many(
        &self,
        names: Vec<String>,
    ) -> Result<HashMap<String, Resolution>, ResolveError> {
        let mut seen = HashSet::new();
        let unique: Vec<String> = names.into_iter().filter(|n| seen.insert(n.clone())).collect();

        if unique.is_empty() {
            return Ok(HashMap::new());
        }

        let attempted = unique.len();
        let deadline = self.config.lookup_timeout;
        let cap = self.config.max_concurrency.max(1);

        info!(
            registry = self.lookup.name(),
            packages = attempted,
            max_concurrency = cap,
            timeout_ms = deadline.as_millis() as u64,
            "Resolving packages"
        );

        let resolved: HashMap<String, Resolution> = stream::iter(unique)
            .map(|name| Self::resolve_one(Arc::clone(&self.lookup), name, deadline))
            .buffer_unordered(cap)
            .collect()
            .await;

        let unreachable: Vec<&String> = resolved
            .values()
            .filter_map(|r| match r {
                Resolution::Unreachable(reason) => Some(reason),
                _ => None,
            })
            .collect();

        if unreachable.len() == attempted {
            let reason = unreachable
                .first()
                .map(|r| r.to_string())
                .unwrap_or_default();
            warn!(packages = attempted, reason = %reason, "Registry unreachable for every lookup");
            return Err(ResolveError::Systemic { attempted, reason });
        }

        let succeeded = resolved.values().filter(|r| r.metadata().is_some()).count();
        info!(
            packages = attempted,
            resolved = succeeded,
            soft_failures = attempted - succeeded,
            "Resolution complete"
        );

        Ok(resolved)
    }
}
