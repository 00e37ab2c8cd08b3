/// Scan orchestration
///
/// Drives one scan: parse the manifest, resolve every declared package, and
/// assemble one [`ScanResultRow`] per package in manifest order.
///
/// Scans are read-only. Nothing is stored between a scan and the import that
/// may follow it; the caller holds the rows and sends back the ones it wants.
///
/// # Example
///
/// ```no_run
/// use reltrack_shared::manifest::ManifestFormat;
/// use reltrack_shared::registry::{PypiClient, RegistryResolver, ResolverConfig};
/// use reltrack_shared::scan::ScanOrchestrator;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = PypiClient::new("https://pypi.org", Duration::from_secs(10))?;
/// let scanner = ScanOrchestrator::new(RegistryResolver::new(Arc::new(client), ResolverConfig::default()));
///
/// let rows = scanner.scan(b"requests==2.31.0\n", ManifestFormat::Requirements).await?;
/// for row in rows {
///     println!("{} {} -> {:?}", row.name, row.spec, row.latest_version);
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::manifest::{self, Dependency, ManifestError, ManifestFormat};
use crate::registry::{LookupStatus, RegistryResolver, Resolution, ResolveError};

/// Error type for a scan as a whole
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The upload couldn't be parsed
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The registry was unreachable for every package
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// One package found in a manifest, with whatever the registry said about it
///
/// Resolved fields are `None` when the lookup failed; `lookup` says why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResultRow {
    /// Package name as written in the manifest
    pub name: String,

    /// Version specifier as written in the manifest
    #[serde(default)]
    pub spec: String,

    #[serde(default)]
    pub latest_version: Option<String>,

    #[serde(default)]
    pub release_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub repo_url: Option<String>,

    #[serde(default)]
    pub index_url: Option<String>,

    #[serde(default)]
    pub homepage: Option<String>,

    /// How the lookup went
    #[serde(default)]
    pub lookup: LookupStatus,
}

impl ScanResultRow {
    /// Builds a row from a dependency and its resolution
    pub fn new(dependency: Dependency, resolution: Resolution) -> Self {
        let lookup = resolution.status();
        let metadata = resolution.into_metadata();

        Self {
            name: dependency.name,
            spec: dependency.spec,
            latest_version: metadata.as_ref().map(|m| m.latest_version.clone()),
            release_date: metadata.as_ref().and_then(|m| m.release_date),
            repo_url: metadata.as_ref().and_then(|m| m.repo_url.clone()),
            index_url: metadata.as_ref().and_then(|m| m.index_url.clone()),
            homepage: metadata.and_then(|m| m.homepage),
            lookup,
        }
    }
}

/// Parser → resolver pipeline
#[derive(Clone)]
pub struct ScanOrchestrator {
    resolver: RegistryResolver,
}

impl ScanOrchestrator {
    /// Creates an orchestrator
    pub fn new(resolver: RegistryResolver) -> Self {
        Self { resolver }
    }

    /// Scans manifest bytes in a known format
    ///
    /// Returns one row per distinct package, in manifest order, regardless of
    /// the order lookups complete in or how many of them fail.
    ///
    /// # Errors
    ///
    /// - `ScanError::Manifest` if the bytes can't be parsed
    /// - `ScanError::Resolve` if the registry was unreachable for every package
    pub async fn scan(&self, bytes: &[u8], format: ManifestFormat) -> Result<Vec<ScanResultRow>, ScanError> {
        let dependencies: Vec<Dependency> = manifest::parse(bytes, format)?.collect();
        let names = dependencies.iter().map(|d| d.name.clone()).collect();

        let mut resolved = self.resolver.resolve_many(names).await?;

        let rows: Vec<ScanResultRow> = dependencies
            .into_iter()
            .map(|dependency| {
                let resolution = resolved
                    .remove(&dependency.name)
                    .unwrap_or_else(|| Resolution::Failed("no lookup result".to_string()));
                ScanResultRow::new(dependency, resolution)
            })
            .collect();

        info!(
            format = %format,
            packages = rows.len(),
            resolved = rows.iter().filter(|r| r.lookup == LookupStatus::Resolved).count(),
            "Scan complete"
        );

        Ok(rows)
    }

    /// Scans an upload, detecting its format from filename or content type
    ///
    /// # Errors
    ///
    /// As [`scan`](Self::scan), plus `UnsupportedFormat` when the format
    /// can't be determined
    pub async fn scan_upload(
        &self,
        bytes: &[u8],
        filename: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<Vec<ScanResultRow>, ScanError> {
        let format = ManifestFormat::detect(filename, content_type)?;
        self.scan(bytes, format).await
    }
}
