/// Reconciliation and bulk import
///
/// Materializes selected scan rows into releases. Each row is reconciled
/// against the store on its own:
///
/// ```text
/// row ──> version = latest_version | spec without operator | "unknown"
///     ├─ blank name ─────────────────────────> Failed
///     ├─ (name, version) already tracked ────> Skipped
///     ├─ store error ────────────────────────> Failed
///     └─ otherwise, created with target status > Created
/// ```
///
/// Rows are processed in selection order and the import is best-effort: a
/// failed row never undoes the rows before it. Re-importing the same
/// selection skips every row.
///
/// # Example
///
/// ```no_run
/// use reltrack_shared::import::Importer;
/// use reltrack_shared::models::release::ReleaseStatus;
/// # use reltrack_shared::auth::authorization::Principal;
/// # use reltrack_shared::scan::ScanResultRow;
/// # use reltrack_shared::store::MemoryStore;
/// # use std::sync::Arc;
///
/// # async fn example(admin: Principal, rows: Vec<ScanResultRow>) -> Result<(), Box<dyn std::error::Error>> {
/// let importer = Importer::new(Arc::new(MemoryStore::new()));
/// let report = importer.import_selected(&rows, ReleaseStatus::Planned, &admin).await?;
/// println!("created {} releases", report.created().len());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::authorization::{require, AuthzError, Capability, Principal};
use crate::models::release::{CreateRelease, Release, ReleaseStatus};
use crate::scan::ScanResultRow;
use crate::store::ReleaseStore;

/// Version recorded when neither the registry nor the manifest gives one
pub const UNKNOWN_VERSION: &str = "unknown";

/// Error type for an import call
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Caller may not import
    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    /// Nothing was selected
    #[error("No rows selected for import")]
    EmptySelection,

    /// Some rows failed; the report says which
    #[error("{} of {} rows failed to import", .0.failed_count(), .0.rows.len())]
    PartialImport(ImportReport),
}

/// Body of an import request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    /// Selected rows, in the order they should be processed
    pub rows: Vec<ScanResultRow>,

    /// Status given to every created release
    #[serde(default)]
    pub status: ReleaseStatus,
}

/// What happened to one row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ImportOutcome {
    /// A new release was recorded
    Created(Release),

    /// The pair was already tracked
    Skipped(Release),

    /// The row couldn't be imported
    Failed(String),
}

/// One processed row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowReport {
    /// Package name from the row
    pub name: String,

    /// Version the row was reconciled under
    pub version: String,

    #[serde(flatten)]
    pub outcome: ImportOutcome,
}

/// Per-row results of an import, in selection order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub rows: Vec<RowReport>,
}

impl ImportReport {
    /// Newly created releases
    pub fn created(&self) -> Vec<&Release> {
        self.rows
            .iter()
            .filter_map(|r| match &r.outcome {
                ImportOutcome::Created(release) => Some(release),
                _ => None,
            })
            .collect()
    }

    /// Number of rows skipped as already tracked
    pub fn skipped_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r.outcome, ImportOutcome::Skipped(_)))
            .count()
    }

    /// Number of rows that failed
    pub fn failed_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r.outcome, ImportOutcome::Failed(_)))
            .count()
    }

    /// `Ok(self)` when no row failed, otherwise `PartialImport`
    pub fn into_result(self) -> Result<Self, ImportError> {
        if self.failed_count() == 0 {
            Ok(self)
        } else {
            Err(ImportError::PartialImport(self))
        }
    }
}

/// Picks the version a row is imported under
///
/// The resolved latest version wins. Otherwise the manifest specifier's first
/// clause is used without its comparison operator (`==1.0` → `1.0`,
/// `>=2.0,<3` → `2.0`). Failing both, [`UNKNOWN_VERSION`].
pub fn import_version(row: &ScanResultRow) -> String {
    if let Some(latest) = row.latest_version.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        return latest.to_string();
    }

    let from_spec = row
        .spec
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches(|c: char| matches!(c, '=' | '<' | '>' | '!' | '~' | '^') || c.is_whitespace());

    if from_spec.is_empty() || from_spec == "*" {
        UNKNOWN_VERSION.to_string()
    } else {
        from_spec.to_string()
    }
}

/// Imports scan rows into a release store
#[derive(Clone)]
pub struct Importer {
    store: Arc<dyn ReleaseStore>,
}

impl Importer {
    /// Creates an importer over a store
    pub fn new(store: Arc<dyn ReleaseStore>) -> Self {
        Self { store }
    }

    async fn import_row(&self, row: &ScanResultRow, status: ReleaseStatus, principal: &Principal) -> RowReport {
        let name = row.name.trim().to_string();
        let version = import_version(row);

        if name.is_empty() {
            return RowReport {
                name,
                version,
                outcome: ImportOutcome::Failed("package name is empty".to_string()),
            };
        }

        let data = CreateRelease {
            project_name: name.clone(),
            version: version.clone(),
            status,
            owner_id: Some(principal.user_id),
        };

        let outcome = match self.store.create_if_absent(data).await {
            Ok((release, true)) => ImportOutcome::Created(release),
            Ok((existing, false)) => ImportOutcome::Skipped(existing),
            Err(e) => {
                warn!(package = %name, version = %version, error = %e, "Import row failed");
                ImportOutcome::Failed(e.to_string())
            }
        };

        RowReport { name, version, outcome }
    }

    /// Imports the selected rows
    ///
    /// The capability check comes first, so a non-admin is refused whatever
    /// the selection holds.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the principal may import
    /// - `EmptySelection` if `rows` is empty; the store is not touched
    ///
    /// Row failures are reported in the returned [`ImportReport`]; use
    /// [`ImportReport::into_result`] to treat them as an error.
    pub async fn import_selected(
        &self,
        rows: &[ScanResultRow],
        target_status: ReleaseStatus,
        principal: &Principal,
    ) -> Result<ImportReport, ImportError> {
        require(principal, Capability::ImportReleases)?;

        if rows.is_empty() {
            return Err(ImportError::EmptySelection);
        }

        let mut reports = Vec::with_capacity(rows.len());
        for row in rows {
            reports.push(self.import_row(row, target_status, principal).await);
        }

        let report = ImportReport { rows: reports };
        info!(
            selected = rows.len(),
            created = report.created().len(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            status = %target_status,
            by = %principal.user_id,
            "Import finished"
        );

        Ok(report)
    }
}
