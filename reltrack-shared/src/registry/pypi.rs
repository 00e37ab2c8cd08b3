/// PyPI JSON API client
///
/// Fetches `GET {base}/pypi/{name}/json` and reduces the response to
/// [`PackageMetadata`].
///
/// # Field selection
///
/// - **Latest version**: `info.version`
/// - **Release date**: upload time of the first file of the latest version
///   (`upload_time_iso_8601`, falling back to the naive UTC `upload_time`)
/// - **Repository**: the first `info.project_urls` entry labelled Source,
///   Source Code, Repository, Code, Home or Homepage (case-insensitive);
///   otherwise the first entry pointing at GitHub, GitLab or Bitbucket
/// - **Homepage**: `info.home_page`, else the `Homepage` project URL
/// - **Index URL**: `{base}/project/{name}/`
///
/// # Status mapping
///
/// | Response | Result |
/// |---|---|
/// | 200 with metadata | `Ok` |
/// | 404 | `NotFound` |
/// | request timeout | `TimedOut` |
/// | connect error, 5xx, 429 | `Unreachable` |
/// | anything else | `InvalidResponse` |
///
/// # Example
///
/// ```no_run
/// use reltrack_shared::registry::{PypiClient, RegistryLookup};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = PypiClient::new("https://pypi.org", Duration::from_secs(10))?;
/// let metadata = client.lookup("requests").await?;
/// println!("latest: {}", metadata.latest_version);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

use super::{LookupError, PackageMetadata, RegistryLookup};

/// Default registry base URL
pub const DEFAULT_BASE_URL: &str = "https://pypi.org";

/// Project URL labels that name the source repository, lowercase
const REPO_LABELS: [&str; 6] = ["source", "source code", "repository", "code", "home", "homepage"];

fn forge_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(github|gitlab|bitbucket)\.(com|org)/\S+").expect("forge pattern compiles")
    })
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    info: ProjectInfo,

    #[serde(default)]
    releases: HashMap<String, Vec<ReleaseFile>>,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    version: Option<String>,

    #[serde(default)]
    home_page: Option<String>,

    /// Kept as a JSON map so label order survives
    #[serde(default)]
    project_urls: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ReleaseFile {
    #[serde(default)]
    upload_time_iso_8601: Option<String>,

    #[serde(default)]
    upload_time: Option<String>,
}

/// PyPI registry client
#[derive(Debug, Clone)]
pub struct PypiClient {
    http: reqwest::Client,
    base_url: String,
}

impl PypiClient {
    /// Creates a client against `base_url` with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client can't be built (e.g. TLS backend
    /// initialization fails)
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("reltrack/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Gets the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn json_url(&self, package: &str) -> String {
        format!("{}/pypi/{}/json", self.base_url, package)
    }

    fn index_url(&self, package: &str) -> String {
        format!("{}/project/{}/", self.base_url, package)
    }
}

/// Picks the repository URL from a project's labelled URLs
fn select_repo_url(project_urls: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    let urls = || {
        project_urls
            .iter()
            .filter_map(|(label, url)| url.as_str().filter(|u| !u.is_empty()).map(|u| (label, u)))
    };

    urls()
        .find(|(label, _)| REPO_LABELS.contains(&label.trim().to_lowercase().as_str()))
        .or_else(|| urls().find(|(_, url)| forge_pattern().is_match(url)))
        .map(|(_, url)| url.to_string())
}

/// Parses a PyPI upload time
fn parse_upload_time(file: &ReleaseFile) -> Option<DateTime<Utc>> {
    if let Some(iso) = file.upload_time_iso_8601.as_deref() {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(iso) {
            return Some(parsed.with_timezone(&Utc));
        }
    }

    file.upload_time.as_deref().and_then(|naive| {
        NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|dt| dt.and_utc())
    })
}

fn metadata_from_response(response: ProjectResponse, index_url: String) -> Result<PackageMetadata, LookupError> {
    let latest_version = response
        .info
        .version
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| LookupError::InvalidResponse("missing info.version".to_string()))?;

    let release_date = response
        .releases
        .get(&latest_version)
        .and_then(|files| files.first())
        .and_then(parse_upload_time);

    let project_urls = response.info.project_urls.unwrap_or_default();
    let repo_url = select_repo_url(&project_urls);

    let homepage = response
        .info
        .home_page
        .filter(|h| !h.trim().is_empty())
        .or_else(|| {
            project_urls
                .iter()
                .find(|(label, _)| label.eq_ignore_ascii_case("homepage"))
                .and_then(|(_, url)| url.as_str())
                .map(str::to_string)
        });

    Ok(PackageMetadata {
        latest_version,
        release_date,
        repo_url,
        index_url: Some(index_url),
        homepage,
    })
}

#[async_trait]
impl RegistryLookup for PypiClient {
    fn name(&self) -> &str {
        "pypi"
    }

    async fn lookup(&self, package: &str) -> Result<PackageMetadata, LookupError> {
        let url = self.json_url(package);
        debug!(package = %package, url = %url, "Looking up package");

        let response = self.http.get(&url).send().await.map_err(|e| {
            warn!(package = %package, error = %e, "Registry request failed");
            if e.is_timeout() {
                LookupError::TimedOut(e.to_string())
            } else {
                LookupError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        match status {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(LookupError::NotFound(package.to_string())),
            s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                return Err(LookupError::Unreachable(format!("registry returned {}", s)));
            }
            s => return Err(LookupError::InvalidResponse(format!("registry returned {}", s))),
        }

        let body: ProjectResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LookupError::TimedOut(e.to_string())
            } else {
                LookupError::InvalidResponse(e.to_string())
            }
        })?;

        metadata_from_response(body, self.index_url(package))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn response(json: serde_json::Value) -> ProjectResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_full_metadata() {
        let body = response(serde_json::json!({
            "info": {
                "version": "1.2.0",
                "home_page": "https://alpha.dev",
                "project_urls": {
                    "Documentation": "https://docs.alpha.dev",
                    "Source": "https://github.com/org/alpha"
                }
            },
            "releases": {
                "1.0.0": [{"upload_time_iso_8601": "2022-01-01T00:00:00.000000Z"}],
                "1.2.0": [
                    {"upload_time_iso_8601": "2023-05-01T10:30:00.123456Z", "upload_time": "2023-05-01T10:30:00"},
                    {"upload_time_iso_8601": "2023-05-02T00:00:00.000000Z"}
                ]
            }
        }));

        let metadata = metadata_from_response(body, "https://pypi.org/project/alpha/".to_string()).unwrap();

        assert_eq!(metadata.latest_version, "1.2.0");
        assert_eq!(
            metadata.release_date.map(|d| d.date_naive()),
            Some(Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap().date_naive())
        );
        assert_eq!(metadata.repo_url.as_deref(), Some("https://github.com/org/alpha"));
        assert_eq!(metadata.homepage.as_deref(), Some("https://alpha.dev"));
        assert_eq!(metadata.index_url.as_deref(), Some("https://pypi.org/project/alpha/"));
    }

    #[test]
    fn test_repo_label_order_is_respected() {
        let body = response(serde_json::json!({
            "info": {
                "version": "2.0",
                "project_urls": {
                    "Homepage": "https://beta.example",
                    "Repository": "https://gitlab.com/org/beta"
                }
            }
        }));

        let metadata = metadata_from_response(body, String::new()).unwrap();
        assert_eq!(metadata.repo_url.as_deref(), Some("https://beta.example"));
        assert_eq!(metadata.homepage.as_deref(), Some("https://beta.example"));
        assert_eq!(metadata.release_date, None);
    }

    #[test]
    fn test_repo_falls_back_to_forge_url() {
        let body = response(serde_json::json!({
            "info": {
                "version": "0.1",
                "project_urls": {
                    "Docs": "https://docs.example",
                    "Tracker": "https://bitbucket.org/org/gamma/issues"
                }
            }
        }));

        let metadata = metadata_from_response(body, String::new()).unwrap();
        assert_eq!(metadata.repo_url.as_deref(), Some("https://bitbucket.org/org/gamma/issues"));
    }

    #[test]
    fn test_null_project_urls() {
        let body = response(serde_json::json!({
            "info": {"version": "3.0", "home_page": "", "project_urls": null},
            "releases": {"3.0": []}
        }));

        let metadata = metadata_from_response(body, String::new()).unwrap();
        assert_eq!(metadata.repo_url, None);
        assert_eq!(metadata.homepage, None);
        assert_eq!(metadata.release_date, None);
    }

    #[test]
    fn test_missing_version_is_invalid() {
        let body = response(serde_json::json!({"info": {"version": null}}));
        assert!(matches!(
            metadata_from_response(body, String::new()),
            Err(LookupError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_naive_upload_time_fallback() {
        let file = ReleaseFile {
            upload_time_iso_8601: None,
            upload_time: Some("2023-05-01T10:30:00".to_string()),
        };

        assert_eq!(
            parse_upload_time(&file),
            Some(Utc.with_ymd_and_hms(2023, 5, 1, 10, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_urls() {
        let client = PypiClient::new("https://pypi.example/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "https://pypi.example");
        assert_eq!(client.json_url("alpha"), "https://pypi.example/pypi/alpha/json");
        assert_eq!(client.index_url("alpha"), "https://pypi.example/project/alpha/");
    }
}
