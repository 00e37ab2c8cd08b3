/// Dependency manifest parsing
///
/// Turns uploaded manifest bytes into an ordered list of
/// `(package name, version specifier)` pairs.
///
/// # Formats
///
/// - [`ManifestFormat::Requirements`]: pip-style `requirements.txt`
/// - [`ManifestFormat::Pyproject`]: `pyproject.toml` with `[project].dependencies`
///   and/or `[tool.poetry.dependencies]`
///
/// # Ordering and duplicates
///
/// Output follows document order. A package (compared by its PEP 503
/// normalized name) appears once; when it is declared several times the last
/// declaration wins and takes the place of the first.
///
/// # Example
///
/// ```
/// use reltrack_shared::manifest::{parse, ManifestFormat};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manifest = parse(b"alpha==1.0.0\nbeta>=2.0\n", ManifestFormat::Requirements)?;
/// let names: Vec<String> = manifest.map(|dep| dep.name).collect();
/// assert_eq!(names, vec!["alpha", "beta"]);
/// # Ok(())
/// # }
/// ```

pub mod pyproject;
pub mod requirements;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Error type for manifest parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    /// Neither filename nor content type names a known format
    #[error("Unsupported manifest format: {0}")]
    UnsupportedFormat(String),

    /// The document can't be interpreted in the declared format
    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),
}

/// Supported manifest formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    /// Line-oriented `name==version` list
    Requirements,

    /// `pyproject.toml`
    Pyproject,
}

impl ManifestFormat {
    /// Guesses the format from an uploaded filename's extension
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.trim().to_ascii_lowercase();

        if lower.ends_with(".txt") {
            Some(ManifestFormat::Requirements)
        } else if lower.ends_with(".toml") {
            Some(ManifestFormat::Pyproject)
        } else {
            None
        }
    }

    /// Guesses the format from a MIME type (parameters are ignored)
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "text/plain" => Some(ManifestFormat::Requirements),
            "application/toml" | "application/x-toml" | "text/x-toml" | "text/toml" => {
                Some(ManifestFormat::Pyproject)
            }
            _ => None,
        }
    }

    /// Resolves the declared format of an upload
    ///
    /// The filename extension takes precedence; the content type is consulted
    /// only when the filename says nothing.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` if neither identifies a known format
    pub fn detect(filename: Option<&str>, content_type: Option<&str>) -> Result<Self, ManifestError> {
        filename
            .and_then(Self::from_filename)
            .or_else(|| content_type.and_then(Self::from_content_type))
            .ok_or_else(|| {
                ManifestError::UnsupportedFormat(format!(
                    "expected requirements.txt or pyproject.toml, got {}",
                    filename.or(content_type).unwrap_or("an unnamed upload")
                ))
            })
    }
}

impl fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestFormat::Requirements => write!(f, "requirements"),
            ManifestFormat::Pyproject => write!(f, "pyproject"),
        }
    }
}

/// One declared dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Package name as written in the manifest
    pub name: String,

    /// Version specifier as written, whitespace removed (may be empty)
    pub spec: String,
}

impl Dependency {
    /// Creates a dependency
    pub fn new(name: impl Into<String>, spec: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spec: spec.into(),
        }
    }

    /// PEP 503 normalized name
    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }
}

/// Normalizes a package name per PEP 503
///
/// Lowercases and collapses every run of `-`, `_` and `.` into a single `-`.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut in_separator = false;

    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                normalized.push('-');
                in_separator = true;
            }
        } else {
            normalized.push(c.to_ascii_lowercase());
            in_separator = false;
        }
    }

    normalized
}

/// Parsed manifest, consumed once by iteration
///
/// Deliberately not `Clone`: a scan walks it exactly once.
#[derive(Debug)]
pub struct ParsedManifest {
    dependencies: std::vec::IntoIter<Dependency>,
}

impl Iterator for ParsedManifest {
    type Item = Dependency;

    fn next(&mut self) -> Option<Self::Item> {
        self.dependencies.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.dependencies.size_hint()
    }
}

impl ExactSizeIterator for ParsedManifest {}

/// Parses manifest bytes in the declared format
///
/// # Errors
///
/// - `MalformedManifest` if the bytes are not UTF-8 or the document can't be
///   interpreted at all
pub fn parse(bytes: &[u8], format: ManifestFormat) -> Result<ParsedManifest, ManifestError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ManifestError::MalformedManifest(format!("not valid UTF-8: {}", e)))?;

    let declared = match format {
        ManifestFormat::Requirements => requirements::parse_requirements(text)?,
        ManifestFormat::Pyproject => pyproject::parse_pyproject(text)?,
    };

    Ok(ParsedManifest {
        dependencies: dedupe(declared).into_iter(),
    })
}

/// Keeps one entry per normalized name: last value, first position
fn dedupe(declared: Vec<Dependency>) -> Vec<Dependency> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Dependency> = Vec::with_capacity(declared.len());

    for dependency in declared {
        match positions.get(&dependency.key()) {
            Some(&index) => unique[index] = dependency,
            None => {
                positions.insert(dependency.key(), unique.len());
                unique.push(dependency);
            }
        }
    }

    unique
}
