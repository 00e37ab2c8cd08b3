/// `pyproject.toml` parsing
///
/// Two dependency tables are read, in the order they appear in the document:
///
/// - `[project].dependencies`: an array of PEP 508 strings
/// - `[tool.poetry.dependencies]`: a table of `name = "spec"` or
///   `name = { version = "spec", ... }`; the `python` entry is not a package,
///   and keys that aren't valid package names are skipped
///
/// Everything else in the file is ignored.

use toml::{Table, Value};

use super::requirements::{is_package_name, parse_requirement};
use super::{Dependency, ManifestError};

fn project_dependencies(project: &Value) -> Vec<Dependency> {
    project
        .get("dependencies")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .filter_map(parse_requirement)
                .collect()
        })
        .unwrap_or_default()
}

fn poetry_dependencies(tool: &Value) -> Vec<Dependency> {
    let Some(table) = tool
        .get("poetry")
        .and_then(|poetry| poetry.get("dependencies"))
        .and_then(Value::as_table)
    else {
        return Vec::new();
    };

    table
        .iter()
        .map(|(name, value)| (name.trim(), value))
        .filter(|(name, _)| !name.eq_ignore_ascii_case("python") && is_package_name(name))
        .map(|(name, value)| {
            let spec = match value {
                Value::String(spec) => spec.as_str(),
                Value::Table(details) => details
                    .get("version")
                    .and_then(Value::as_str)
                    .unwrap_or_default(),
                _ => "",
            };
            Dependency::new(name, spec.split_whitespace().collect::<String>())
        })
        .collect()
}

/// Parses a pyproject document
///
/// # Errors
///
/// Returns `MalformedManifest` if the document is not valid TOML
pub fn parse_pyproject(text: &str) -> Result<Vec<Dependency>, ManifestError> {
    let document: Table = text
        .parse()
        .map_err(|e: toml::de::Error| ManifestError::MalformedManifest(format!("invalid TOML: {}", e.message())))?;

    let mut dependencies = Vec::new();

    for (key, value) in &document {
        match key.as_str() {
            "project" => dependencies.extend(project_dependencies(value)),
            "tool" => dependencies.extend(poetry_dependencies(value)),
            _ => {}
        }
    }

    Ok(dependencies)
}
