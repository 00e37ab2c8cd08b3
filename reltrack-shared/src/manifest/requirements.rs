/// `requirements.txt` parsing
///
/// Handles the subset of pip's format that names a package:
///
/// ```text
/// # comment
/// alpha==1.0.0
/// beta >= 2.0, < 3        # inline comment
/// gamma[extra1,extra2]~=1.4
/// delta==0.9; python_version < "3.11"
/// epsilon                  # unpinned, empty specifier
/// -r other.txt             # option lines are skipped
/// git+https://host/x.git   # VCS/URL lines are skipped
/// ```
///
/// Extras and environment markers are dropped; the specifier keeps only its
/// comparison clauses with whitespace removed.

use regex::Regex;
use std::sync::OnceLock;

use super::{Dependency, ManifestError};

fn requirement_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[[^\]]*\])?\s*(.*)$")
            .expect("requirement pattern compiles")
    })
}

/// Whether `name` is a bare package name, nothing before or after it
pub(super) fn is_package_name(name: &str) -> bool {
    requirement_pattern()
        .captures(name)
        .and_then(|captures| captures.get(1))
        .is_some_and(|m| m.as_str() == name)
}

/// Outcome of looking at one line
#[derive(Debug, PartialEq, Eq)]
enum Line {
    /// Blank, comment, option or VCS line
    Ignored,

    /// Looked like content but isn't a requirement
    Unparseable,

    Requirement(Dependency),
}

/// Parses a single PEP 508-ish requirement string
///
/// Returns None if the string doesn't start with a package name followed by
/// an optional version specifier. Shared with the pyproject parser.
pub fn parse_requirement(input: &str) -> Option<Dependency> {
    let captures = requirement_pattern().captures(input.trim())?;
    let name = captures.get(1)?.as_str();
    let rest = captures.get(2).map(|m| m.as_str()).unwrap_or_default();

    let clauses = rest.split(';').next().unwrap_or_default().trim();

    // `name @ url` direct references pin no version
    if clauses.starts_with('@') {
        return Some(Dependency::new(name, ""));
    }

    let spec: String = clauses
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split_whitespace()
        .collect();

    let looks_like_specifier = spec.is_empty()
        || spec.starts_with(|c: char| matches!(c, '=' | '<' | '>' | '!' | '~'));

    looks_like_specifier.then(|| Dependency::new(name, spec))
}

fn classify(raw: &str) -> Line {
    let line = match raw.find(" #").or_else(|| raw.find("\t#")) {
        Some(index) => &raw[..index],
        None => raw,
    }
    .trim();

    if line.is_empty() || line.starts_with('#') {
        return Line::Ignored;
    }

    if line.starts_with('-') || line.starts_with("git+") || (line.contains("://") && !line.contains('@')) {
        return Line::Ignored;
    }

    match parse_requirement(line) {
        Some(dependency) => Line::Requirement(dependency),
        None => Line::Unparseable,
    }
}

/// Parses a requirements document
///
/// Unrecognized lines are skipped, but a document with content and not a
/// single recognizable requirement is rejected.
///
/// # Errors
///
/// Returns `MalformedManifest` when no line could be parsed even though the
/// document has lines that are neither comments nor options
pub fn parse_requirements(text: &str) -> Result<Vec<Dependency>, ManifestError> {
    let mut dependencies = Vec::new();
    let mut unparseable = 0usize;

    for raw in text.lines() {
        match classify(raw) {
            Line::Ignored => {}
            Line::Unparseable => unparseable += 1,
            Line::Requirement(dependency) => dependencies.push(dependency),
        }
    }

    if dependencies.is_empty() && unparseable > 0 {
        return Err(ManifestError::MalformedManifest(format!(
            "no requirement could be read from {} line(s)",
            unparseable
        )));
    }

    Ok(dependencies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(text: &str) -> Vec<(String, String)> {
        parse_requirements(text)
            .unwrap()
            .into_iter()
            .map(|d| (d.name, d.spec))
            .collect()
    }

    #[test]
    fn test_pinned_and_ranged() {
        assert_eq!(
            pairs("alpha==1.0.0\nbeta>=2.0\n"),
            vec![
                ("alpha".to_string(), "==1.0.0".to_string()),
                ("beta".to_string(), ">=2.0".to_string()),
            ]
        );
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let text = "# header\n\n  \nalpha==1.0  # pinned for a reason\n\t# indented comment\n";
        assert_eq!(pairs(text), vec![("alpha".to_string(), "==1.0".to_string())]);
    }

    #[test]
    fn test_extras_markers_and_whitespace() {
        let text = "gamma[socks, security] ~= 1.4\ndelta == 0.9 ; python_version < \"3.11\"\nbeta >= 2.0, < 3\n";
        assert_eq!(
            pairs(text),
            vec![
                ("gamma".to_string(), "~=1.4".to_string()),
                ("delta".to_string(), "==0.9".to_string()),
                ("beta".to_string(), ">=2.0,<3".to_string()),
            ]
        );
    }

    #[test]
    fn test_unpinned_and_direct_reference() {
        let text = "epsilon\nzeta @ https://example.com/zeta-1.0.tar.gz\n";
        assert_eq!(
            pairs(text),
            vec![
                ("epsilon".to_string(), String::new()),
                ("zeta".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_options_and_vcs_lines_skipped() {
        let text = "-r base.txt\n--index-url https://pypi.example\n-e ./local\ngit+https://github.com/x/y.git\nhttps://example.com/pkg.whl\nalpha==1\n";
        assert_eq!(pairs(text), vec![("alpha".to_string(), "==1".to_string())]);
    }

    #[test]
    fn test_only_options_is_empty_not_malformed() {
        assert!(parse_requirements("-r base.txt\n# nothing else\n").unwrap().is_empty());
        assert!(parse_requirements("").unwrap().is_empty());
    }

    #[test]
    fn test_garbage_lines_are_skipped_when_something_parses() {
        let text = "this is not a requirement\nalpha==1\n!!!\n";
        assert_eq!(pairs(text), vec![("alpha".to_string(), "==1".to_string())]);
    }

    #[test]
    fn test_nothing_parseable_is_malformed() {
        let result = parse_requirements("{\"dependencies\": [\"alpha\"]}\n<html>\n");
        assert!(matches!(result, Err(ManifestError::MalformedManifest(_))));
    }

    #[test]
    fn test_parse_requirement() {
        assert_eq!(
            parse_requirement("requests[security]>=2.31; python_version>='3.8'"),
            Some(Dependency::new("requests", ">=2.31"))
        );
        assert_eq!(parse_requirement("six (>=1.16)"), Some(Dependency::new("six", ">=1.16")));
        assert_eq!(parse_requirement("not a requirement"), None);
        assert_eq!(parse_requirement(""), None);
    }
}
