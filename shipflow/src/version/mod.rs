//! Version resolution from a prioritized set of sources.
//!
//! The resolver never fails: an explicit override wins outright,
//! otherwise well-known per-ecosystem version declarations are probed
//! in fixed priority order, falling back to VCS metadata and finally a
//! generated identifier.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::process::Command;

/// Where the resolved version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    /// Caller-supplied override.
    Explicit,
    /// `package.json` "version" field.
    PackageJson,
    /// `pyproject.toml` version declaration.
    PyProject,
    /// `Cargo.toml` version declaration.
    CargoToml,
    /// Plain `VERSION` file.
    VersionFile,
    /// Latest VCS tag.
    GitTag,
    /// VCS short revision.
    GitRevision,
    /// Generated identifier; nothing else matched.
    Generated,
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Explicit => "explicit",
            Self::PackageJson => "package.json",
            Self::PyProject => "pyproject.toml",
            Self::CargoToml => "Cargo.toml",
            Self::VersionFile => "VERSION",
            Self::GitTag => "git tag",
            Self::GitRevision => "git revision",
            Self::Generated => "generated",
        };
        f.write_str(s)
    }
}

/// A resolved version and its provenance. Immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVersion {
    /// The normalized version string (leading `v` stripped).
    pub version: String,
    /// Which source produced it.
    pub source: VersionSource,
}

/// Checks whether a value has strict semantic-version shape.
#[must_use]
pub fn is_semver(value: &str) -> bool {
    // MAJOR.MINOR.PATCH with optional pre-release suffix.
    let re = Regex::new(r"^\d+\.\d+\.\d+(-[0-9A-Za-z.-]+)?$");
    re.map(|re| re.is_match(value)).unwrap_or(false)
}

/// Returns the next patch version, if `value` is semver-shaped.
#[must_use]
pub fn bump_patch(value: &str) -> Option<String> {
    let core = value.split('-').next()?;
    let mut parts = core.split('.');
    let major: u64 = parts.next()?.parse().ok()?;
    let minor: u64 = parts.next()?.parse().ok()?;
    let patch: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(format!("{major}.{minor}.{patch}", patch = patch + 1))
}

/// Strips a leading `v`/`V` from a version string.
#[must_use]
pub fn normalize(value: &str) -> String {
    value
        .trim()
        .trim_start_matches(['v', 'V'])
        .to_string()
}

/// Resolves the version to deploy.
///
/// An explicit override short-circuits (only emptiness is rejected,
/// and even that just falls through to probing). Probing never fails:
/// the generated fallback guarantees a non-empty result.
#[must_use]
pub fn resolve(explicit: Option<&str>, project_root: &Path) -> ResolvedVersion {
    if let Some(value) = explicit {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            let version = normalize(trimmed);
            warn_if_not_semver(&version, VersionSource::Explicit);
            return ResolvedVersion {
                version,
                source: VersionSource::Explicit,
            };
        }
        tracing::warn!("Explicit version override was empty; probing project sources instead");
    }

    let probes: [(VersionSource, fn(&Path) -> Option<String>); 6] = [
        (VersionSource::PackageJson, probe_package_json),
        (VersionSource::PyProject, probe_pyproject),
        (VersionSource::CargoToml, probe_cargo_toml),
        (VersionSource::VersionFile, probe_version_file),
        (VersionSource::GitTag, probe_git_tag),
        (VersionSource::GitRevision, probe_git_revision),
    ];

    for (source, probe) in probes {
        if let Some(value) = probe(project_root) {
            let version = normalize(&value);
            if version.is_empty() {
                continue;
            }
            if source == VersionSource::GitRevision {
                tracing::warn!(
                    version,
                    "No version declaration found; falling back to VCS revision"
                );
            } else {
                tracing::info!(version, source = %source, "Resolved version");
            }
            warn_if_not_semver(&version, source);
            return ResolvedVersion { version, source };
        }
    }

    let version = format!("unversioned-{}", chrono::Utc::now().timestamp());
    tracing::warn!(
        version,
        "No version source available (including VCS); using generated identifier"
    );
    ResolvedVersion {
        version,
        source: VersionSource::Generated,
    }
}

fn warn_if_not_semver(version: &str, source: VersionSource) {
    if !is_semver(version) {
        tracing::warn!(
            version,
            source = %source,
            "Resolved version is not semantic-version shaped; downstream must not assume semver"
        );
    }
}

fn probe_package_json(root: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(root.join("package.json")).ok()?;
    let json: serde_json::Value = serde_json::from_str(&raw).ok()?;
    json.get("version")?.as_str().map(str::to_string)
}

fn probe_pyproject(root: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(root.join("pyproject.toml")).ok()?;
    extract_toml_version(&raw)
}

fn probe_cargo_toml(root: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(root.join("Cargo.toml")).ok()?;
    extract_toml_version(&raw)
}

fn extract_toml_version(raw: &str) -> Option<String> {
    let re = Regex::new(r#"(?m)^\s*version\s*=\s*"([^"]+)""#).ok()?;
    re.captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn probe_version_file(root: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(root.join("VERSION")).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn probe_git_tag(root: &Path) -> Option<String> {
    run_git(root, &["describe", "--tags", "--abbrev=0"])
}

fn probe_git_revision(root: &Path) -> Option<String> {
    run_git(root, &["rev-parse", "--short", "HEAD"])
}

fn run_git(root: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8(output.stdout).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
