//! Module descriptor parsing and validation.
//!
//! A module package declares its metadata in a `module.json` file: name,
//! version, authors, dependencies, and entry point. Descriptors are read and
//! validated at index time, before any module code runs.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use sable_types::SableError;

/// The expected descriptor filename inside each module package.
pub const DESCRIPTOR_FILENAME: &str = "module.json";

/// Maximum allowed length for a module name.
const MAX_NAME_LEN: usize = 64;

/// Static metadata for one module package. Immutable once indexed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleDescription {
    /// Unique module name (lowercase alphanumeric + hyphens, 1-64 chars).
    pub name: String,
    /// Semantic version string (X.Y.Z).
    pub version: String,
    /// Human-readable description of what the module provides.
    #[serde(default)]
    pub description: String,
    /// Author attributions.
    #[serde(default)]
    pub authors: Vec<String>,
    /// Names of modules this module depends on; they must load first.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Entry point inside the package, for loaders that need one.
    #[serde(default)]
    pub entry_point: Option<String>,
}

/// Parse a module descriptor from a JSON string and validate it.
pub fn parse_description(json: &str) -> Result<ModuleDescription, SableError> {
    let description: ModuleDescription = serde_json::from_str(json)
        .map_err(|e| SableError::InvalidModule(format!("malformed module.json: {e}")))?;
    validate_description(&description)?;
    Ok(description)
}

/// Parse a module descriptor from a file path.
pub fn parse_description_file(path: &Path) -> Result<ModuleDescription, SableError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| SableError::InvalidModule(format!("cannot read {}: {e}", path.display())))?;
    parse_description(&raw)
}

/// Validate a parsed descriptor.
///
/// Checks:
/// - Name is lowercase alphanumeric + hyphens, 1-64 chars
/// - Version matches the semver X.Y.Z pattern
/// - No self-dependency, no duplicate dependencies
/// - Dependency names follow the same charset as module names
pub fn validate_description(description: &ModuleDescription) -> Result<(), SableError> {
    validate_name(&description.name)?;
    validate_semver(&description.version)?;

    let mut seen = HashSet::new();
    for dep in &description.dependencies {
        validate_name(dep)?;
        if dep == &description.name {
            return Err(SableError::InvalidModule(format!(
                "module '{}' depends on itself",
                description.name
            )));
        }
        if !seen.insert(dep.as_str()) {
            return Err(SableError::InvalidModule(format!(
                "duplicate dependency '{dep}' in module '{}'",
                description.name
            )));
        }
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), SableError> {
    if name.is_empty() {
        return Err(SableError::InvalidModule("module name must not be empty".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(SableError::InvalidModule(format!(
            "module name exceeds maximum length of {MAX_NAME_LEN}: {name}"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(SableError::InvalidModule(format!(
            "module name must be lowercase alphanumeric plus hyphens: {name}"
        )));
    }
    Ok(())
}

fn validate_semver(version: &str) -> Result<(), SableError> {
    let parts: Vec<&str> = version.split('.').collect();
    let valid = parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.parse::<u64>().is_ok());
    if !valid {
        return Err(SableError::InvalidModule(format!(
            "version must be semver (X.Y.Z), got: {version}"
        )));
    }
    Ok(())
}
