//! OpenShift version gate

use crate::error::{ClusterError, Result};
use semver::Version;

/// Oldest OpenShift release that can be installed
pub const MIN_VERSION: &str = "4.10";

/// Prefix of version identifiers in the versions catalog
pub const VERSION_PREFIX: &str = "openshift-v";

/// Whether `version` (e.g. `openshift-v4.12.3`) is at least [`MIN_VERSION`]
///
/// A version that cannot be parsed is an error, never an unsupported result.
pub fn is_supported(version: &str) -> Result<bool> {
    is_supported_with_minimum(version, MIN_VERSION)
}

pub fn is_supported_with_minimum(version: &str, minimum: &str) -> Result<bool> {
    let raw = version.replacen(VERSION_PREFIX, "", 1);
    let requested = parse_lenient(&raw).map_err(|e| ClusterError::VersionCheck {
        version: version.to_string(),
        reason: e.to_string(),
    })?;
    let minimum = parse_lenient(minimum).map_err(|e| ClusterError::VersionCheck {
        version: minimum.to_string(),
        reason: e.to_string(),
    })?;

    Ok(requested >= minimum)
}

/// Ensures `version` is present and supported
pub fn check_supported(version: &str) -> Result<()> {
    if is_supported(version)? {
        Ok(())
    } else {
        Err(ClusterError::UnsupportedVersion {
            version: version.to_string(),
            minimum: MIN_VERSION,
        })
    }
}

/// Parses `major[.minor[.patch]][-pre][+build]`, padding missing components
fn parse_lenient(raw: &str) -> std::result::Result<Version, semver::Error> {
    let raw = raw.trim();
    let core_end = raw.find(['-', '+']).unwrap_or(raw.len());
    let (core, rest) = raw.split_at(core_end);

    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{rest}"),
        2 => format!("{core}.0{rest}"),
        _ => raw.to_string(),
    };
    Version::parse(&padded)
}
