//! Bridge versions and the generation tags that namespace them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{BridgeError, ErrorInfo};

/// Semantic version of one bridge generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BridgeVersion {
    /// Major version incremented for incompatible bridge changes.
    pub major: u32,
    /// Minor version incremented for additive changes.
    pub minor: u32,
    /// Patch version incremented for fixes.
    pub patch: u32,
}

impl BridgeVersion {
    /// Creates a new version descriptor.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Versioned namespace prefix, e.g. `ABI44_0_0` for `44.0.0`.
    pub fn namespace_prefix(&self) -> String {
        format!("ABI{}_{}_{}", self.major, self.minor, self.patch)
    }
}

impl Default for BridgeVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl fmt::Display for BridgeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Opaque tag identifying one bridge generation in a process.
///
/// Tags built from a [`BridgeVersion`] use its namespace prefix, so the tags
/// of two incompatible generations never collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GenerationTag(String);

impl GenerationTag {
    /// Creates a tag from a non-empty string free of whitespace and control
    /// characters. Tags name queue threads, so NUL bytes are refused here.
    pub fn new(raw: impl Into<String>) -> Result<Self, BridgeError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(BridgeError::Config(ErrorInfo::new(
                "bridge.config.generation_tag",
                "generation tag must not be empty",
            )));
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(BridgeError::Config(
                ErrorInfo::new(
                    "bridge.config.generation_tag",
                    "generation tag must not contain whitespace or control characters",
                )
                .with_context("tag", raw.escape_default().to_string()),
            ));
        }
        Ok(Self(raw))
    }

    /// Creates the tag for a bridge version.
    pub fn from_version(version: BridgeVersion) -> Self {
        Self(version.namespace_prefix())
    }

    /// Raw tag text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefixes `name` with this generation's namespace.
    pub fn qualify(&self, name: &str) -> String {
        format!("{}{}", self.0, name)
    }
}

impl fmt::Display for GenerationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GenerationTag {
    type Error = BridgeError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<GenerationTag> for String {
    fn from(tag: GenerationTag) -> Self {
        tag.0
    }
}

impl From<BridgeVersion> for GenerationTag {
    fn from(version: BridgeVersion) -> Self {
        Self::from_version(version)
    }
}
