//! Hierarchical migration scopes
//!
//! A scope is the namespace path of a migration, derived from the
//! subdirectory it lives in. The root scope is the empty path.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Separator used when rendering a scope as a string.
pub const SCOPE_SEPARATOR: char = '/';

/// Namespace path of a migration unit (empty = root).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope {
    segments: Vec<String>,
}

impl Scope {
    /// The root scope.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a `/`-separated scope path. Empty input is the root scope.
    pub fn parse(path: &str) -> CoreResult<Self> {
        let trimmed = path.trim().trim_matches(SCOPE_SEPARATOR);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut scope = Self::root();
        for segment in trimmed.split(SCOPE_SEPARATOR) {
            scope = scope.child(segment).map_err(|reason| CoreError::InvalidScope {
                scope: path.to_string(),
                reason,
            })?;
        }
        Ok(scope)
    }

    /// Return a new scope with `segment` appended.
    ///
    /// The error is a human-readable reason; callers wrap it in their own
    /// error type.
    pub fn child(&self, segment: &str) -> Result<Self, String> {
        validate_segment(segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    /// True for the root scope.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Path segments from outermost to innermost.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True when `other` is this scope or nested below it.
    ///
    /// The root scope contains every scope.
    pub fn contains(&self, other: &Scope) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Relative directory of this scope below a migrations root.
    pub fn to_relative_path(&self) -> PathBuf {
        self.segments.iter().collect()
    }
}

fn validate_segment(segment: &str) -> Result<(), String> {
    if segment.is_empty() {
        return Err("scope segments cannot be empty".to_string());
    }
    if segment.starts_with('.') {
        return Err(format!("segment '{segment}' cannot start with '.'"));
    }
    if let Some(bad) = segment
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(format!("character '{bad}' is not allowed in segment '{segment}'"));
    }
    Ok(())
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for Scope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Scope {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Scope::parse(&s).map_err(serde::de::Error::custom)
    }
}
