//! Strongly-typed migration name (slug).
//!
//! A name is non-empty and limited to ASCII letters, digits, `_` and `-` so
//! that it round-trips through file names unchanged.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Human-readable slug identifying a migration within its scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MigrationName(String);

impl<'de> Deserialize<'de> for MigrationName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MigrationName::parse(s).map_err(serde::de::Error::custom)
    }
}

impl MigrationName {
    /// Validate and wrap a slug.
    pub fn parse(name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(CoreError::InvalidMigrationName {
                name,
                reason: "name cannot be empty".to_string(),
            });
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(CoreError::InvalidMigrationName {
                reason: format!("character '{bad}' is not allowed (use letters, digits, '_' or '-')"),
                name,
            });
        }
        Ok(Self(name))
    }

    /// Turn free text ("Add users table") into a slug ("add_users_table").
    ///
    /// Runs of disallowed characters collapse into a single `_`.
    pub fn slugify(text: &str) -> CoreResult<Self> {
        let mut slug = String::with_capacity(text.len());
        for c in text.trim().chars() {
            if c.is_ascii_alphanumeric() || c == '-' {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.ends_with('_') {
                slug.push('_');
            }
        }
        let slug = slug.trim_matches('_').to_string();
        Self::parse(slug).map_err(|_| CoreError::InvalidMigrationName {
            name: text.to_string(),
            reason: "name has no usable characters".to_string(),
        })
    }

    /// Return the underlying name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MigrationName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MigrationName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for MigrationName {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for MigrationName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for MigrationName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
