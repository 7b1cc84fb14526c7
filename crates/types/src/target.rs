//! Build target identity

use crate::ParseEnumError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Fully qualified name of a build rule, e.g. `//apps/sample:app`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BuildTarget {
    base_path: String,
    short_name: String,
}

impl BuildTarget {
    /// Create a target from its base path (without the leading `//`) and
    /// short name.
    pub fn new(base_path: impl Into<String>, short_name: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            short_name: short_name.into(),
        }
    }

    /// Parse a target of the form `//base/path:name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string lacks the `//` prefix, the `:`
    /// separator, or a short name.
    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        let rest = s
            .strip_prefix("//")
            .ok_or_else(|| ParseEnumError::new("build target", s))?;
        let (base, name) = rest
            .rsplit_once(':')
            .ok_or_else(|| ParseEnumError::new("build target", s))?;
        if name.is_empty() || name.contains('/') {
            return Err(ParseEnumError::new("build target", s));
        }
        Ok(Self::new(base.trim_end_matches('/'), name))
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    #[must_use]
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    #[must_use]
    pub fn fully_qualified_name(&self) -> String {
        format!("//{}:{}", self.base_path, self.short_name)
    }

    /// Base path as a relative filesystem path.
    #[must_use]
    pub fn base_path_dir(&self) -> PathBuf {
        Path::new(&self.base_path).to_path_buf()
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "//{}:{}", self.base_path, self.short_name)
    }
}

impl FromStr for BuildTarget {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for BuildTarget {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.fully_qualified_name())
    }
}

impl<'de> Deserialize<'de> for BuildTarget {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
