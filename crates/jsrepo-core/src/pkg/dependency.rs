//! Remote (package) dependency records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Package ecosystem a remote dependency is installed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    #[default]
    Js,
}

impl Ecosystem {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Js => "js",
        }
    }
}

/// A dependency on an external package.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteDependency {
    pub ecosystem: Ecosystem,
    pub name: String,
    /// Version or range; `None` while unpinned.
    pub version: Option<String>,
}

impl RemoteDependency {
    /// Create a JS dependency.
    #[must_use]
    pub fn js(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            ecosystem: Ecosystem::Js,
            name: name.into(),
            version,
        }
    }

    /// Replace the version, keeping name and ecosystem.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl fmt::Display for RemoteDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{v}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Which dependency list of a package.json a name was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Prod,
    Dev,
    Peer,
}
