//! Versions and module versions.
//!
//! A version is either static (`S/1.2.0`, an immutable tag) or dynamic
//! (`D/main`, a moving branch). A module version pairs a module node path
//! with one of those.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::model::NodePath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VersionType {
    Static,
    Dynamic,
}

impl VersionType {
    fn prefix(self) -> &'static str {
        match self {
            VersionType::Static => "S",
            VersionType::Dynamic => "D",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    version_type: VersionType,
    name: String,
}

impl Version {
    pub fn new(version_type: VersionType, name: impl Into<String>) -> anyhow::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            anyhow::bail!("Version name cannot be empty");
        }
        if name.contains(':') {
            anyhow::bail!("Version name '{}' cannot contain ':'", name);
        }
        Ok(Self { version_type, name })
    }

    pub fn version_type(&self) -> VersionType {
        self.version_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.version_type.prefix(), self.name)
    }
}

impl FromStr for Version {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, name) = s
            .split_once('/')
            .ok_or_else(|| anyhow::anyhow!("Invalid version '{}': expected S/<name> or D/<name>", s))?;
        let version_type = match prefix {
            "S" => VersionType::Static,
            "D" => VersionType::Dynamic,
            other => anyhow::bail!("Invalid version type '{}' in '{}'", other, s),
        };
        Self::new(version_type, name)
    }
}

/// A module at a specific version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleVersion {
    node_path: NodePath,
    version: Version,
}

impl ModuleVersion {
    pub fn new(node_path: NodePath, version: Version) -> anyhow::Result<Self> {
        if node_path.is_root() {
            anyhow::bail!("Module version requires a module path, got the root");
        }
        Ok(Self { node_path, version })
    }

    pub fn node_path(&self) -> &NodePath {
        &self.node_path
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node_path, self.version)
    }
}

impl FromStr for ModuleVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, version) = s
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("Invalid module version '{}': expected <path>:<version>", s))?;
        Self::new(path.parse()?, version.parse()?)
    }
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(Version);
string_serde!(ModuleVersion);
