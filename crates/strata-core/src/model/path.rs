//! Node paths within the classification tree.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Ordered names from the root down to a node. The root has the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath {
    names: Vec<String>,
}

impl NodePath {
    /// The root path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from already validated names.
    pub fn from_names<I, S>(names: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        for name in &names {
            validate_node_name(name)?;
        }
        Ok(Self { names })
    }

    pub fn is_root(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Last element, `None` for the root.
    pub fn leaf(&self) -> Option<&str> {
        self.names.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<NodePath> {
        if self.names.is_empty() {
            return None;
        }
        Some(Self {
            names: self.names[..self.names.len() - 1].to_vec(),
        })
    }

    pub fn child(&self, name: &str) -> anyhow::Result<NodePath> {
        validate_node_name(name)?;
        let mut names = self.names.clone();
        names.push(name.to_string());
        Ok(Self { names })
    }
}

/// Node names are unique among siblings and become path segments.
pub fn validate_node_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty() {
        anyhow::bail!("Node name cannot be empty");
    }
    if name.contains('/') || name.contains(':') {
        anyhow::bail!("Node name '{}' cannot contain '/' or ':'", name);
    }
    if name == "." || name == ".." || name.contains('\\') {
        anyhow::bail!("Node name '{}' is not a valid directory name", name);
    }
    Ok(())
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names.join("/"))
    }
}

impl FromStr for NodePath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        Self::from_names(trimmed.split('/'))
    }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
