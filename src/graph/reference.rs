//! Canonical identifiers for graph nodes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A method signature within a class, independent of the owning class
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId {
    pub name: String,
    pub descriptor: String,
}

impl MemberId {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.descriptor)
    }
}

/// Key of a node in the reachability graph
///
/// Classes are keyed by their internal name (`com/example/Foo`), members by
/// `<class>.<name>:<descriptor>`. Internal names never contain `.`, so the
/// owning class is everything before the first `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRef(String);

impl NodeRef {
    pub fn class(internal_name: &str) -> Self {
        Self(internal_name.to_string())
    }

    pub fn member(class: &str, name: &str, descriptor: &str) -> Self {
        Self(format!("{}.{}:{}", class, name, descriptor))
    }

    /// Class reference for an object field descriptor (`Lcom/example/Foo;`)
    ///
    /// Primitive and array descriptors have no class node and yield `None`.
    pub fn from_type_descriptor(descriptor: &str) -> Option<Self> {
        descriptor
            .strip_prefix('L')
            .and_then(|d| d.strip_suffix(';'))
            .filter(|name| !name.is_empty())
            .map(Self::class)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_member(&self) -> bool {
        self.0.contains('.')
    }

    /// The class that owns this node; a class node owns itself
    pub fn owner_class(&self) -> NodeRef {
        match self.0.split_once('.') {
            Some((class, _)) => Self::class(class),
            None => self.clone(),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An independent root set with its own reference counts and output location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShrinkType {
    /// Regular shrinking of the whole program
    Full,
    /// Main-dex list computation for legacy multidex
    LegacyMultidex,
}

impl ShrinkType {
    pub const COUNT: usize = 2;

    pub const ALL: [ShrinkType; ShrinkType::COUNT] = [ShrinkType::Full, ShrinkType::LegacyMultidex];

    /// Position of this type's counter in a node's counter array
    pub fn index(self) -> usize {
        match self {
            ShrinkType::Full => 0,
            ShrinkType::LegacyMultidex => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ShrinkType::Full => "full",
            ShrinkType::LegacyMultidex => "legacy_multidex",
        }
    }
}

impl fmt::Display for ShrinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShrinkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(ShrinkType::Full),
            "legacy_multidex" | "legacy-multidex" => Ok(ShrinkType::LegacyMultidex),
            _ => Err(format!("unknown shrink type '{}'", s)),
        }
    }
}
