//! Parsed introspection tree.
//!
//! These types mirror the element structure of introspection XML after it
//! has been parsed: every element carries an optional attribute map and its
//! child elements grouped by tag.  Parsing the XML itself happens elsewhere;
//! this crate only consumes the tree.
//!
//! ```text
//! node
//!  └─ interface name="com.Example"
//!       ├─ method name="Foo"
//!       │    ├─ arg name="a" type="s" direction="in"
//!       │    └─ arg name="b" type="i" direction="out"
//!       ├─ signal name="Bar"
//!       │    └─ arg type="u"
//!       └─ property name="Volume" type="d" access="readwrite"
//! ```
//!
//! An element whose attribute map is `None` was present in the document but
//! carried no attributes at all, which the descriptor builder treats as
//! structurally invalid.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute map of one element, keyed by attribute name.
pub type Attributes = BTreeMap<String, String>;

/// An `<arg>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgNode {
    #[serde(default)]
    pub attributes: Option<Attributes>,
}

/// A `<method>` or `<signal>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberNode {
    #[serde(default)]
    pub attributes: Option<Attributes>,
    #[serde(default)]
    pub args: Vec<ArgNode>,
}

/// A `<property>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyNode {
    #[serde(default)]
    pub attributes: Option<Attributes>,
}

/// An `<interface>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceNode {
    #[serde(default)]
    pub attributes: Option<Attributes>,
    #[serde(default)]
    pub properties: Vec<PropertyNode>,
    #[serde(default)]
    pub signals: Vec<MemberNode>,
    #[serde(default)]
    pub methods: Vec<MemberNode>,
}

/// A `<node>` element: the root of an introspection document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectNode {
    #[serde(default)]
    pub interfaces: Vec<InterfaceNode>,
    /// Names of child objects, relative to this node's path.
    #[serde(default)]
    pub children: Vec<String>,
}

impl ArgNode {
    /// Convenience constructor used by tests and fixtures.
    pub fn with(pairs: &[(&str, &str)]) -> Self {
        Self {
            attributes: Some(attributes(pairs)),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.as_ref()?.get(key).map(String::as_str)
    }
}

impl MemberNode {
    /// Creates a member element with a `name` attribute and the given args.
    pub fn named(name: &str, args: Vec<ArgNode>) -> Self {
        Self {
            attributes: Some(attributes(&[("name", name)])),
            args,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.as_ref()?.get(key).map(String::as_str)
    }
}

impl InterfaceNode {
    /// Creates an interface element with only a `name` attribute.
    pub fn named(name: &str) -> Self {
        Self {
            attributes: Some(attributes(&[("name", name)])),
            ..Self::default()
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.as_ref()?.get(key).map(String::as_str)
    }
}

/// Builds an [`Attributes`] map from key/value pairs.
pub fn attributes(pairs: &[(&str, &str)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
