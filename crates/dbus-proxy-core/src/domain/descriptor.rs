//! Interface descriptors built from the introspection tree.
//!
//! [`InterfaceDescriptor::build`] is the only constructor.  It runs once per
//! proxied interface and never fails loudly:
//!
//! - A malformed `<method>`, `<signal>` or `<property>` element is dropped and
//!   the rest of the interface is kept.
//! - Only an interface element that has no attributes, or whose `name` is not
//!   a valid interface name, makes the whole build return `None`.  The caller
//!   takes that as "do not expose this interface".
//!
//! Lists keep document order so enumeration is stable; the order carries no
//! other meaning.

use serde::Serialize;
use tracing::debug;

use crate::domain::introspection::{Attributes, InterfaceNode, MemberNode, PropertyNode};
use crate::domain::names::{validate_interface_name, validate_member_name, ObjectRef};
use crate::domain::signature::{is_acceptable, Signature};

/// Direction of a method argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgDirection {
    In,
    Out,
}

impl ArgDirection {
    /// Parses a `direction` attribute value.  Anything other than `in` or
    /// `out` is unrecognised.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in" => Some(Self::In),
            "out" => Some(Self::Out),
            _ => None,
        }
    }
}

/// A validated method of the remote interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodDescriptor {
    pub name: String,
    /// Concatenated types of the `in` arguments, in declaration order.
    pub in_signature: Signature,
    /// Concatenated types of the `out` arguments, in declaration order.
    pub out_signature: Signature,
}

/// A validated signal of the remote interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalDescriptor {
    pub name: String,
    /// Concatenated types of all arguments that declare one.
    pub signature: Signature,
}

/// Access mode declared by a `<property access="...">` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyAccess {
    Read,
    Write,
    ReadWrite,
    /// Missing or unrecognised `access` attribute.
    Unknown,
}

/// A property exactly as introspection declared it.
///
/// The attribute map is copied verbatim.  The accessors below interpret it on
/// demand and never validate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyDescriptor {
    pub attributes: Attributes,
}

impl PropertyDescriptor {
    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").map(String::as_str)
    }

    pub fn type_signature(&self) -> Option<&str> {
        self.attributes.get("type").map(String::as_str)
    }

    pub fn access(&self) -> PropertyAccess {
        match self.attributes.get("access").map(String::as_str) {
            Some("read") => PropertyAccess::Read,
            Some("write") => PropertyAccess::Write,
            Some("readwrite") => PropertyAccess::ReadWrite,
            _ => PropertyAccess::Unknown,
        }
    }
}

/// Everything the proxy knows about one remote interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    name: String,
    object: ObjectRef,
    properties: Vec<PropertyDescriptor>,
    methods: Vec<MethodDescriptor>,
    signals: Vec<SignalDescriptor>,
}

impl InterfaceDescriptor {
    /// Builds the descriptor for `node`, an interface exported by `object`.
    ///
    /// Returns `None` if the interface element has no attributes or its
    /// `name` fails interface-name validation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dbus_proxy_core::domain::descriptor::InterfaceDescriptor;
    /// use dbus_proxy_core::domain::introspection::{ArgNode, InterfaceNode, MemberNode};
    /// use dbus_proxy_core::domain::names::ObjectRef;
    ///
    /// let object = ObjectRef::new("org.example.Service", "/org/example").unwrap();
    /// let mut node = InterfaceNode::named("com.Example");
    /// node.signals.push(MemberNode::named("Bar", vec![ArgNode::with(&[("type", "u")])]));
    ///
    /// let desc = InterfaceDescriptor::build(object, &node).unwrap();
    /// assert_eq!(desc.signal("Bar").unwrap().signature, "u");
    /// ```
    pub fn build(object: ObjectRef, node: &InterfaceNode) -> Option<Self> {
        let Some(attrs) = node.attributes.as_ref() else {
            debug!("interface element without attributes; not exposing it");
            return None;
        };
        let Some(name) = attrs.get("name") else {
            debug!("interface element without a name; not exposing it");
            return None;
        };
        if let Err(err) = validate_interface_name(name) {
            debug!(error = %err, "not exposing interface");
            return None;
        }
        let name = name.clone();

        let properties = node.properties.iter().filter_map(build_property).collect();

        let signals = node
            .signals
            .iter()
            .filter_map(|s| build_signal(&name, s))
            .collect();

        let methods = node
            .methods
            .iter()
            .filter_map(|m| build_method(&name, m))
            .collect();

        Some(Self {
            name,
            object,
            properties,
            methods,
            signals,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    pub fn signals(&self) -> &[SignalDescriptor] {
        &self.signals
    }

    /// Looks up a signal by member name.
    pub fn signal(&self, name: &str) -> Option<&SignalDescriptor> {
        self.signals.iter().find(|s| s.name == name)
    }

    /// Looks up a method by member name.
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

// ── Element builders ──────────────────────────────────────────────────────────

fn build_property(node: &PropertyNode) -> Option<PropertyDescriptor> {
    node.attributes.as_ref().map(|attributes| PropertyDescriptor {
        attributes: attributes.clone(),
    })
}

/// Returns the member's name if it has attributes and a valid `name`.
fn member_name<'a>(interface: &str, kind: &str, node: &'a MemberNode) -> Option<&'a str> {
    let Some(name) = node.attr("name") else {
        debug!(interface, kind, "skipping member without a name");
        return None;
    };
    match validate_member_name(name) {
        Ok(()) => Some(name),
        Err(err) => {
            debug!(interface, kind, error = %err, "skipping malformed member");
            None
        }
    }
}

/// Appends one argument type.  Unknown type codes are kept as declared.
fn push_arg(signature: &mut Signature, interface: &str, member: &str, arg_type: &str) {
    if !is_acceptable(arg_type) {
        debug!(interface, member, arg_type, "argument type has unknown type codes");
    }
    signature.push(arg_type);
}

fn build_signal(interface: &str, node: &MemberNode) -> Option<SignalDescriptor> {
    let name = member_name(interface, "signal", node)?;

    let mut signature = Signature::empty();
    for arg in &node.args {
        if let Some(ty) = arg.attr("type") {
            push_arg(&mut signature, interface, name, ty);
        }
    }

    Some(SignalDescriptor {
        name: name.to_string(),
        signature,
    })
}

fn build_method(interface: &str, node: &MemberNode) -> Option<MethodDescriptor> {
    let name = member_name(interface, "method", node)?;

    let mut in_signature = Signature::empty();
    let mut out_signature = Signature::empty();
    for arg in &node.args {
        let Some(ty) = arg.attr("type") else {
            continue;
        };
        match arg.attr("direction").and_then(ArgDirection::parse) {
            Some(ArgDirection::In) => push_arg(&mut in_signature, interface, name, ty),
            Some(ArgDirection::Out) => push_arg(&mut out_signature, interface, name, ty),
            None => {}
        }
    }

    Some(MethodDescriptor {
        name: name.to_string(),
        in_signature,
        out_signature,
    })
}
