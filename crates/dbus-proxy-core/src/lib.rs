//! # dbus-proxy-core
//!
//! Shared library for client-side bus interface proxies: name validation,
//! the parsed introspection tree, interface descriptors, match rules, and
//! the decoded message types a proxy exchanges with its connection.
//!
//! This crate performs no I/O and has no async runtime dependency.
//!
//! # Architecture overview (for beginners)
//!
//! A peer on the message bus exports *objects*, and each object implements
//! one or more *interfaces*.  An interface has methods (callable remotely),
//! signals (broadcast by the peer) and properties.  The peer describes them in
//! an *introspection* document.
//!
//! - **`domain`** – Turns an introspection tree into a validated
//!   [`InterfaceDescriptor`].  Malformed members are dropped; an interface with
//!   an invalid name is rejected as a whole.
//!
//! - **`protocol`** – What travels to and from the bus: the canonical
//!   [`MatchRule`] string that asks the daemon to forward a signal, the
//!   [`SignalKey`] an inbound signal is routed by, and the
//!   [`SignalMessage`] / [`MethodCall`] / [`BusError`] types.
//!
//! The `dbus-proxy` crate builds the live proxy on top of these types.

pub mod domain;
pub mod protocol;

pub use domain::descriptor::{
    InterfaceDescriptor, MethodDescriptor, PropertyAccess, PropertyDescriptor, SignalDescriptor,
};
pub use domain::introspection::{InterfaceNode, ObjectNode};
pub use domain::names::{NameError, ObjectRef};
pub use domain::signature::Signature;
pub use protocol::{BusError, MatchRule, MethodCall, SerialCounter, SignalKey, SignalMessage, Value};
