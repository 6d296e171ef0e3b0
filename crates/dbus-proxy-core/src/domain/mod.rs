//! Domain types for bus interface proxies.
//!
//! Nothing in this module talks to a bus.  It turns untrusted introspection
//! data into validated descriptors, and it owns the naming rules those
//! descriptors are checked against:
//!
//! - **`names`** – interface, member, bus name and object path validation,
//!   plus [`names::ObjectRef`].
//! - **`signature`** – the [`signature::Signature`] string type.
//! - **`introspection`** – the parsed introspection tree consumed by the
//!   builder.
//! - **`descriptor`** – [`descriptor::InterfaceDescriptor`] and its method,
//!   signal and property descriptors.

pub mod descriptor;
pub mod introspection;
pub mod names;
pub mod signature;
