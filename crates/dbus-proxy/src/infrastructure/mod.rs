//! Infrastructure layer.
//!
//! Contains the bus abstraction the proxies talk to, its in-memory
//! implementation, and the file-based configuration of the inspect tool.
//!
//! **Dependency rule**: this layer may depend on `dbus_proxy_core`, and
//! `application` may depend on the `bus` module here, but `config` is only
//! used by the binary.

pub mod bus;
pub mod config;
