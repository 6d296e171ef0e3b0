//! The bus connection as seen by an interface proxy.
//!
//! The connection itself (socket I/O, authentication, message encoding) lives
//! outside this crate.  A proxy only needs the handful of services collected
//! in the [`Bus`] trait:
//!
//! ```text
//! InterfaceProxy ──add_match / remove_match──►  bus daemon (match rules)
//!                ──attach / detach handler──►  routing registry (per key)
//!                ──name_owner──────────────►  name-ownership table
//!                ──report_error────────────►  shared error sink
//!                ──invoke──────────────────►  method-call transport
//! ```
//!
//! # Request futures
//!
//! `add_match` and `remove_match` write their request *before* returning and
//! hand back a future that resolves with the daemon's reply.  The proxy can
//! therefore issue requests while holding its own lock and await the replies
//! later, on a spawned task, without the lock.
//!
//! # Testability
//!
//! [`memory::MemoryBus`] implements the trait entirely in memory and records
//! every request, so tests can check match-rule bookkeeping exactly.

use std::sync::Arc;

use async_trait::async_trait;
use dbus_proxy_core::protocol::{BusError, MethodCall, SignalMessage, Value};
use futures_util::future::BoxFuture;

pub mod memory;

/// A handler attached to the routing registry.
///
/// Handlers are compared by identity (`Arc::ptr_eq`) when detached, so the
/// same `Arc` that was attached must be passed back to detach it.
pub type SignalHandler = Arc<dyn Fn(&SignalMessage) + Send + Sync>;

/// The reply to an `AddMatch` or `RemoveMatch` request that has already been
/// written to the connection.
pub type BusRequest = BoxFuture<'static, Result<(), BusError>>;

/// Services a proxy consumes from its bus connection.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Writes an `AddMatch` request for `rule`.
    fn add_match(&self, rule: &str) -> BusRequest;

    /// Writes a `RemoveMatch` request for `rule`.
    fn remove_match(&self, rule: &str) -> BusRequest;

    /// Attaches `handler` under `key` in the connection's signal routing
    /// registry.  Several handlers may share a key.
    fn attach_signal_handler(&self, key: &str, handler: SignalHandler);

    /// Detaches the handler identical to `handler` from `key`.  Does nothing
    /// if it is not attached.
    fn detach_signal_handler(&self, key: &str, handler: &SignalHandler);

    /// The unique name currently owning `bus_name`, if any.
    fn name_owner(&self, bus_name: &str) -> Option<String>;

    /// Whether the transport can accept new outbound messages.
    fn is_writable(&self) -> bool;

    /// Hands a non-fatal error to the connection's shared error channel.
    fn report_error(&self, error: BusError);

    /// Calls a remote method and returns the decoded out values.
    async fn invoke(&self, call: MethodCall) -> Result<Vec<Value>, BusError>;
}
