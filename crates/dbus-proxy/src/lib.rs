//! dbus-proxy library entry point.
//!
//! Client-side proxies for remote message-bus interfaces.  An
//! [`InterfaceProxy`] is built from an introspection `<interface>` element
//! and exposes the interface's methods as callable stubs and its signals as
//! listener registrations.  Bus match rules are reference counted: the first
//! listener of a signal subscribes, the last removal unsubscribes.
//!
//! Re-exports the public modules so that integration tests in `tests/` and
//! the binary entry point in `main.rs` share the same module tree.

pub mod application;
pub mod infrastructure;

pub use application::listeners::{notify_all, Emitter, Listener, ListenerId, ListenerRegistry};
pub use application::methods::{CallError, MethodStub};
pub use application::proxy::{InterfaceProxy, WeakInterfaceProxy};
pub use application::router::{RouteOutcome, RouterStatsSnapshot, SignalRouter, SignalSink};
pub use application::subscription::SubscriptionState;
pub use infrastructure::bus::{Bus, BusRequest, SignalHandler};
