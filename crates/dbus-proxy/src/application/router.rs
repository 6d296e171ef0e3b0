//! Inbound signal filtering.
//!
//! A [`SignalRouter`] sits between the connection's routing registry and the
//! proxy's listeners for one signal.  Every message handed to it passes two
//! checks before any user code sees it:
//!
//! 1. **Sender** – the message must come from the connection that currently
//!    owns the proxied object's bus name.  Any other process could emit a
//!    signal with the same path, interface and member; those are dropped
//!    silently.
//! 2. **Signature** – the body signature must equal the signature declared by
//!    introspection.  A mismatch is dropped with a warning.
//!
//! The owner is looked up on the bus for every message, never cached, so an
//! owner change takes effect on the very next signal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dbus_proxy_core::protocol::{SignalMessage, Value};
use dbus_proxy_core::SignalDescriptor;
use tracing::{debug, warn};

use crate::infrastructure::bus::{Bus, SignalHandler};

/// The proxy-side surface a router delivers accepted signals to.
pub trait SignalSink: Send + Sync {
    /// Fans `body` out to the listeners of `member`.  Returns how many ran.
    fn deliver_signal(&self, member: &str, body: &[Value]) -> usize;
}

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Delivered,
    /// Sender is not the current owner of the object's bus name.
    SenderMismatch,
    /// Body signature differs from the declared signature.
    SignatureMismatch,
    /// The proxy has been dropped.
    ProxyGone,
}

/// Counters of routing outcomes.
#[derive(Debug, Default)]
pub struct RouterStats {
    delivered: AtomicU64,
    sender_mismatch: AtomicU64,
    signature_mismatch: AtomicU64,
}

/// A point-in-time copy of [`RouterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStatsSnapshot {
    pub delivered: u64,
    pub sender_mismatch: u64,
    pub signature_mismatch: u64,
}

impl RouterStats {
    pub fn snapshot(&self) -> RouterStatsSnapshot {
        RouterStatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            sender_mismatch: self.sender_mismatch.load(Ordering::Relaxed),
            signature_mismatch: self.signature_mismatch.load(Ordering::Relaxed),
        }
    }
}

/// Filters and forwards one signal of one proxied interface.
pub struct SignalRouter {
    bus: Arc<dyn Bus>,
    bus_name: String,
    interface: String,
    signal: SignalDescriptor,
    sink: Weak<dyn SignalSink>,
    stats: RouterStats,
}

impl SignalRouter {
    pub fn new(
        bus: Arc<dyn Bus>,
        bus_name: impl Into<String>,
        interface: impl Into<String>,
        signal: SignalDescriptor,
        sink: Weak<dyn SignalSink>,
    ) -> Self {
        Self {
            bus,
            bus_name: bus_name.into(),
            interface: interface.into(),
            signal,
            sink,
            stats: RouterStats::default(),
        }
    }

    pub fn signal(&self) -> &SignalDescriptor {
        &self.signal
    }

    pub fn stats(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    /// Applies the sender and signature checks and delivers on success.
    pub fn route(&self, msg: &SignalMessage) -> RouteOutcome {
        let owner = self.bus.name_owner(&self.bus_name);
        if owner.as_deref() != Some(msg.sender.as_str()) {
            self.stats.sender_mismatch.fetch_add(1, Ordering::Relaxed);
            debug!(
                interface = %self.interface,
                member = %self.signal.name,
                sender = %msg.sender,
                owner = ?owner,
                "dropping signal from non-owner"
            );
            return RouteOutcome::SenderMismatch;
        }

        if self.signal.signature != msg.signature.as_str() {
            self.stats.signature_mismatch.fetch_add(1, Ordering::Relaxed);
            warn!(
                interface = %self.interface,
                member = %self.signal.name,
                got = %msg.signature,
                expected = %self.signal.signature,
                "dropping signal with unexpected signature"
            );
            return RouteOutcome::SignatureMismatch;
        }

        let Some(sink) = self.sink.upgrade() else {
            return RouteOutcome::ProxyGone;
        };
        self.stats.delivered.fetch_add(1, Ordering::Relaxed);
        sink.deliver_signal(&self.signal.name, &msg.body);
        RouteOutcome::Delivered
    }

    /// Wraps the router in the handler type the routing registry stores.
    pub fn handler(self: &Arc<Self>) -> SignalHandler {
        let router = Arc::clone(self);
        Arc::new(move |msg: &SignalMessage| {
            router.route(msg);
        })
    }
}
