//! Reference-counted signal subscriptions.
//!
//! The [`SubscriptionManager`] is the [`CountHook`] of a proxy's listener
//! registry.  It keeps exactly one bus-side match rule and exactly one
//! attached forwarding handler per signal that has at least one listener.
//!
//! # State machine (per signal name)
//!
//! ```text
//!                 first listener
//!   Unsubscribed ───────────────► Subscribing ──AddMatch ok──► Subscribed
//!        ▲                            │                           │
//!        │        RemoveMatch done    │ last listener removed     │
//!        └──────── Unsubscribing ◄────┴───────────────────────────┘
//! ```
//!
//! Local effects happen synchronously inside the transition: the handler is
//! attached before `AddMatch` is written, and detached before `RemoveMatch`
//! is written.  Bus replies arrive later, possibly out of order, and only move
//! the state forward if the subscription they belong to is still current
//! (checked with a generation number).  A failed reply never rolls local
//! state back.
//!
//! Requests are queued as [`PendingRequest`]s; the owner of the manager
//! drains them with [`SubscriptionManager::take_pending`] and awaits them
//! outside its lock.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use dbus_proxy_core::protocol::{BusError, MatchRule, SerialCounter};
use dbus_proxy_core::InterfaceDescriptor;
use tracing::debug;

use crate::application::listeners::{CountHook, CountTransition};
use crate::application::router::{RouterStatsSnapshot, SignalRouter, SignalSink};
use crate::infrastructure::bus::{Bus, BusRequest, SignalHandler};

/// Observable state of one signal's subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    /// Handler attached, `AddMatch` not (yet) confirmed.  A failed `AddMatch`
    /// leaves the subscription here.
    Subscribing,
    Subscribed,
    /// Handler detached, `RemoveMatch` in flight.
    Unsubscribing,
}

/// Which match-rule request a [`PendingRequest`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    AddMatch,
    RemoveMatch,
}

/// A match-rule request that has been written and whose reply is outstanding.
pub struct PendingRequest {
    pub signal: String,
    pub generation: u64,
    pub kind: RequestKind,
    pub rule: String,
    pub reply: BusRequest,
}

struct SubscriptionEntry {
    refcount: usize,
    state: SubscriptionState,
    generation: u64,
    rule: MatchRule,
    handler: SignalHandler,
}

/// A router built for one signal, cached for the proxy's lifetime so the
/// handler attached and the handler later detached are the same `Arc`.
struct CachedRouter {
    router: Arc<SignalRouter>,
    handler: SignalHandler,
}

/// Per-proxy subscription table.
pub struct SubscriptionManager {
    descriptor: Arc<InterfaceDescriptor>,
    bus: Arc<dyn Bus>,
    sink: Weak<dyn SignalSink>,
    entries: HashMap<String, SubscriptionEntry>,
    /// Signals whose `RemoveMatch` is in flight, with that request's generation.
    unsubscribing: HashMap<String, u64>,
    routers: HashMap<String, CachedRouter>,
    generations: SerialCounter,
    pending: Vec<PendingRequest>,
}

impl SubscriptionManager {
    pub fn new(
        descriptor: Arc<InterfaceDescriptor>,
        bus: Arc<dyn Bus>,
        sink: Weak<dyn SignalSink>,
    ) -> Self {
        Self {
            descriptor,
            bus,
            sink,
            entries: HashMap::new(),
            unsubscribing: HashMap::new(),
            routers: HashMap::new(),
            generations: SerialCounter::new(),
            pending: Vec::new(),
        }
    }

    pub fn state(&self, signal: &str) -> SubscriptionState {
        if let Some(entry) = self.entries.get(signal) {
            entry.state
        } else if self.unsubscribing.contains_key(signal) {
            SubscriptionState::Unsubscribing
        } else {
            SubscriptionState::Unsubscribed
        }
    }

    /// Listener count recorded for `signal` (0 if not subscribed).
    pub fn refcount(&self, signal: &str) -> usize {
        self.entries.get(signal).map_or(0, |e| e.refcount)
    }

    /// Names of signals with an active subscription.
    pub fn active_signals(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// The canonical rule string of an active subscription.
    pub fn match_rule(&self, signal: &str) -> Option<String> {
        self.entries.get(signal).map(|e| e.rule.to_string())
    }

    pub fn router_stats(&self, signal: &str) -> Option<RouterStatsSnapshot> {
        self.routers.get(signal).map(|c| c.router.stats())
    }

    /// Drains the requests written since the last call.
    pub fn take_pending(&mut self) -> Vec<PendingRequest> {
        std::mem::take(&mut self.pending)
    }

    /// Tears down every active subscription and returns all requests still
    /// queued, including the `RemoveMatch` requests this writes.
    pub fn unsubscribe_all(&mut self) -> Vec<PendingRequest> {
        for signal in self.active_signals() {
            self.unsubscribe(&signal);
        }
        self.take_pending()
    }

    /// Applies the reply of a request previously returned by
    /// [`SubscriptionManager::take_pending`].  Stale replies are ignored.
    pub fn complete(
        &mut self,
        signal: &str,
        generation: u64,
        kind: RequestKind,
        result: &Result<(), BusError>,
    ) {
        match kind {
            RequestKind::AddMatch => {
                if let Some(entry) = self.entries.get_mut(signal) {
                    if entry.generation == generation
                        && entry.state == SubscriptionState::Subscribing
                        && result.is_ok()
                    {
                        entry.state = SubscriptionState::Subscribed;
                    }
                }
            }
            RequestKind::RemoveMatch => {
                if self.unsubscribing.get(signal) == Some(&generation) {
                    self.unsubscribing.remove(signal);
                }
            }
        }
    }

    /// Returns the cached forwarding handler for `signal`, building it on
    /// first use.
    fn handler_for(&mut self, signal: &str) -> Option<SignalHandler> {
        if let Some(cached) = self.routers.get(signal) {
            return Some(Arc::clone(&cached.handler));
        }
        let descriptor = self.descriptor.signal(signal)?.clone();
        let router = Arc::new(SignalRouter::new(
            Arc::clone(&self.bus),
            self.descriptor.object().bus_name(),
            self.descriptor.name(),
            descriptor,
            self.sink.clone(),
        ));
        let handler = router.handler();
        self.routers.insert(
            signal.to_string(),
            CachedRouter {
                router,
                handler: Arc::clone(&handler),
            },
        );
        Some(handler)
    }

    fn subscribe(&mut self, signal: &str, refcount: usize) {
        let Some(handler) = self.handler_for(signal) else {
            debug!(
                interface = self.descriptor.name(),
                member = signal,
                "listener for undeclared signal; nothing to subscribe"
            );
            return;
        };

        let rule = MatchRule::for_signal(&self.descriptor, signal);
        let key = rule.routing_key().to_string();
        let rule_text = rule.to_string();
        let generation = self.generations.next();

        self.bus.attach_signal_handler(&key, Arc::clone(&handler));
        debug!(rule = %rule_text, "adding match rule");
        let reply = self.bus.add_match(&rule_text);

        self.entries.insert(
            signal.to_string(),
            SubscriptionEntry {
                refcount,
                state: SubscriptionState::Subscribing,
                generation,
                rule,
                handler,
            },
        );
        self.pending.push(PendingRequest {
            signal: signal.to_string(),
            generation,
            kind: RequestKind::AddMatch,
            rule: rule_text,
            reply,
        });
    }

    fn unsubscribe(&mut self, signal: &str) {
        let Some(entry) = self.entries.remove(signal) else {
            return;
        };

        let key = entry.rule.routing_key().to_string();
        self.bus.detach_signal_handler(&key, &entry.handler);

        if !self.bus.is_writable() {
            debug!(
                interface = self.descriptor.name(),
                member = signal,
                "transport not writable; skipping RemoveMatch"
            );
            self.unsubscribing.remove(signal);
            return;
        }

        let rule_text = entry.rule.to_string();
        debug!(rule = %rule_text, "removing match rule");
        let reply = self.bus.remove_match(&rule_text);
        self.unsubscribing
            .insert(signal.to_string(), entry.generation);
        self.pending.push(PendingRequest {
            signal: signal.to_string(),
            generation: entry.generation,
            kind: RequestKind::RemoveMatch,
            rule: rule_text,
            reply,
        });
    }
}

impl CountHook for SubscriptionManager {
    fn count_changed(&mut self, t: CountTransition<'_>) {
        if t.is_first() {
            self.unsubscribing.remove(t.event);
            self.subscribe(t.event, t.current);
        } else if t.is_last() {
            self.unsubscribe(t.event);
        } else if let Some(entry) = self.entries.get_mut(t.event) {
            entry.refcount = t.current;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::listeners::{Emitter, Listener, ListenerRegistry};
    use crate::infrastructure::bus::memory::MemoryBus;
    use dbus_proxy_core::domain::introspection::{ArgNode, InterfaceNode, MemberNode};
    use dbus_proxy_core::protocol::Value;
    use dbus_proxy_core::ObjectRef;

    struct NullSink;

    impl SignalSink for NullSink {
        fn deliver_signal(&self, _member: &str, _body: &[Value]) -> usize {
            0
        }
    }

    fn descriptor() -> Arc<InterfaceDescriptor> {
        let mut node = InterfaceNode::named("com.Example");
        node.signals.push(MemberNode::named(
            "Bar",
            vec![ArgNode::with(&[("type", "u")])],
        ));
        node.signals.push(MemberNode::named("Baz", vec![]));
        let object = ObjectRef::new("org.example.Service", "/org/example").unwrap();
        Arc::new(InterfaceDescriptor::build(object, &node).unwrap())
    }

    fn registry(bus: &Arc<MemoryBus>) -> (ListenerRegistry<SubscriptionManager>, Arc<NullSink>) {
        let sink = Arc::new(NullSink);
        let weak: Weak<NullSink> = Arc::downgrade(&sink);
        let manager =
            SubscriptionManager::new(descriptor(), Arc::clone(bus) as Arc<dyn Bus>, weak);
        (ListenerRegistry::new(manager), sink)
    }

    fn noop() -> Listener {
        Arc::new(|_args: &[Value]| {})
    }

    const BAR_RULE: &str = "type='signal',sender=org.example.Service,interface='com.Example',path='/org/example',member='Bar'";
    const BAR_KEY: &str = r#"{"path":"/org/example","interface":"com.Example","member":"Bar"}"#;

    #[test]
    fn test_first_listener_attaches_handler_and_adds_match_once() {
        // Arrange
        let bus = MemoryBus::shared();
        let (mut reg, _sink) = registry(&bus);

        // Act
        reg.add_listener("Bar", noop());
        reg.add_listener("Bar", noop());
        reg.add_listener("Bar", noop());

        // Assert
        assert_eq!(bus.add_match_requests(), vec![BAR_RULE.to_string()]);
        assert_eq!(bus.handler_count(BAR_KEY), 1);
        assert_eq!(reg.hook().refcount("Bar"), 3);
        assert_eq!(reg.hook().state("Bar"), SubscriptionState::Subscribing);
        assert_eq!(reg.hook_mut().take_pending().len(), 1);
    }

    #[test]
    fn test_last_removal_detaches_and_removes_match_once() {
        // Arrange
        let bus = MemoryBus::shared();
        let (mut reg, _sink) = registry(&bus);
        let a = reg.add_listener("Bar", noop());
        let b = reg.add_listener("Bar", noop());

        // Act
        reg.remove_listener("Bar", a);
        let after_first = bus.remove_match_requests().len();
        reg.remove_listener("Bar", b);

        // Assert
        assert_eq!(after_first, 0, "no RemoveMatch while listeners remain");
        assert_eq!(bus.remove_match_requests(), vec![BAR_RULE.to_string()]);
        assert_eq!(bus.handler_count(BAR_KEY), 0);
        assert_eq!(reg.hook().state("Bar"), SubscriptionState::Unsubscribing);
        assert_eq!(reg.hook().refcount("Bar"), 0);
    }

    #[test]
    fn test_undeclared_signal_never_subscribes() {
        // Arrange
        let bus = MemoryBus::shared();
        let (mut reg, _sink) = registry(&bus);

        // Act
        let id = reg.add_listener("NotDeclared", noop());
        reg.remove_listener("NotDeclared", id);

        // Assert
        assert!(bus.add_match_requests().is_empty());
        assert!(bus.remove_match_requests().is_empty());
        assert_eq!(bus.total_handlers(), 0);
        assert!(reg.hook_mut().take_pending().is_empty());
    }

    #[test]
    fn test_add_reply_moves_to_subscribed_only_for_current_generation() {
        // Arrange
        let bus = MemoryBus::shared();
        let (mut reg, _sink) = registry(&bus);
        let id = reg.add_listener("Bar", noop());
        let first = reg.hook_mut().take_pending().remove(0);
        reg.remove_listener("Bar", id);
        reg.add_listener("Bar", noop());

        // Act – the stale reply of the first subscription arrives late
        reg.hook_mut()
            .complete("Bar", first.generation, first.kind, &Ok(()));

        // Assert
        assert_eq!(reg.hook().state("Bar"), SubscriptionState::Subscribing);
    }

    #[test]
    fn test_failed_add_reply_keeps_handler_attached() {
        // Arrange
        let bus = MemoryBus::shared();
        let (mut reg, _sink) = registry(&bus);
        reg.add_listener("Bar", noop());
        let req = reg.hook_mut().take_pending().remove(0);

        // Act
        let failure = Err(BusError::Transport("boom".to_string()));
        reg.hook_mut()
            .complete(&req.signal, req.generation, req.kind, &failure);

        // Assert
        assert_eq!(reg.hook().state("Bar"), SubscriptionState::Subscribing);
        assert_eq!(bus.handler_count(BAR_KEY), 1);
    }

    #[test]
    fn test_remove_reply_returns_to_unsubscribed() {
        // Arrange
        let bus = MemoryBus::shared();
        let (mut reg, _sink) = registry(&bus);
        let id = reg.add_listener("Bar", noop());
        reg.remove_listener("Bar", id);
        let pending = reg.hook_mut().take_pending();
        let remove = pending
            .iter()
            .find(|p| p.kind == RequestKind::RemoveMatch)
            .expect("RemoveMatch must be queued");

        // Act
        reg.hook_mut()
            .complete(&remove.signal, remove.generation, remove.kind, &Ok(()));

        // Assert
        assert_eq!(reg.hook().state("Bar"), SubscriptionState::Unsubscribed);
    }

    #[test]
    fn test_not_writable_skips_remove_match_but_cleans_up() {
        // Arrange
        let bus = MemoryBus::shared();
        let (mut reg, _sink) = registry(&bus);
        let id = reg.add_listener("Bar", noop());
        bus.set_closed(true);

        // Act
        reg.remove_listener("Bar", id);

        // Assert
        assert!(bus.remove_match_requests().is_empty());
        assert_eq!(bus.handler_count(BAR_KEY), 0);
        assert_eq!(reg.hook().state("Bar"), SubscriptionState::Unsubscribed);
    }

    #[test]
    fn test_resubscribe_reuses_the_same_handler_instance() {
        // Arrange
        let bus = MemoryBus::shared();
        let (mut reg, _sink) = registry(&bus);

        // Act
        let id = reg.add_listener("Bar", noop());
        let first = reg.hook_mut().handler_for("Bar").unwrap();
        reg.remove_listener("Bar", id);
        reg.add_listener("Bar", noop());
        let second = reg.hook_mut().handler_for("Bar").unwrap();

        // Assert
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(bus.handler_count(BAR_KEY), 1);
    }

    #[test]
    fn test_unsubscribe_all_releases_every_signal() {
        // Arrange
        let bus = MemoryBus::shared();
        let (mut reg, _sink) = registry(&bus);
        reg.add_listener("Bar", noop());
        reg.add_listener("Baz", noop());
        reg.hook_mut().take_pending();

        // Act
        let pending = reg.hook_mut().unsubscribe_all();

        // Assert
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|p| p.kind == RequestKind::RemoveMatch));
        assert_eq!(bus.total_handlers(), 0);
        assert!(reg.hook().active_signals().is_empty());
    }

    #[test]
    fn test_signals_are_tracked_independently() {
        let bus = MemoryBus::shared();
        let (mut reg, _sink) = registry(&bus);
        reg.add_listener("Bar", noop());
        let baz = reg.add_listener("Baz", noop());
        reg.remove_listener("Baz", baz);
        assert_eq!(reg.hook().active_signals(), vec!["Bar".to_string()]);
        assert_eq!(bus.add_match_requests().len(), 2);
        assert_eq!(bus.remove_match_requests().len(), 1);
        assert_eq!(reg.hook().match_rule("Bar").as_deref(), Some(BAR_RULE));
    }
}
