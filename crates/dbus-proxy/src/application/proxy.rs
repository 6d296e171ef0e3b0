//! InterfaceProxy: the local façade of one remote interface.
//!
//! A proxy is created from an introspection `<interface>` element and offers
//! two surfaces:
//!
//! - **Methods** – one [`MethodStub`] per declared method, reachable through
//!   [`InterfaceProxy::method`] or the generic [`InterfaceProxy::call`].
//! - **Signals** – listener registration keyed by signal name.  The first
//!   listener of a declared signal subscribes to it on the bus; removing the
//!   last one unsubscribes.  Listeners for undeclared signals are accepted but
//!   never receive anything.
//!
//! # Locking
//!
//! All listener and subscription state lives behind one mutex, so count
//! transitions for a proxy are serialised.  The lock is held while match-rule
//! requests are *written*, never while their replies are awaited and never
//! while listeners run.  Replies are awaited on a task spawned on the current
//! Tokio runtime, or, when the caller is not inside one, on a short-lived
//! current-thread runtime on its own thread.
//!
//! # Architecture
//!
//! ```text
//! add_listener ─► ListenerRegistry ─hook─► SubscriptionManager ─► Bus
//!                                                │
//! Bus dispatch ─► SignalRouter (sender, signature checks)
//!                       │
//!                       └─► InterfaceProxy::deliver_signal ─► listeners
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use dbus_proxy_core::domain::introspection::InterfaceNode;
use dbus_proxy_core::protocol::{BusError, Value};
use dbus_proxy_core::{InterfaceDescriptor, ObjectRef};
use futures_util::future::join_all;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::application::listeners::{notify_all, Emitter, ListenerId, ListenerRegistry};
use crate::application::methods::{build_method_table, CallError, MethodStub};
use crate::application::router::{RouterStatsSnapshot, SignalSink};
use crate::application::subscription::{PendingRequest, SubscriptionManager, SubscriptionState};
use crate::infrastructure::bus::{Bus, BusRequest};

/// Client-side proxy of one interface of one remote object.
///
/// Cloning is cheap and yields a handle to the same proxy.
#[derive(Clone)]
pub struct InterfaceProxy {
    shared: Arc<ProxyShared>,
}

/// A non-owning handle to an [`InterfaceProxy`].
///
/// Listeners that need to reach their own proxy should capture one of these
/// rather than a clone of the proxy.
#[derive(Clone)]
pub struct WeakInterfaceProxy {
    shared: Weak<ProxyShared>,
}

impl WeakInterfaceProxy {
    /// The proxy, if it is still alive.
    pub fn upgrade(&self) -> Option<InterfaceProxy> {
        self.shared.upgrade().map(|shared| InterfaceProxy { shared })
    }
}

struct ProxyShared {
    descriptor: Arc<InterfaceDescriptor>,
    bus: Arc<dyn Bus>,
    methods: HashMap<String, MethodStub>,
    registry: Mutex<ListenerRegistry<SubscriptionManager>>,
}

impl InterfaceProxy {
    /// Builds a proxy for the interface element `node` of `object`.
    ///
    /// Returns `None` when the element is not a valid interface, in which
    /// case the interface should not be exposed at all.
    pub fn new(bus: Arc<dyn Bus>, object: ObjectRef, node: &InterfaceNode) -> Option<Self> {
        let descriptor = InterfaceDescriptor::build(object, node)?;
        Some(Self::from_descriptor(bus, descriptor))
    }

    /// Builds a proxy from an already-validated descriptor.
    pub fn from_descriptor(bus: Arc<dyn Bus>, descriptor: InterfaceDescriptor) -> Self {
        let descriptor = Arc::new(descriptor);
        let methods = build_method_table(&bus, &descriptor);
        let shared = Arc::new_cyclic(|weak: &Weak<ProxyShared>| {
            let sink: Weak<dyn SignalSink> = weak.clone();
            let manager = SubscriptionManager::new(Arc::clone(&descriptor), Arc::clone(&bus), sink);
            ProxyShared {
                descriptor,
                bus,
                methods,
                registry: Mutex::new(ListenerRegistry::new(manager)),
            }
        });
        debug!(
            interface = shared.descriptor.name(),
            path = shared.descriptor.object().path(),
            "interface proxy created"
        );
        Self { shared }
    }

    pub fn name(&self) -> &str {
        self.shared.descriptor.name()
    }

    pub fn object(&self) -> &ObjectRef {
        self.shared.descriptor.object()
    }

    pub fn descriptor(&self) -> &InterfaceDescriptor {
        &self.shared.descriptor
    }

    /// A handle that does not keep the proxy alive.
    pub fn downgrade(&self) -> WeakInterfaceProxy {
        WeakInterfaceProxy {
            shared: Arc::downgrade(&self.shared),
        }
    }

    // ── Methods ──────────────────────────────────────────────────────────────

    /// The generated entry point for `method`, if declared.
    pub fn method(&self, method: &str) -> Option<&MethodStub> {
        self.shared.methods.get(method)
    }

    /// Names of all callable methods, in introspection order.
    pub fn method_names(&self) -> Vec<&str> {
        self.shared
            .descriptor
            .methods()
            .iter()
            .map(|m| m.name.as_str())
            .collect()
    }

    /// Calls `method` by name.
    ///
    /// # Errors
    ///
    /// [`CallError::UnknownMethod`] if the interface does not declare it,
    /// otherwise whatever the remote call fails with.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Vec<Value>, CallError> {
        let stub = self
            .method(method)
            .ok_or_else(|| CallError::UnknownMethod(method.to_string()))?;
        stub.invoke(args).await
    }

    // ── Signals ──────────────────────────────────────────────────────────────

    /// Registers `listener` for `signal`.
    ///
    /// The first listener of a declared signal attaches the forwarding
    /// handler and writes an `AddMatch` request before this returns.
    ///
    /// The proxy owns its listeners.  A listener that captures a clone of
    /// this proxy keeps it alive for as long as it stays registered, and the
    /// unsubscribe that runs when the proxy is dropped never happens.  Capture
    /// [`InterfaceProxy::downgrade`] instead.
    pub fn add_listener<F>(&self, signal: &str, listener: F) -> ListenerId
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let (id, pending) = {
            let mut registry = self.shared.lock();
            let id = registry.add_listener(signal, Arc::new(listener));
            (id, registry.hook_mut().take_pending())
        };
        self.shared.spawn_replies(pending);
        id
    }

    /// Removes one registration.  Returns `false` if `id` is not registered
    /// for `signal`.
    ///
    /// Removing the last listener of a subscribed signal detaches the handler
    /// and, if the transport is writable, writes a `RemoveMatch` request.
    pub fn remove_listener(&self, signal: &str, id: ListenerId) -> bool {
        let (removed, pending) = {
            let mut registry = self.shared.lock();
            let removed = registry.remove_listener(signal, id);
            (removed, registry.hook_mut().take_pending())
        };
        self.shared.spawn_replies(pending);
        removed
    }

    /// Removes every listener of `signal` and returns how many there were.
    pub fn remove_all_listeners(&self, signal: &str) -> usize {
        let (removed, pending) = {
            let mut registry = self.shared.lock();
            let removed = registry.remove_all_listeners(signal);
            (removed, registry.hook_mut().take_pending())
        };
        self.shared.spawn_replies(pending);
        removed
    }

    pub fn listener_count(&self, signal: &str) -> usize {
        self.shared.lock().listener_count(signal)
    }

    /// Signal names with at least one listener, declared or not.
    pub fn event_names(&self) -> Vec<String> {
        self.shared.lock().event_names()
    }

    pub fn subscription_state(&self, signal: &str) -> SubscriptionState {
        self.shared.lock().hook().state(signal)
    }

    /// Declared signals that currently hold a bus subscription.
    pub fn active_subscriptions(&self) -> Vec<String> {
        self.shared.lock().hook().active_signals()
    }

    /// Routing counters for `signal`, once it has been subscribed at least once.
    pub fn router_stats(&self, signal: &str) -> Option<RouterStatsSnapshot> {
        self.shared.lock().hook().router_stats(signal)
    }

    /// Delivers a signal's body to the listeners of `member`, in registration
    /// order, on the calling thread.  Returns how many listeners ran.
    ///
    /// This is the entry point the signal router uses after filtering.
    pub fn deliver_signal(&self, member: &str, body: &[Value]) -> usize {
        self.shared.deliver_signal(member, body)
    }
}

impl ProxyShared {
    fn lock(&self) -> MutexGuard<'_, ListenerRegistry<SubscriptionManager>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Awaits the replies of already-written requests and applies them.
    fn spawn_replies(self: &Arc<Self>, pending: Vec<PendingRequest>) {
        if pending.is_empty() {
            return;
        }
        let tasks: Vec<_> = pending
            .into_iter()
            .map(|request| {
                let weak = Arc::downgrade(self);
                let bus = Arc::clone(&self.bus);
                async move {
                    let PendingRequest {
                        signal,
                        generation,
                        kind,
                        rule,
                        reply,
                    } = request;
                    let result = observe_reply(bus.as_ref(), &rule, reply).await;
                    if let Some(shared) = weak.upgrade() {
                        shared
                            .lock()
                            .hook_mut()
                            .complete(&signal, generation, kind, &result);
                    }
                }
            })
            .collect();
        run_detached(async move {
            join_all(tasks).await;
        });
    }
}

/// Awaits one reply and hands a failure to the bus error channel.
async fn observe_reply(bus: &dyn Bus, rule: &str, reply: BusRequest) -> Result<(), BusError> {
    let result = reply.await;
    if let Err(err) = &result {
        warn!(rule, error = %err, "match rule request failed");
        bus.report_error(err.clone());
    }
    result
}

/// Runs `task` on the current Tokio runtime, or on a current-thread runtime
/// on a thread of its own when called outside one.
fn run_detached<F>(task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(runtime) = Handle::try_current() {
        runtime.spawn(task);
        return;
    }
    let spawned = std::thread::Builder::new()
        .name("dbus-proxy-replies".to_string())
        .spawn(move || {
            match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime.block_on(task),
                Err(err) => warn!(error = %err, "cannot start reply runtime; replies dropped"),
            }
        });
    if let Err(err) = spawned {
        warn!(error = %err, "cannot start reply thread; replies dropped");
    }
}

impl SignalSink for ProxyShared {
    fn deliver_signal(&self, member: &str, body: &[Value]) -> usize {
        let listeners = self.lock().listeners(member);
        notify_all(&listeners, body)
    }
}

impl Drop for ProxyShared {
    fn drop(&mut self) {
        let registry = self
            .registry
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        let pending = registry.hook_mut().unsubscribe_all();
        if pending.is_empty() {
            return;
        }
        // Replies can no longer change this proxy's state; only failures matter.
        let tasks: Vec<_> = pending
            .into_iter()
            .map(|request| {
                let bus = Arc::clone(&self.bus);
                async move {
                    let _ = observe_reply(bus.as_ref(), &request.rule, request.reply).await;
                }
            })
            .collect();
        run_detached(async move {
            join_all(tasks).await;
        });
    }
}
