//! In-memory bus for tests and offline tooling.
//!
//! [`MemoryBus`] behaves like a connection to a well-behaved daemon, minus
//! the socket: requests succeed immediately (or after [`MemoryBus::hold_replies`]
//! is released), signals are injected with [`MemoryBus::dispatch`], and every
//! request is recorded so tests can assert on it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use dbus_proxy_core::protocol::{BusError, MethodCall, SignalKey, SignalMessage, Value};
use futures_util::FutureExt;
use tokio::sync::watch;

use super::{Bus, BusRequest, SignalHandler};

#[derive(Default)]
struct State {
    add_requests: Vec<String>,
    remove_requests: Vec<String>,
    handlers: HashMap<String, Vec<SignalHandler>>,
    owners: HashMap<String, String>,
    closed: bool,
    add_failure: Option<String>,
    remove_failure: Option<String>,
    errors: Vec<BusError>,
    calls: Vec<MethodCall>,
    replies: HashMap<(String, String), Result<Vec<Value>, BusError>>,
}

/// An in-memory implementation of [`Bus`].
pub struct MemoryBus {
    state: Mutex<State>,
    /// `true` once replies may resolve.  Starts `true`.
    release: watch::Sender<bool>,
}

impl MemoryBus {
    pub fn new() -> Self {
        let (release, _) = watch::channel(true);
        Self {
            state: Mutex::new(State::default()),
            release,
        }
    }

    /// Convenience constructor returning the bus behind an `Arc`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Test controls ────────────────────────────────────────────────────────

    /// Records that `unique_name` owns `bus_name`.
    pub fn set_owner(&self, bus_name: &str, unique_name: &str) {
        self.lock()
            .owners
            .insert(bus_name.to_string(), unique_name.to_string());
    }

    /// Forgets the owner of `bus_name`.
    pub fn clear_owner(&self, bus_name: &str) {
        self.lock().owners.remove(bus_name);
    }

    /// Marks the transport closed (not writable) or open again.
    pub fn set_closed(&self, closed: bool) {
        self.lock().closed = closed;
    }

    /// Makes subsequent `AddMatch` replies fail with `reason`.
    pub fn fail_add_match(&self, reason: &str) {
        self.lock().add_failure = Some(reason.to_string());
    }

    /// Makes subsequent `RemoveMatch` replies fail with `reason`.
    pub fn fail_remove_match(&self, reason: &str) {
        self.lock().remove_failure = Some(reason.to_string());
    }

    /// Holds all match-rule replies until [`MemoryBus::release_replies`].
    /// Requests are still recorded immediately.
    pub fn hold_replies(&self) {
        self.release.send_replace(false);
    }

    /// Lets every held reply resolve.
    pub fn release_replies(&self) {
        self.release.send_replace(true);
    }

    /// Sets the reply for calls to `interface.member`.
    pub fn set_method_reply(
        &self,
        interface: &str,
        member: &str,
        reply: Result<Vec<Value>, BusError>,
    ) {
        self.lock()
            .replies
            .insert((interface.to_string(), member.to_string()), reply);
    }

    // ── Inspection ───────────────────────────────────────────────────────────

    /// Every `AddMatch` rule written, in order.
    pub fn add_match_requests(&self) -> Vec<String> {
        self.lock().add_requests.clone()
    }

    /// Every `RemoveMatch` rule written, in order.
    pub fn remove_match_requests(&self) -> Vec<String> {
        self.lock().remove_requests.clone()
    }

    /// Number of handlers attached under `key`.
    pub fn handler_count(&self, key: &str) -> usize {
        self.lock().handlers.get(key).map_or(0, Vec::len)
    }

    /// Total number of attached handlers across all keys.
    pub fn total_handlers(&self) -> usize {
        self.lock().handlers.values().map(Vec::len).sum()
    }

    /// Errors passed to [`Bus::report_error`], in order.
    pub fn errors(&self) -> Vec<BusError> {
        self.lock().errors.clone()
    }

    /// Method calls received through [`Bus::invoke`], in order.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.lock().calls.clone()
    }

    /// Routes an inbound signal to every handler attached under its key, in
    /// attachment order, and returns how many handlers ran.
    ///
    /// Handlers run after the internal lock is released, so they may call
    /// back into the bus.
    pub fn dispatch(&self, msg: &SignalMessage) -> usize {
        let key = SignalKey::of_message(msg).to_string();
        let handlers = self.lock().handlers.get(&key).cloned().unwrap_or_default();
        for handler in &handlers {
            handler(msg);
        }
        handlers.len()
    }

    fn reply(&self, failure: Option<BusError>) -> BusRequest {
        let mut released = self.release.subscribe();
        async move {
            // Only an error from a dropped sender can end the wait early, and
            // the sender lives as long as the bus.
            let _ = released.wait_for(|ready| *ready).await;
            match failure {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
        .boxed()
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bus for MemoryBus {
    fn add_match(&self, rule: &str) -> BusRequest {
        let failure = {
            let mut state = self.lock();
            state.add_requests.push(rule.to_string());
            if state.closed {
                Some(BusError::ConnectionClosed)
            } else {
                state.add_failure.clone().map(|reason| BusError::MatchRuleRejected {
                    rule: rule.to_string(),
                    reason,
                })
            }
        };
        self.reply(failure)
    }

    fn remove_match(&self, rule: &str) -> BusRequest {
        let failure = {
            let mut state = self.lock();
            state.remove_requests.push(rule.to_string());
            if state.closed {
                Some(BusError::ConnectionClosed)
            } else {
                state.remove_failure.clone().map(|reason| BusError::MatchRuleRejected {
                    rule: rule.to_string(),
                    reason,
                })
            }
        };
        self.reply(failure)
    }

    fn attach_signal_handler(&self, key: &str, handler: SignalHandler) {
        self.lock()
            .handlers
            .entry(key.to_string())
            .or_default()
            .push(handler);
    }

    fn detach_signal_handler(&self, key: &str, handler: &SignalHandler) {
        let mut state = self.lock();
        if let Some(list) = state.handlers.get_mut(key) {
            if let Some(pos) = list.iter().position(|h| Arc::ptr_eq(h, handler)) {
                list.remove(pos);
            }
            if list.is_empty() {
                state.handlers.remove(key);
            }
        }
    }

    fn name_owner(&self, bus_name: &str) -> Option<String> {
        let state = self.lock();
        match state.owners.get(bus_name) {
            Some(owner) => Some(owner.clone()),
            // A unique name is always owned by the connection it names.
            None if bus_name.starts_with(':') => Some(bus_name.to_string()),
            None => None,
        }
    }

    fn is_writable(&self) -> bool {
        !self.lock().closed
    }

    fn report_error(&self, error: BusError) {
        self.lock().errors.push(error);
    }

    async fn invoke(&self, call: MethodCall) -> Result<Vec<Value>, BusError> {
        let reply = {
            let mut state = self.lock();
            if state.closed {
                Err(BusError::ConnectionClosed)
            } else {
                let key = (call.interface.clone(), call.member.clone());
                state.calls.push(call);
                state.replies.get(&key).cloned().unwrap_or_else(|| Ok(Vec::new()))
            }
        };
        reply
    }
}
