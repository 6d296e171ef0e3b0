//! Event-listener registry with a count-transition hook.
//!
//! Listeners are registered per event name, may be registered many times
//! under the same name, and run in registration order.  Every change to an
//! event's listener count is reported *synchronously* to a [`CountHook`]
//! before the registering call returns.  The proxy plugs its subscription
//! manager in as that hook, which is how a first listener turns into a match
//! rule and a last removal turns it back off.
//!
//! ```text
//! add_listener("Bar")     count 0 → 1   hook: transition(Bar, 0, 1)
//! add_listener("Bar")     count 1 → 2   hook: transition(Bar, 1, 2)
//! remove_listener("Bar")  count 2 → 1   hook: transition(Bar, 2, 1)
//! remove_listener("Bar")  count 1 → 0   hook: transition(Bar, 1, 0)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use dbus_proxy_core::protocol::{SerialCounter, Value};

/// A registered callback.  Receives the event's positional arguments.
pub type Listener = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Handle identifying one registration, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// One change of an event's listener count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountTransition<'a> {
    pub event: &'a str,
    pub previous: usize,
    pub current: usize,
}

impl CountTransition<'_> {
    /// The event went from no listeners to one.
    pub fn is_first(&self) -> bool {
        self.previous == 0 && self.current > 0
    }

    /// The event went from one listener to none.
    pub fn is_last(&self) -> bool {
        self.previous > 0 && self.current == 0
    }
}

/// Observer of listener-count changes.
pub trait CountHook {
    fn count_changed(&mut self, transition: CountTransition<'_>);
}

/// No-op hook for registries nobody observes.
impl CountHook for () {
    fn count_changed(&mut self, _transition: CountTransition<'_>) {}
}

/// The listener registration surface.
pub trait Emitter {
    /// Registers `listener` under `event` and returns its handle.
    fn add_listener(&mut self, event: &str, listener: Listener) -> ListenerId;

    /// Removes the registration `id` from `event`.  Returns `false` if it was
    /// not registered there.
    fn remove_listener(&mut self, event: &str, id: ListenerId) -> bool;

    /// Removes every listener of `event`, one at a time, and returns how many
    /// were removed.
    fn remove_all_listeners(&mut self, event: &str) -> usize;

    /// Snapshot of the listeners of `event`, in registration order.
    fn listeners(&self, event: &str) -> Vec<Listener>;

    fn listener_count(&self, event: &str) -> usize {
        self.listeners(event).len()
    }

    /// Calls every listener of `event` with `args` and returns how many ran.
    ///
    /// Runs on a snapshot, so a listener that adds or removes listeners does
    /// not affect the current emission.
    fn emit(&self, event: &str, args: &[Value]) -> usize {
        notify_all(&self.listeners(event), args)
    }
}

/// Calls each listener of a snapshot with `args`, in order, and returns how
/// many ran.
///
/// Callers take the snapshot first and release any lock guarding the
/// registry, so listeners may register or remove listeners themselves.
pub fn notify_all(listeners: &[Listener], args: &[Value]) -> usize {
    for listener in listeners {
        listener(args);
    }
    listeners.len()
}

/// The standard [`Emitter`] implementation.
pub struct ListenerRegistry<H> {
    listeners: HashMap<String, Vec<(ListenerId, Listener)>>,
    serials: SerialCounter,
    hook: H,
}

impl<H: CountHook> ListenerRegistry<H> {
    pub fn new(hook: H) -> Self {
        Self {
            listeners: HashMap::new(),
            serials: SerialCounter::new(),
            hook,
        }
    }

    pub fn hook(&self) -> &H {
        &self.hook
    }

    pub fn hook_mut(&mut self) -> &mut H {
        &mut self.hook
    }

    /// Names of all events that currently have at least one listener.
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.listeners.keys().cloned().collect();
        names.sort();
        names
    }
}

impl<H: CountHook> Emitter for ListenerRegistry<H> {
    fn add_listener(&mut self, event: &str, listener: Listener) -> ListenerId {
        let id = ListenerId(self.serials.next());
        let list = self.listeners.entry(event.to_string()).or_default();
        list.push((id, listener));
        let current = list.len();
        self.hook.count_changed(CountTransition {
            event,
            previous: current - 1,
            current,
        });
        id
    }

    fn remove_listener(&mut self, event: &str, id: ListenerId) -> bool {
        let Some(list) = self.listeners.get_mut(event) else {
            return false;
        };
        let Some(pos) = list.iter().position(|(lid, _)| *lid == id) else {
            return false;
        };
        list.remove(pos);
        let current = list.len();
        if current == 0 {
            self.listeners.remove(event);
        }
        self.hook.count_changed(CountTransition {
            event,
            previous: current + 1,
            current,
        });
        true
    }

    fn remove_all_listeners(&mut self, event: &str) -> usize {
        let ids: Vec<ListenerId> = self
            .listeners
            .get(event)
            .map(|list| list.iter().map(|(id, _)| *id).collect())
            .unwrap_or_default();
        // Newest first, so each step is an ordinary single removal.
        ids.iter()
            .rev()
            .filter(|id| self.remove_listener(event, **id))
            .count()
    }

    fn listeners(&self, event: &str) -> Vec<Listener> {
        self.listeners
            .get(event)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }

    fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every transition it sees.
    #[derive(Default)]
    struct RecordingHook {
        transitions: Vec<(String, usize, usize)>,
    }

    impl CountHook for RecordingHook {
        fn count_changed(&mut self, t: CountTransition<'_>) {
            self.transitions
                .push((t.event.to_string(), t.previous, t.current));
        }
    }

    fn noop() -> Listener {
        Arc::new(|_args: &[Value]| {})
    }

    #[test]
    fn test_hook_sees_every_transition() {
        // Arrange
        let mut reg = ListenerRegistry::new(RecordingHook::default());

        // Act
        let a = reg.add_listener("Bar", noop());
        let b = reg.add_listener("Bar", noop());
        reg.remove_listener("Bar", a);
        reg.remove_listener("Bar", b);

        // Assert
        assert_eq!(
            reg.hook().transitions,
            vec![
                ("Bar".to_string(), 0, 1),
                ("Bar".to_string(), 1, 2),
                ("Bar".to_string(), 2, 1),
                ("Bar".to_string(), 1, 0),
            ]
        );
    }

    #[test]
    fn test_removing_unknown_listener_reports_nothing() {
        // Arrange
        let mut reg = ListenerRegistry::new(RecordingHook::default());
        let id = reg.add_listener("Bar", noop());

        // Act
        let wrong_event = reg.remove_listener("Baz", id);
        let removed = reg.remove_listener("Bar", id);
        let twice = reg.remove_listener("Bar", id);

        // Assert
        assert!(!wrong_event);
        assert!(removed);
        assert!(!twice, "a listener is removed at most once");
        assert_eq!(reg.hook().transitions.len(), 2);
        assert_eq!(reg.listener_count("Bar"), 0);
    }

    #[test]
    fn test_remove_all_decrements_once_per_listener() {
        // Arrange
        let mut reg = ListenerRegistry::new(RecordingHook::default());
        for _ in 0..3 {
            reg.add_listener("Bar", noop());
        }

        // Act
        let removed = reg.remove_all_listeners("Bar");

        // Assert
        assert_eq!(removed, 3);
        let tail: Vec<_> = reg.hook().transitions[3..].to_vec();
        assert_eq!(
            tail,
            vec![
                ("Bar".to_string(), 3, 2),
                ("Bar".to_string(), 2, 1),
                ("Bar".to_string(), 1, 0),
            ]
        );
        assert!(reg.event_names().is_empty());
    }

    #[test]
    fn test_emit_calls_listeners_in_registration_order() {
        // Arrange
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut reg = ListenerRegistry::new(());
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            reg.add_listener(
                "Bar",
                Arc::new(move |args: &[Value]| {
                    order.lock().unwrap().push((tag, args.len()));
                }),
            );
        }

        // Act
        let ran = reg.emit("Bar", &[Value::from(1u32), Value::from("x")]);

        // Assert
        assert_eq!(ran, 3);
        assert_eq!(
            *order.lock().unwrap(),
            vec![("first", 2), ("second", 2), ("third", 2)]
        );
    }

    #[test]
    fn test_notify_all_runs_a_snapshot_taken_before_changes() {
        // Arrange
        let hits = Arc::new(Mutex::new(0));
        let mut reg = ListenerRegistry::new(());
        let h = Arc::clone(&hits);
        reg.add_listener("Bar", Arc::new(move |_args: &[Value]| *h.lock().unwrap() += 1));
        let snapshot = reg.listeners("Bar");
        reg.add_listener("Bar", noop());

        // Act
        let ran = notify_all(&snapshot, &[]);

        // Assert
        assert_eq!(ran, 1);
        assert_eq!(*hits.lock().unwrap(), 1);
        assert_eq!(reg.listener_count("Bar"), 2);
    }

    #[test]
    fn test_emit_without_listeners_is_inert() {
        let reg = ListenerRegistry::new(());
        assert_eq!(reg.emit("Nothing", &[]), 0);
    }

    #[test]
    fn test_same_callback_registered_twice_counts_twice() {
        let mut reg = ListenerRegistry::new(());
        let l = noop();
        let a = reg.add_listener("Bar", Arc::clone(&l));
        let b = reg.add_listener("Bar", l);
        assert_ne!(a, b);
        assert_eq!(reg.listener_count("Bar"), 2);
        assert_eq!(reg.event_names(), vec!["Bar".to_string()]);
    }
}
