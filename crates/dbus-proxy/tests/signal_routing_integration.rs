//! Integration tests for inbound signal delivery.
//!
//! Signals are injected with `MemoryBus::dispatch`, which hands them to every
//! handler attached under the message's routing key, exactly as a connection
//! would.  The tests check what reaches the proxy's listeners:
//!
//! ```text
//! dispatch(msg) ─► handler ─► sender == owner? ─► signature ok? ─► listeners
//!                                   │ no                │ no
//!                                   ▼                   ▼
//!                                 drop             drop + warn
//! ```

use std::sync::{Arc, Mutex};

use dbus_proxy::infrastructure::bus::memory::MemoryBus;
use dbus_proxy::infrastructure::bus::Bus;
use dbus_proxy::{InterfaceProxy, RouterStatsSnapshot};
use dbus_proxy_core::domain::introspection::{ArgNode, InterfaceNode, MemberNode};
use dbus_proxy_core::{ObjectRef, SignalMessage, Value};

const SERVICE: &str = "org.example.Service";
const OWNER: &str = ":1.7";

type Seen = Arc<Mutex<Vec<Vec<Value>>>>;

fn make_proxy(bus: &Arc<MemoryBus>) -> InterfaceProxy {
    let mut node = InterfaceNode::named("com.Example");
    node.signals.push(MemberNode::named(
        "Pair",
        vec![
            ArgNode::with(&[("name", "key"), ("type", "s")]),
            ArgNode::with(&[("name", "value"), ("type", "s")]),
        ],
    ));
    node.signals.push(MemberNode::named(
        "Tick",
        vec![ArgNode::with(&[("type", "u")])],
    ));
    let object = ObjectRef::new(SERVICE, "/org/example").unwrap();
    InterfaceProxy::new(Arc::clone(bus) as Arc<dyn Bus>, object, &node).unwrap()
}

fn record(proxy: &InterfaceProxy, signal: &str) -> Seen {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    proxy.add_listener(signal, move |args: &[Value]| {
        sink.lock().unwrap().push(args.to_vec());
    });
    seen
}

fn signal(sender: &str, member: &str, body: Vec<Value>) -> SignalMessage {
    SignalMessage::new(sender, "/org/example", "com.Example", member, body)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_owner_signal_is_delivered_with_positional_args() {
    // Arrange
    let bus = MemoryBus::shared();
    bus.set_owner(SERVICE, OWNER);
    let proxy = make_proxy(&bus);
    let seen = record(&proxy, "Pair");

    // Act
    bus.dispatch(&signal(OWNER, "Pair", vec![Value::from("k"), Value::from("v")]));

    // Assert
    assert_eq!(
        *seen.lock().unwrap(),
        vec![vec![Value::from("k"), Value::from("v")]]
    );
}

#[tokio::test]
async fn test_impostor_signal_is_never_delivered() {
    // Arrange
    let bus = MemoryBus::shared();
    bus.set_owner(SERVICE, OWNER);
    let proxy = make_proxy(&bus);
    let seen = record(&proxy, "Pair");

    // Act – correct signature, wrong sender
    bus.dispatch(&signal(":1.99", "Pair", vec![Value::from("k"), Value::from("v")]));

    // Assert
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(proxy.router_stats("Pair").unwrap().sender_mismatch, 1);
}

#[tokio::test]
async fn test_signature_mismatch_is_dropped_and_counted() {
    // Arrange
    let bus = MemoryBus::shared();
    bus.set_owner(SERVICE, OWNER);
    let proxy = make_proxy(&bus);
    let seen = record(&proxy, "Pair");

    // Act – body signature "s", declared "ss"
    bus.dispatch(&signal(OWNER, "Pair", vec![Value::from("k")]));

    // Assert
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(
        proxy.router_stats("Pair"),
        Some(RouterStatsSnapshot {
            delivered: 0,
            sender_mismatch: 0,
            signature_mismatch: 1,
        })
    );
}

#[tokio::test]
async fn test_nothing_is_delivered_while_name_is_unowned() {
    let bus = MemoryBus::shared();
    let proxy = make_proxy(&bus);
    let seen = record(&proxy, "Tick");
    bus.dispatch(&signal(OWNER, "Tick", vec![Value::from(1u32)]));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_owner_change_takes_effect_immediately() {
    // Arrange
    let bus = MemoryBus::shared();
    bus.set_owner(SERVICE, OWNER);
    let proxy = make_proxy(&bus);
    let seen = record(&proxy, "Tick");

    // Act
    bus.dispatch(&signal(OWNER, "Tick", vec![Value::from(1u32)]));
    bus.set_owner(SERVICE, ":1.8");
    bus.dispatch(&signal(OWNER, "Tick", vec![Value::from(2u32)]));
    bus.dispatch(&signal(":1.8", "Tick", vec![Value::from(3u32)]));

    // Assert
    assert_eq!(
        *seen.lock().unwrap(),
        vec![vec![Value::from(1u32)], vec![Value::from(3u32)]]
    );
}

#[tokio::test]
async fn test_listeners_run_in_registration_order() {
    // Arrange
    let bus = MemoryBus::shared();
    bus.set_owner(SERVICE, OWNER);
    let proxy = make_proxy(&bus);
    let order = Arc::new(Mutex::new(Vec::new()));
    for tag in 0..3 {
        let order = Arc::clone(&order);
        proxy.add_listener("Tick", move |_args: &[Value]| {
            order.lock().unwrap().push(tag);
        });
    }

    // Act
    bus.dispatch(&signal(OWNER, "Tick", vec![Value::from(0u32)]));

    // Assert
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_two_proxies_of_one_object_each_receive_the_signal() {
    // Arrange
    let bus = MemoryBus::shared();
    bus.set_owner(SERVICE, OWNER);
    let first = make_proxy(&bus);
    let second = make_proxy(&bus);
    let a = record(&first, "Tick");
    let b = record(&second, "Tick");

    // Act
    let handlers = bus.dispatch(&signal(OWNER, "Tick", vec![Value::from(9u32)]));

    // Assert
    assert_eq!(handlers, 2);
    assert_eq!(a.lock().unwrap().len(), 1);
    assert_eq!(b.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_signal_after_last_listener_removed_is_not_routed() {
    // Arrange
    let bus = MemoryBus::shared();
    bus.set_owner(SERVICE, OWNER);
    let proxy = make_proxy(&bus);
    let id = proxy.add_listener("Tick", |_args: &[Value]| {});
    proxy.remove_listener("Tick", id);

    // Act
    let handlers = bus.dispatch(&signal(OWNER, "Tick", vec![Value::from(1u32)]));

    // Assert
    assert_eq!(handlers, 0);
    assert_eq!(proxy.router_stats("Tick").unwrap().delivered, 0);
}
