//! Criterion benchmarks for descriptor building and match-rule formatting.
//!
//! Descriptor building runs once per proxied interface, but large services
//! export interfaces with hundreds of members, so it is measured against the
//! member count.
//!
//! Run with:
//! ```bash
//! cargo bench --package dbus-proxy-core --bench descriptor_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dbus_proxy_core::domain::introspection::{ArgNode, InterfaceNode, MemberNode};
use dbus_proxy_core::{InterfaceDescriptor, MatchRule, ObjectRef};

// ── Fixture builders ──────────────────────────────────────────────────────────

/// An interface with `n` methods (two args each) and `n` signals (one arg each).
fn build_node(n: usize) -> InterfaceNode {
    let mut node = InterfaceNode::named("org.example.Bench");
    for i in 0..n {
        node.methods.push(MemberNode::named(
            &format!("Method{i}"),
            vec![
                ArgNode::with(&[("type", "s"), ("direction", "in")]),
                ArgNode::with(&[("type", "a{sv}"), ("direction", "out")]),
            ],
        ));
        node.signals.push(MemberNode::named(
            &format!("Signal{i}"),
            vec![ArgNode::with(&[("type", "u")])],
        ));
    }
    node
}

fn object() -> ObjectRef {
    ObjectRef::new("org.example.Service", "/org/example/Bench")
        .expect("fixture object must be valid")
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("descriptor_build");
    for n in [1usize, 16, 256] {
        let node = build_node(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &node, |b, node| {
            b.iter(|| InterfaceDescriptor::build(object(), black_box(node)))
        });
    }
    group.finish();
}

fn bench_match_rule(c: &mut Criterion) {
    let desc = InterfaceDescriptor::build(object(), &build_node(1))
        .expect("fixture interface must be valid");
    c.bench_function("match_rule_to_string", |b| {
        b.iter(|| MatchRule::for_signal(black_box(&desc), "Signal0").to_string())
    });
}

criterion_group!(benches, bench_build, bench_match_rule);
criterion_main!(benches);
