//! Integration Tests for the Reactive Runtime
//!
//! These tests drive the runtime through its public surface the way a host
//! VM would: create, derive, register callbacks, mutate.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use swarm_reactive::{Datum, Error, Operator, ReactiveId, Runtime, RuntimeConfig, Value};

/// Creating the same value twice yields the same id.
#[test]
fn create_is_idempotent() {
    let mut rt = Runtime::default();
    let value = Value::int(1);

    let first = rt.create(&value).unwrap();
    let second = rt.create(&value).unwrap();

    assert_eq!(first, second);
    assert_eq!(rt.len(), 1);
}

/// Every id in the full space is handed out exactly once, then creation fails.
#[test]
fn id_space_is_unique_and_bounded() {
    let mut rt = Runtime::default();
    let mut seen = HashSet::new();

    for i in 0..65535i64 {
        let id = rt.create(&Value::int(i)).unwrap();
        assert!(id.get() >= 1);
        assert!(seen.insert(id));
    }
    assert_eq!(seen.len(), 65535);

    let overflow = Value::int(-1);
    let err = rt.create(&overflow).unwrap_err();
    assert!(matches!(err, Error::IdSpaceExhausted { limit: 65535 }));
    assert_eq!(rt.len(), 65535);
    assert!(!overflow.is_reactive());
}

/// A configured limit caps the id space below 65535.
#[test]
fn configured_limit_exhausts_early() {
    let mut rt = Runtime::new(RuntimeConfig::new().with_id_limit(2));
    rt.create(&Value::int(0)).unwrap();
    rt.create(&Value::int(0)).unwrap();

    assert!(matches!(
        rt.create(&Value::int(0)),
        Err(Error::IdSpaceExhausted { limit: 2 })
    ));
}

struct Diamond {
    rt: Runtime,
    a: Value,
    b: Value,
    c: Value,
    d: Value,
    ids: [ReactiveId; 4],
}

/// a -> b = a * 2, a -> c = a + 100, d = b + c
fn diamond() -> Diamond {
    let mut rt = Runtime::default();
    let a = Value::int(1);
    let a_id = rt.create(&a).unwrap();
    let b = Value::int(0);
    let b_id = rt.derive(&b, Operator::Mul, a_id, 2i64).unwrap();
    let c = Value::int(0);
    let c_id = rt.derive(&c, Operator::Add, a_id, 100i64).unwrap();
    let d = Value::int(0);
    let d_id = rt.derive(&d, Operator::Add, b_id, c_id).unwrap();

    Diamond {
        rt,
        a,
        b,
        c,
        d,
        ids: [a_id, b_id, c_id, d_id],
    }
}

/// The join of a diamond sees both post-update parents.
#[test]
fn diamond_join_uses_updated_parents() {
    let Diamond { mut rt, a, b, c, d, ids } = diamond();
    let [_, b_id, c_id, d_id] = ids;
    assert_eq!(d.get(), Datum::Int(2 + 101));

    let propagation = rt.set(&a, 10i64).unwrap();

    assert_eq!(b.get(), Datum::Int(20));
    assert_eq!(c.get(), Datum::Int(110));
    assert_eq!(d.get(), Datum::Int(130));

    let order = propagation.dirty.as_slice();
    let pos = |id| order.iter().position(|&x| x == id).unwrap();
    assert!(pos(b_id) < pos(d_id));
    assert!(pos(c_id) < pos(d_id));
}

/// The join of a diamond is recomputed, and notified, once per propagation.
#[test]
fn diamond_join_recomputes_once() {
    let Diamond { mut rt, a, ids, .. } = diamond();
    let d_id = ids[3];
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    rt.on_change(d_id, move |_| {
        counter.set(counter.get() + 1);
        Ok(())
    })
    .unwrap();

    let propagation = rt.set(&a, 3i64).unwrap();

    assert_eq!(propagation.dirty.iter().filter(|&&x| x == d_id).count(), 1);
    assert_eq!(calls.get(), 1);
}

/// Mutual dependency fails the pass and leaves both values untouched.
#[test]
fn cycle_is_rejected_without_writes() {
    let mut rt = Runtime::default();
    let a = Value::int(1);
    let a_id = rt.create(&a).unwrap();
    let b = Value::int(2);
    let b_id = rt.create(&b).unwrap();
    rt.bind(a_id, Operator::Add, b_id, 1i64).unwrap();
    rt.bind(b_id, Operator::Add, a_id, 1i64).unwrap();

    let fired = Rc::new(Cell::new(false));
    for id in [a_id, b_id] {
        let flag = fired.clone();
        rt.on_change(id, move |_| {
            flag.set(true);
            Ok(())
        })
        .unwrap();
    }

    let err = rt.recalculate(a_id).unwrap_err();
    assert!(matches!(err, Error::CyclicDependency { .. }));
    assert!(err.is_clean_abort());
    assert_eq!(a.get(), Datum::Int(1));
    assert_eq!(b.get(), Datum::Int(2));

    let err = rt.recalculate(b_id).unwrap_err();
    assert!(matches!(err, Error::CyclicDependency { .. }));
    assert_eq!(a.get(), Datum::Int(1));
    assert_eq!(b.get(), Datum::Int(2));
    assert!(!fired.get());
}

/// Assigning to a member of a cycle is refused before the assignment lands.
#[test]
fn set_on_cycle_keeps_prior_values() {
    let mut rt = Runtime::default();
    let a = Value::int(1);
    let a_id = rt.create(&a).unwrap();
    let b = Value::int(2);
    let b_id = rt.create(&b).unwrap();
    rt.bind(a_id, Operator::Add, b_id, 1i64).unwrap();
    rt.bind(b_id, Operator::Add, a_id, 1i64).unwrap();

    let err = rt.set(&a, 99i64).unwrap_err();
    assert!(matches!(err, Error::CyclicDependency { .. }));
    assert_eq!(a.get(), Datum::Int(1));
    assert_eq!(b.get(), Datum::Int(2));

    let err = rt.set(&b, 42i64).unwrap_err();
    assert!(matches!(err, Error::CyclicDependency { .. }));
    assert_eq!(a.get(), Datum::Int(1));
    assert_eq!(b.get(), Datum::Int(2));
}

/// A value registered with one VM's runtime does not drive another's graph.
#[test]
fn values_do_not_cross_runtimes() {
    let Diamond { mut rt, d, ids, .. } = diamond();
    let mut other = Runtime::default();
    let stranger = Value::int(0);
    assert_eq!(other.create(&stranger).unwrap(), ids[0]);

    let err = rt.set(&stranger, 10i64).unwrap_err();

    assert!(matches!(err, Error::NotFound(id) if id == ids[0]));
    assert_eq!(stranger.get(), Datum::Int(0));
    assert_eq!(d.get(), Datum::Int(103));
}

/// Integer and float arithmetic follow the promotion table.
#[test]
fn numeric_promotion() {
    let mut rt = Runtime::default();
    let four = Value::int(4);
    let four_id = rt.create(&four).unwrap();
    let five = Value::int(5);
    let five_id = rt.create(&five).unwrap();

    let exact = Value::int(0);
    rt.derive(&exact, Operator::Div, four_id, 2i64).unwrap();
    let truncated = Value::int(0);
    rt.derive(&truncated, Operator::Div, five_id, 2i64).unwrap();
    let promoted = Value::int(0);
    rt.derive(&promoted, Operator::Div, five_id, 2.0f64).unwrap();

    assert_eq!(exact.get(), Datum::Int(2));
    assert_eq!(truncated.get(), Datum::Int(2));
    assert_eq!(promoted.get(), Datum::Float(2.5));
}

/// Callbacks on a node run in registration order, each once.
#[test]
fn callbacks_run_fifo() {
    let mut rt = Runtime::default();
    let a = Value::int(0);
    let a_id = rt.create(&a).unwrap();
    let b = Value::int(0);
    let b_id = rt.derive(&b, Operator::Sub, a_id, 1i64).unwrap();

    let log = Rc::new(RefCell::new(Vec::new()));
    for name in ["c1", "c2"] {
        let log = log.clone();
        rt.on_change(b_id, move |call| {
            log.borrow_mut().push((name, call.id(), call.value().get()));
            Ok(())
        })
        .unwrap();
    }

    let propagation = rt.set(&a, 10i64).unwrap();

    assert_eq!(propagation.callbacks, 2);
    assert_eq!(
        *log.borrow(),
        vec![("c1", b_id, Datum::Int(9)), ("c2", b_id, Datum::Int(9))]
    );
}

/// Mutating a leaf nobody reads does nothing.
#[test]
fn leaf_without_dependents_is_noop() {
    let mut rt = Runtime::default();
    let a = Value::int(0);
    let a_id = rt.create(&a).unwrap();
    let fired = Rc::new(Cell::new(false));
    let flag = fired.clone();
    rt.on_change(a_id, move |_| {
        flag.set(true);
        Ok(())
    })
    .unwrap();

    let propagation = rt.set(&a, 5i64).unwrap();

    assert!(propagation.dirty.is_empty());
    assert_eq!(propagation.callbacks, 0);
    assert!(!fired.get());
}

/// Only the subgraph reachable from the change participates.
#[test]
fn unreachable_derived_values_are_untouched() {
    let mut rt = Runtime::default();
    let a = Value::int(1);
    let a_id = rt.create(&a).unwrap();
    let x = Value::int(1);
    let x_id = rt.create(&x).unwrap();
    let from_a = Value::int(0);
    rt.derive(&from_a, Operator::Add, a_id, 1i64).unwrap();
    let from_x = Value::int(0);
    rt.derive(&from_x, Operator::Add, x_id, 1i64).unwrap();

    // Change x behind the runtime's back; only a propagates.
    x.set(50i64);
    rt.set(&a, 2i64).unwrap();

    assert_eq!(from_a.get(), Datum::Int(3));
    assert_eq!(from_x.get(), Datum::Int(2));
}

/// A callback fault stops dispatch; values already refreshed stay refreshed.
#[test]
fn callback_fault_keeps_value_updates() {
    let Diamond { mut rt, a, d, ids, .. } = diamond();
    let [_, b_id, _, d_id] = ids;
    rt.on_change(b_id, |_| Err("sensor offline".into())).unwrap();
    let reached = Rc::new(Cell::new(false));
    let flag = reached.clone();
    rt.on_change(d_id, move |_| {
        flag.set(true);
        Ok(())
    })
    .unwrap();

    let err = rt.set(&a, 2i64).unwrap_err();

    assert!(matches!(err, Error::Callback { id, .. } if id == b_id));
    assert_eq!(d.get(), Datum::Int(4 + 102));
    assert!(!reached.get());
}

/// Unsupported operand types surface as evaluation errors.
#[test]
fn string_operand_is_evaluation_error() {
    let mut rt = Runtime::default();
    let a = Value::int(0);
    let a_id = rt.create(&a).unwrap();
    let b = Value::int(0);
    let b_id = rt.derive(&b, Operator::Add, a_id, 1i64).unwrap();

    let err = rt.set(&a, "north").unwrap_err();

    assert!(matches!(err, Error::Evaluation { id, .. } if id == b_id));
    assert_eq!(b.get(), Datum::Int(1));
}

/// Teardown releases the graph and leaves host values usable.
#[test]
fn teardown_releases_everything() {
    let Diamond { mut rt, a, d, .. } = diamond();

    rt.destroy_all();

    assert!(rt.is_empty());
    assert!(!a.is_reactive());
    let propagation = rt.set(&a, 9i64).unwrap();
    assert!(propagation.is_noop());
    assert_eq!(d.get(), Datum::Int(103));
}

/// Snapshots reflect the graph a host script built.
#[test]
fn snapshot_round_trips_through_json() {
    let Diamond { rt, ids, .. } = diamond();
    let [a_id, b_id, c_id, d_id] = ids;

    let snapshot = rt.snapshot();
    let a_node = snapshot.get(a_id).unwrap();
    assert_eq!(a_node.dependents, vec![b_id, c_id]);
    assert_eq!(snapshot.get(d_id).unwrap().value, Datum::Int(103));

    let json = snapshot.to_json().unwrap();
    assert_eq!(swarm_reactive::GraphSnapshot::from_json(&json).unwrap(), snapshot);
}
