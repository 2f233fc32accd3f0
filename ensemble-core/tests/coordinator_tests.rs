//! Coordinator behaviour against an in-memory session store.

use std::cell::Cell;
use std::rc::Rc;

use ensemble_core::{
    Coordinator, CoordinatorError, FixedShape, InstanceId, InstanceRecord, MemoryHandle,
    MemoryStore, Registry, Shape, SharedShape, SharedStore, COUNT_KEY, REGISTRY_KEY,
};
use serde_json::{json, Value};

fn shape(w: f64, h: f64) -> Shape {
    Shape::new(0.0, 0.0, w, h)
}

fn record(id: u64) -> InstanceRecord {
    InstanceRecord {
        id: InstanceId(id),
        shape: shape(800.0, 600.0),
        metadata: Value::Null,
    }
}

fn registry_json(ids: &[u64]) -> String {
    let reg: Registry = ids.iter().copied().map(record).collect::<Vec<_>>().into();
    serde_json::to_string(&reg).expect("serialize")
}

fn stored_registry(session: &MemoryStore) -> Registry {
    let raw = session.raw_get(REGISTRY_KEY).expect("registry persisted");
    serde_json::from_str(&raw).expect("parse registry")
}

fn joined(session: &MemoryStore) -> Coordinator<MemoryHandle, FixedShape> {
    let mut coord = Coordinator::new(session.handle(), FixedShape(shape(800.0, 600.0)));
    coord.init(Value::Null).expect("init");
    coord
}

/// Counts writes made through it while forwarding to a session handle.
struct CountingStore {
    inner: MemoryHandle,
    writes: Rc<Cell<usize>>,
}

impl SharedStore for CountingStore {
    fn get(&self, key: &str) -> Result<Option<String>, ensemble_core::StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ensemble_core::StoreError> {
        self.writes.set(self.writes.get() + 1);
        self.inner.set(key, value)
    }
}

// ---------------------------------------------------------------------------
// 1. Join
// ---------------------------------------------------------------------------

#[test]
fn serial_inits_allocate_one_to_n() {
    let session = MemoryStore::session();
    let coords: Vec<_> = (0..5).map(|_| joined(&session)).collect();

    let ids: Vec<_> = coords.iter().map(|c| c.this_window_id().unwrap()).collect();
    assert_eq!(ids, (1..=5).map(InstanceId).collect::<Vec<_>>());
    assert_eq!(session.raw_get(COUNT_KEY).as_deref(), Some("5"));
    assert_eq!(stored_registry(&session).ids(), ids);
}

#[test]
fn init_records_shape_and_metadata() {
    let session = MemoryStore::session();
    let mut coord = Coordinator::new(session.handle(), FixedShape(shape(1024.0, 768.0)));
    coord.init(json!({ "foo": "bar" })).expect("init");

    let local = coord.this_window().expect("local record");
    assert_eq!(local.shape, shape(1024.0, 768.0));
    assert_eq!(local.metadata, json!({ "foo": "bar" }));
    assert_eq!(stored_registry(&session).0, vec![local.clone()]);
}

#[test]
fn init_notifies_other_instances_of_both_keys() {
    let session = MemoryStore::session();
    let observer = session.handle();
    let _coord = joined(&session);

    let keys: Vec<_> = observer.take_events().into_iter().map(|e| e.key).collect();
    assert_eq!(keys, vec![COUNT_KEY.to_string(), REGISTRY_KEY.to_string()]);
}

#[test]
fn malformed_counter_is_fatal() {
    let session = MemoryStore::session();
    session.raw_set(COUNT_KEY, "seven");
    let mut coord = Coordinator::new(session.handle(), FixedShape(shape(1.0, 1.0)));

    let err = coord.init(Value::Null).unwrap_err();
    assert!(matches!(err, CoordinatorError::MalformedCounter { .. }), "got: {err}");
    assert!(err.to_string().contains("seven"));
    assert_eq!(session.raw_get(REGISTRY_KEY), None, "nothing may be written");
}

#[test]
fn exhausted_counter_is_fatal() {
    let session = MemoryStore::session();
    session.raw_set(COUNT_KEY, &u64::MAX.to_string());
    let mut coord = Coordinator::new(session.handle(), FixedShape(shape(1.0, 1.0)));

    let err = coord.init(Value::Null).unwrap_err();
    assert!(
        matches!(err, CoordinatorError::CounterExhausted { value } if value == u64::MAX),
        "got: {err}"
    );
    assert_eq!(coord.this_window_id(), None);
    assert_eq!(session.raw_get(REGISTRY_KEY), None, "nothing may be written");
    assert_eq!(session.raw_get(COUNT_KEY), Some(u64::MAX.to_string()));
}

#[test]
fn non_finite_shape_cannot_join() {
    let session = MemoryStore::session();
    let mut coord = Coordinator::new(
        session.handle(),
        FixedShape(Shape::new(f64::NAN, 0.0, 800.0, 600.0)),
    );

    let err = coord.init(Value::Null).unwrap_err();
    assert!(matches!(err, CoordinatorError::NonFiniteShape { .. }), "got: {err}");
    assert_eq!(session.raw_get(COUNT_KEY), None);
    assert_eq!(session.raw_get(REGISTRY_KEY), None);
}

#[test]
fn malformed_registry_is_fatal() {
    let session = MemoryStore::session();
    session.raw_set(REGISTRY_KEY, "{not json");
    let mut coord = Coordinator::new(session.handle(), FixedShape(shape(1.0, 1.0)));

    let err = coord.init(Value::Null).unwrap_err();
    assert!(matches!(err, CoordinatorError::MalformedRegistry { .. }), "got: {err}");
    assert_eq!(session.raw_get(COUNT_KEY), None);
}

// ---------------------------------------------------------------------------
// 2. Local shape
// ---------------------------------------------------------------------------

#[test]
fn unchanged_shape_is_a_no_op() {
    let session = MemoryStore::session();
    let writes = Rc::new(Cell::new(0));
    let store = CountingStore {
        inner: session.handle(),
        writes: writes.clone(),
    };
    let mut coord = Coordinator::new(store, FixedShape(shape(800.0, 600.0)));
    coord.init(Value::Null).expect("init");
    let after_init = writes.get();

    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    coord.set_win_shape_change_callback(move |_| counter.set(counter.get() + 1));

    assert!(!coord.update().expect("update"));
    assert!(!coord.update().expect("update"));
    assert_eq!(writes.get(), after_init);
    assert_eq!(fired.get(), 0);
}

#[test]
fn shape_change_updates_cache_fires_once_and_persists() {
    let session = MemoryStore::session();
    let _other = joined(&session);
    let shapes = SharedShape::new(shape(800.0, 600.0));
    let mut coord = Coordinator::new(session.handle(), shapes.clone());
    coord.init(Value::Null).expect("init");

    let seen = Rc::new(Cell::new(0));
    let counter = seen.clone();
    coord.set_win_shape_change_callback(move |record| {
        assert_eq!(record.shape.width, 1024.0);
        counter.set(counter.get() + 1);
    });

    shapes.set(shape(1024.0, 600.0));
    assert!(coord.update().expect("update"));
    assert!(!coord.update().expect("second update"));

    assert_eq!(seen.get(), 1);
    assert_eq!(coord.this_window().unwrap().shape, shape(1024.0, 600.0));
    let id = coord.this_window_id().unwrap();
    let index = coord.window_index_from_id(id).unwrap();
    assert_eq!(coord.windows().0[index].shape, shape(1024.0, 600.0));
    assert_eq!(
        stored_registry(&session).get(id).unwrap().shape,
        shape(1024.0, 600.0)
    );
}

#[test]
fn update_re_adds_local_record_dropped_by_a_stale_writer() {
    let session = MemoryStore::session();
    let shapes = SharedShape::new(shape(800.0, 600.0));
    let mut coord = Coordinator::new(session.handle(), shapes.clone());
    coord.init(Value::Null).expect("init");

    coord
        .handle_remote_change(REGISTRY_KEY, Some(&registry_json(&[9])))
        .expect("remote");
    shapes.set(shape(10.0, 10.0));
    coord.update().expect("update");

    assert_eq!(stored_registry(&session).ids(), vec![InstanceId(9), InstanceId(1)]);
}

#[test]
fn non_finite_shape_is_never_published() {
    let session = MemoryStore::session();
    let shapes = SharedShape::new(shape(800.0, 600.0));
    let mut coord = Coordinator::new(session.handle(), shapes.clone());
    coord.init(Value::Null).expect("init");
    let before = session.raw_get(REGISTRY_KEY);

    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    coord.set_win_shape_change_callback(move |_| counter.set(counter.get() + 1));

    shapes.set(Shape::new(f64::NAN, 0.0, 800.0, 600.0));
    for _ in 0..2 {
        let err = coord.update().unwrap_err();
        assert!(matches!(err, CoordinatorError::NonFiniteShape { .. }), "got: {err}");
    }
    assert_eq!(fired.get(), 0);
    assert_eq!(session.raw_get(REGISTRY_KEY), before);
    assert_eq!(coord.this_window().unwrap().shape, shape(800.0, 600.0));

    let mut peer = Coordinator::new(session.handle(), FixedShape(shape(1.0, 1.0)));
    peer.init(Value::Null).expect("stored registry stays readable");
}

#[test]
fn replacing_shape_callback_drops_the_previous_one() {
    let session = MemoryStore::session();
    let shapes = SharedShape::new(shape(800.0, 600.0));
    let mut coord = Coordinator::new(session.handle(), shapes.clone());
    coord.init(Value::Null).expect("init");

    let first = Rc::new(Cell::new(0));
    let second = Rc::new(Cell::new(0));
    let (a, b) = (first.clone(), second.clone());
    coord.set_win_shape_change_callback(move |_| a.set(a.get() + 1));
    coord.set_win_shape_change_callback(move |_| b.set(b.get() + 1));

    shapes.set(shape(1.0, 1.0));
    coord.update().expect("update");
    assert_eq!((first.get(), second.get()), (0, 1));
}

// ---------------------------------------------------------------------------
// 3. Remote changes
// ---------------------------------------------------------------------------

fn with_cache(ids: &[u64]) -> (MemoryStore, Coordinator<MemoryHandle, FixedShape>, Rc<Cell<usize>>) {
    let session = MemoryStore::session();
    let mut coord = joined(&session);
    coord
        .handle_remote_change(REGISTRY_KEY, Some(&registry_json(ids)))
        .expect("seed cache");
    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    coord.set_win_change_callback(move |_| counter.set(counter.get() + 1));
    (session, coord, fired)
}

#[test]
fn same_length_different_ids_is_a_membership_change() {
    let (_session, mut coord, fired) = with_cache(&[1, 2]);
    let changed = coord
        .handle_remote_change(REGISTRY_KEY, Some(&registry_json(&[1, 3])))
        .expect("remote");
    assert!(changed);
    assert_eq!(fired.get(), 1);
    assert_eq!(coord.windows().ids(), vec![InstanceId(1), InstanceId(3)]);
}

#[test]
fn identical_ids_replace_cache_without_callback() {
    let (_session, mut coord, fired) = with_cache(&[1, 2]);
    let mut moved: Registry = serde_json::from_str(&registry_json(&[1, 2])).unwrap();
    moved.0[1].shape = shape(5.0, 5.0);
    let raw = serde_json::to_string(&moved).unwrap();

    let changed = coord.handle_remote_change(REGISTRY_KEY, Some(&raw)).expect("remote");
    assert!(!changed);
    assert_eq!(fired.get(), 0);
    assert_eq!(coord.windows(), &moved, "cache is replaced regardless");
}

#[test]
fn reordering_counts_as_a_change() {
    let (_session, mut coord, fired) = with_cache(&[1, 2]);
    coord
        .handle_remote_change(REGISTRY_KEY, Some(&registry_json(&[2, 1])))
        .expect("remote");
    assert_eq!(fired.get(), 1);
}

#[test]
fn unwatched_keys_are_ignored() {
    let (_session, mut coord, fired) = with_cache(&[1, 2]);
    let changed = coord.handle_remote_change(COUNT_KEY, Some("12")).expect("remote");
    assert!(!changed);
    assert_eq!(fired.get(), 0);
    assert_eq!(coord.windows().len(), 2);
}

#[test]
fn removed_key_reads_as_empty_registry() {
    let (_session, mut coord, fired) = with_cache(&[1, 2]);
    assert!(coord.handle_remote_change(REGISTRY_KEY, None).expect("remote"));
    assert!(coord.windows().is_empty());
    assert_eq!(fired.get(), 1);
}

#[test]
fn malformed_remote_registry_keeps_cache() {
    let (_session, mut coord, _fired) = with_cache(&[1, 2]);
    let err = coord
        .handle_remote_change(REGISTRY_KEY, Some("[{"))
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::MalformedRegistry { .. }));
    assert_eq!(coord.windows().len(), 2);
}

#[test]
fn registry_write_seen_by_init_is_not_reapplied() {
    let session = MemoryStore::session();
    let handle = session.handle();
    let _peer = joined(&session);

    let mut coord = Coordinator::new(&handle, FixedShape(shape(1.0, 1.0)));
    coord.init(Value::Null).expect("init");
    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    coord.set_win_change_callback(move |_| counter.set(counter.get() + 1));

    for event in handle.take_events() {
        assert!(!coord.handle_event(&event).expect("event"));
    }
    assert_eq!(fired.get(), 0);
    assert_eq!(coord.windows().ids(), vec![InstanceId(1), InstanceId(2)]);

    // Only the first notification is compared; later ones always apply.
    let changed = coord
        .handle_remote_change(REGISTRY_KEY, Some(&registry_json(&[1])))
        .expect("remote");
    assert!(changed);
    assert_eq!(coord.windows().ids(), vec![InstanceId(1)]);
}

#[test]
fn own_writes_never_reach_own_handler() {
    let session = MemoryStore::session();
    let handle = session.handle();
    let peer = session.handle();
    let shapes = SharedShape::new(shape(800.0, 600.0));
    let mut coord = Coordinator::new(&handle, shapes.clone());
    coord.init(Value::Null).expect("init");
    shapes.set(shape(1.0, 2.0));
    coord.update().expect("update");

    assert!(handle.take_events().is_empty());
    assert_eq!(peer.take_events().len(), 3);
}

#[test]
fn peers_learn_about_each_other_through_events() {
    let session = MemoryStore::session();
    let a_handle = session.handle();
    let mut a = Coordinator::new(&a_handle, FixedShape(shape(1.0, 1.0)));
    a.init(Value::Null).expect("init a");
    let joins = Rc::new(Cell::new(0));
    let counter = joins.clone();
    a.set_win_change_callback(move |_| counter.set(counter.get() + 1));

    let b = joined(&session);
    for event in a_handle.take_events() {
        a.handle_event(&event).expect("event");
    }
    assert_eq!(joins.get(), 1);
    assert_eq!(a.windows().ids(), vec![InstanceId(1), InstanceId(2)]);

    b.shutdown().expect("b leaves");
    for event in a_handle.take_events() {
        a.handle_event(&event).expect("event");
    }
    assert_eq!(joins.get(), 2);
    assert_eq!(a.windows().ids(), vec![InstanceId(1)]);
}

// ---------------------------------------------------------------------------
// 4. Departure and lookup
// ---------------------------------------------------------------------------

#[test]
fn shutdown_removes_only_the_local_record() {
    let session = MemoryStore::session();
    let _first = joined(&session);
    let mut second = joined(&session);
    let _third = joined(&session);
    second
        .handle_remote_change(REGISTRY_KEY, Some(&registry_json(&[1, 2, 3])))
        .expect("sync cache");

    second.shutdown().expect("shutdown");
    assert_eq!(
        stored_registry(&session).ids(),
        vec![InstanceId(1), InstanceId(3)]
    );
}

#[test]
fn dropping_an_active_coordinator_departs() {
    let session = MemoryStore::session();
    let observer = session.handle();
    {
        let _coord = joined(&session);
        observer.take_events();
    }
    let events = observer.take_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].new_value.as_deref(), Some("[]"));
}

#[test]
fn shutdown_writes_exactly_once() {
    let session = MemoryStore::session();
    let observer = session.handle();
    let coord = joined(&session);
    observer.take_events();
    coord.shutdown().expect("shutdown");
    assert_eq!(observer.take_events().len(), 1);
}

#[test]
fn index_lookup_uses_none_as_not_found() {
    let (_session, coord, _) = with_cache(&[5, 7]);
    assert_eq!(coord.window_index_from_id(InstanceId(7)), Some(1));
    assert_eq!(coord.window_index_from_id(InstanceId(9)), None);
}
