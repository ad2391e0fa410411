use std::cell::{Cell, RefCell};
use std::rc::Rc;

use collection_literals::btree;

use pathstate_core::{path, Engine, NotifyOptions, Path, Registration, Target, Value, WrapConfig};

fn counter(engine: &Engine, at: &str) -> (Rc<Cell<usize>>, Registration) {
    let hits = Rc::new(Cell::new(0));
    let sink = hits.clone();
    let registration = engine.register_path(path!(at), move |_| sink.set(sink.get() + 1));
    (hits, registration)
}

#[test]
fn test_exact_delivery() {
    let engine = Engine::new();
    let target = Target::new(Value::Map(btree! {
        "count".to_string() => Value::from(0),
        "name".to_string() => Value::from("a"),
    }));
    let store = engine.wrap(&target).unwrap();

    let (l1, _r1) = counter(&engine, "count");
    let (l2, _r2) = counter(&engine, "name");

    store.set("count", 1).unwrap();

    assert_eq!(l1.get(), 1);
    assert_eq!(l2.get(), 0);
}

#[test]
fn test_propagation_to_ancestors_and_descendants() {
    let engine = Engine::new();
    let target = Target::new(Value::Map(btree! {
        "a".to_string() => Value::Map(btree! {
            "b".to_string() => Value::Map(btree! {
                "c".to_string() => Value::Map(btree! {
                    "d".to_string() => Value::from(1),
                }),
            }),
            "d".to_string() => Value::from(2),
        }),
    }));
    let store = engine.wrap(&target).unwrap();

    let (a, _ra) = counter(&engine, "a");
    let (ab, _rab) = counter(&engine, "a.b");
    let (abc, _rabc) = counter(&engine, "a.b.c");
    let (abcd, _rabcd) = counter(&engine, "a.b.c.d");
    let (ad, _rad) = counter(&engine, "a.d");

    let b = store.child("a").and_then(|a| a.child("b")).unwrap();
    b.set("c", Value::Map(btree! { "d".to_string() => Value::from(5) }))
        .unwrap();

    assert_eq!(a.get(), 1);
    assert_eq!(ab.get(), 1);
    assert_eq!(abc.get(), 1);
    assert_eq!(abcd.get(), 1);
    assert_eq!(ad.get(), 0);
}

#[test]
fn test_array_push_coherence() {
    let engine = Engine::new();
    let target = Target::new(Value::Map(btree! {
        "items".to_string() => Value::from(vec!["x", "y"]),
    }));
    let store = engine.wrap(&target).unwrap();
    let items = store.child("items").unwrap();

    let (array, _r1) = counter(&engine, "items");
    let (length, _r2) = counter(&engine, "items.length");
    let (slot, _r3) = counter(&engine, "items.2");

    items.push("z").unwrap();

    assert_eq!(array.get(), 1);
    assert_eq!(length.get(), 1);
    assert_eq!(slot.get(), 1);
    assert_eq!(
        target.read().get(&path!("items")),
        Some(&Value::from(vec!["x", "y", "z"]))
    );
}

#[test]
fn test_array_removal_notifies_old_range() {
    let engine = Engine::new();
    let target = Target::new(Value::from(vec![1, 2, 3, 4]));
    let store = engine.wrap(&target).unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let registrations: Vec<Registration> = (0..4)
        .map(|index| {
            let sink = seen.clone();
            engine.register_path(Path::root().child_index(index), move |_| {
                sink.borrow_mut().push(index)
            })
        })
        .collect();

    store.splice(1, 2, Vec::new()).unwrap();

    assert_eq!(*seen.borrow(), vec![0, 1, 2, 3]);
    assert_eq!(store.snapshot(), Value::from(vec![1, 4]));
    drop(registrations);
}

#[test]
fn test_identity_stability() {
    let engine = Engine::new();
    let target = Target::new(Value::map());

    let a = engine.wrap(&target).unwrap();
    let b = engine.wrap(&target).unwrap();
    assert!(a.ptr_eq(&b));

    let quiet = WrapConfig {
        notify: NotifyOptions::exact(),
        track_reads: false,
    };
    let c = engine.wrap_at(&target, Path::root(), quiet).unwrap();
    let d = engine.wrap_at(&target, Path::root(), quiet).unwrap();
    assert!(!a.ptr_eq(&c));
    assert!(c.ptr_eq(&d));
}

#[test]
fn test_equal_value_write_is_silent() {
    let engine = Engine::new();
    let target = Target::new(Value::Map(btree! {
        "user".to_string() => Value::Map(btree! {
            "name".to_string() => Value::from("a"),
            "tags".to_string() => Value::from(vec!["x"]),
        }),
    }));
    let store = engine.wrap(&target).unwrap();

    let hits = Rc::new(Cell::new(0));
    let sink = hits.clone();
    let _global = engine.register_global(move |_| sink.set(sink.get() + 1));

    let same = target.read().get(&path!("user")).cloned().unwrap();
    assert!(!store.set("user", same).unwrap());
    assert!(!store.child("user").unwrap().set("name", "a").unwrap());

    assert_eq!(hits.get(), 0);
}

#[test]
fn test_scenario_counter_and_name() {
    let engine = Engine::new();
    let target = Target::new(Value::Map(btree! {
        "count".to_string() => Value::from(0),
        "name".to_string() => Value::from("a"),
    }));
    let store = engine.wrap(&target).unwrap();

    let (l1, _r1) = counter(&engine, "count");
    let (l2, _r2) = counter(&engine, "name");

    store.set("count", 1).unwrap();

    assert_eq!(l1.get(), 1);
    assert_eq!(l2.get(), 0);
    assert_eq!(store.get("count"), Some(Value::from(1)));
}

#[test]
fn test_scenario_append_fires_container_and_length() {
    let engine = Engine::new();
    let target = Target::new(Value::Map(btree! {
        "items".to_string() => Value::from(vec!["x", "y"]),
    }));
    let store = engine.wrap(&target).unwrap();

    let (array, _r1) = counter(&engine, "items");
    let (length, _r2) = counter(&engine, "items.length");

    store.child("items").unwrap().push("z").unwrap();

    assert!(array.get() >= 1);
    assert!(length.get() >= 1);
    assert_eq!(
        store.child("items").unwrap().snapshot(),
        Value::from(vec!["x", "y", "z"])
    );
}

#[test]
fn test_scenario_whole_object_replace_reaches_descendant() {
    let engine = Engine::new();
    let target = Target::new(Value::Map(btree! {
        "user".to_string() => Value::Map(btree! {
            "name".to_string() => Value::from("a"),
        }),
    }));
    let store = engine.wrap(&target).unwrap();

    let (name, _r) = counter(&engine, "user.name");

    store
        .set("user", Value::Map(btree! { "name".to_string() => Value::from("b") }))
        .unwrap();

    assert_eq!(name.get(), 1);
    assert_eq!(
        store.child("user").unwrap().get("name"),
        Some(Value::from("b"))
    );
}

#[test]
fn test_subscription_end_to_end() {
    let engine = Engine::new();
    let target = Target::new(Value::Map(btree! {
        "todos".to_string() => Value::Array(vec![
            Value::Map(btree! {
                "title".to_string() => Value::from("write"),
                "done".to_string() => Value::from(false),
            }),
        ]),
        "filter".to_string() => Value::from("all"),
    }));
    let store = engine.wrap(&target).unwrap();

    let remaining = engine.subscribe(&store, |store| {
        let todos = match store.child("todos") {
            Some(todos) => todos,
            None => return Value::from(0),
        };
        let open = (0..todos.len())
            .filter_map(|i| todos.child(&i.to_string()))
            .filter(|todo| todo.get("done") == Some(Value::from(false)))
            .count();
        Value::from(open)
    });
    let invalidations = Rc::new(Cell::new(0));
    let sink = invalidations.clone();
    let _sub = remaining.subscribe(move || sink.set(sink.get() + 1));

    store.set("filter", "done").unwrap();
    assert_eq!(invalidations.get(), 0);

    let todos = store.child("todos").unwrap();
    todos
        .push(Value::Map(btree! {
            "title".to_string() => Value::from("test"),
            "done".to_string() => Value::from(false),
        }))
        .unwrap();
    assert_eq!(invalidations.get(), 1);
    assert_eq!(remaining.get_snapshot().ready(), Some(Value::from(2)));

    todos.child("0").unwrap().set("done", true).unwrap();
    assert_eq!(invalidations.get(), 2);
    assert_eq!(remaining.value(), Value::from(1));
}
