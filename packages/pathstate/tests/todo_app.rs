use std::cell::Cell;
use std::rc::Rc;

use pathstate::serde::{json_to_value, selection_as, typed_future, TypedView};
use pathstate::{Engine, InitError, RunOptions, Snapshot, Target, Value, View};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Todo {
    title: String,
    done: bool,
}

fn app() -> (Engine, View) {
    let engine = Engine::new();
    let target = Target::new(json_to_value(json!({"todos": [], "filter": "all"})));
    let store = engine.wrap(&target).unwrap();
    (engine, store)
}

#[test]
fn test_typed_todo_list_drives_subscription() {
    let (engine, store) = app();
    let open = engine.subscribe(&store, |store| {
        let todos: Vec<Todo> = store.get_as("todos").ok().flatten().unwrap_or_default();
        Value::from(todos.iter().filter(|todo| !todo.done).count())
    });
    let invalidations = Rc::new(Cell::new(0));
    let sink = invalidations.clone();
    let _sub = open.subscribe(move || sink.set(sink.get() + 1));

    let todos = store.child("todos").unwrap();
    todos
        .push(json_to_value(json!({"title": "write", "done": false})))
        .unwrap();
    assert_eq!(invalidations.get(), 1);
    assert_eq!(selection_as::<usize>(&open).unwrap(), 1);

    store.set_as("filter", "done").unwrap();
    assert_eq!(invalidations.get(), 1);

    todos.child("0").unwrap().set_as("done", &true).unwrap();
    assert_eq!(invalidations.get(), 2);
    assert_eq!(selection_as::<usize>(&open).unwrap(), 0);
}

#[tokio::test]
async fn test_typed_loader_with_suspense() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let (engine, store) = app();
            let view = engine.subscribe(&store, |store| store.get("todos").unwrap_or_default());

            let init = engine
                .run(
                    &store,
                    typed_future(|store: View| async move {
                        let todos = vec![Todo {
                            title: "fetched".to_string(),
                            done: false,
                        }];
                        store.set_as("todos", &todos)?;
                        Ok::<_, InitError>(todos.len())
                    }),
                    RunOptions::new().key("todos").suspense(true),
                )
                .unwrap();

            let handle = match view.get_snapshot() {
                Snapshot::Pending(handle) => handle,
                other => panic!("expected pending, got {:?}", other),
            };
            assert_eq!(handle.await, Ok(Value::from(1)));
            assert_eq!(init.data(), Some(Value::from(1)));

            let todos: Vec<Todo> = store.get_as("todos").unwrap().unwrap();
            assert_eq!(todos[0].title, "fetched");
            assert!(view.get_snapshot().is_ready());
        })
        .await;
}
