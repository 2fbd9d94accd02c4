//! Store example with complex state and named actions

use spellkit::{ActionSet, Readable, Store, StoreError, Writable};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug)]
struct TodoItem {
    id: usize,
    text: String,
    completed: bool,
}

#[derive(Clone, Debug)]
struct AppState {
    todos: Vec<TodoItem>,
    filter: String,
}

#[derive(Debug)]
enum TodoAction {
    Add(String),
    Complete(usize),
}

fn main() -> Result<(), StoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Todo Store Example ===\n");

    let store = Store::new(AppState {
        todos: vec![],
        filter: "all".to_string(),
    });

    store.subscribe(|state| {
        println!(
            "State updated! Active todos: {}",
            state.todos.iter().filter(|t| !t.completed).count()
        );
    })?;

    let todos = ActionSet::new()
        .action("add", |action: TodoAction| {
            move |state: &AppState| {
                let mut next = state.clone();
                if let TodoAction::Add(text) = action {
                    next.todos.push(TodoItem {
                        id: next.todos.len() + 1,
                        text,
                        completed: false,
                    });
                }
                next
            }
        })
        .try_action("complete", |action: TodoAction| {
            move |state: &AppState| {
                let TodoAction::Complete(id) = action else {
                    return Err(format!("`complete` expects an id, got {action:?}"));
                };
                let mut next = state.clone();
                let todo = next
                    .todos
                    .iter_mut()
                    .find(|t| t.id == id)
                    .ok_or_else(|| format!("no todo with id {id}"))?;
                todo.completed = true;
                Ok(next)
            }
        })
        .bind(store.clone());

    println!("Adding todo...");
    todos.dispatch("add", TodoAction::Add("Learn Spellkit".to_string()))?;

    println!("\nCompleting todo...");
    todos.dispatch("complete", TodoAction::Complete(1))?;

    println!("\nCompleting a todo that does not exist...");
    if let Err(err) = todos.dispatch("complete", TodoAction::Complete(7)) {
        println!("Rejected: {err}");
    }

    println!("\nClearing the filter with a plain update...");
    store.update(|state| state.filter.clear())?;

    println!("\nFinal state: {:#?}", store.unwrap());
    Ok(())
}
