//! Complete counter application demonstrating all features together

use spellkit::{ActionSet, Computed, Lens, Readable, Store, StoreError, Writable};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug)]
struct CounterState {
    count: i32,
    step: i32,
    history: Vec<i32>,
}

impl CounterState {
    fn new() -> Self {
        Self {
            count: 0,
            step: 1,
            history: vec![0],
        }
    }

    fn moved_by(&self, delta: i32) -> Self {
        let mut next = self.clone();
        next.count += delta;
        next.history.push(next.count);
        next
    }
}

#[derive(Clone, Copy, Debug)]
enum Command {
    Increment,
    Decrement,
    Reset,
}

fn main() -> Result<(), StoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Complete Counter Application ===\n");

    println!("1. Initializing counter with Store");
    let store = Store::new(CounterState::new());

    let _logger = store
        .subscribe(|state| {
            println!("   [State] Count: {}, Step: {}", state.count, state.step);
        })?
        .guard();

    println!("\n2. Registering actions");
    let counter = ActionSet::new()
        .action("apply", |command: Command| {
            move |state: &CounterState| match command {
                Command::Increment => state.moved_by(state.step),
                Command::Decrement => state.moved_by(-state.step),
                Command::Reset => state.moved_by(-state.count),
            }
        })
        .bind(store.clone());

    println!("\n3. Setting up computed values");
    let count = Lens::field(store.clone(), |s| &s.count, |s| &mut s.count);
    let is_positive = Computed::new((count.clone(),), |(n,)| n > 0)?;
    let is_even = Computed::new((count.clone(),), |(n,)| n % 2 == 0)?;
    let absolute_value = Computed::new((count.clone(),), |(n,)| n.abs())?;

    let print_state = || {
        println!(
            "   Count: {} | Positive: {} | Even: {} | Abs: {}",
            count.unwrap(),
            is_positive.unwrap(),
            is_even.unwrap(),
            absolute_value.unwrap()
        );
    };

    println!("\n4. Initial state:");
    print_state();

    println!("\n5. Incrementing...");
    for _ in 0..3 {
        counter.dispatch("apply", Command::Increment)?;
        print_state();
    }

    println!("\n6. Changing step size to 5");
    let step = Lens::field(store.clone(), |s| &s.step, |s| &mut s.step);
    step.publish(5)?;

    println!("\n7. Incrementing with new step...");
    counter.dispatch("apply", Command::Increment)?;
    print_state();

    println!("\n8. Decrementing...");
    for _ in 0..3 {
        counter.dispatch("apply", Command::Decrement)?;
        print_state();
    }

    println!("\n9. History:");
    store.read(|state| println!("   {:?}", state.history));

    println!("\n10. Resetting...");
    counter.dispatch("apply", Command::Reset)?;
    print_state();

    println!("\n11. Final history:");
    store.read(|state| println!("   {:?}", state.history));

    println!("\n✓ Counter application complete!");
    Ok(())
}
