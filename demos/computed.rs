//! Derived values with computed stores

use spellkit::{Computed, Readable, Store, StoreError, Writable};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), StoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Computed Example ===\n");

    let first_name = Store::new("John".to_string());
    let last_name = Store::new("Doe".to_string());

    // Runs once now and again on every parent publish
    let full_name = Computed::new((first_name.clone(), last_name.clone()), |(first, last)| {
        println!("  (Computing full name...)");
        format!("{first} {last}")
    })?;

    let initials = Computed::new((full_name.clone(),), |(full,)| {
        full.split_whitespace()
            .filter_map(|part| part.chars().next())
            .collect::<String>()
    })?;

    println!("Initial full name: {}", full_name.unwrap());

    println!("\nUpdating first name...");
    first_name.publish("Jane".to_string())?;
    println!("New full name: {}", full_name.unwrap());

    println!("\nUpdating last name...");
    last_name.publish("Smith".to_string())?;
    println!("New full name: {}", full_name.unwrap());
    println!("Initials: {}", initials.unwrap());

    println!("\nClosing the full name stops recomputation");
    full_name.close();
    first_name.publish("Ada".to_string())?;
    println!("Full name is still: {}", full_name.unwrap());
    Ok(())
}
