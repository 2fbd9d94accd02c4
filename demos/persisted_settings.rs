//! Persisting settings to storage and keeping two bindings in sync

use serde::{Deserialize, Serialize};
use spellkit::{
    persist, Lens, MemoryStorage, PersistOptions, Readable, Storage, Store, StoreError, Writable,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Settings {
    theme: String,
    volume: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            volume: 5,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), StoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Persisted Settings ===\n");

    // Something saved by a previous run
    let storage = MemoryStorage::new();
    storage.set_item("settings", r#"{"theme":"dark","volume":3}"#)?;

    println!("1. Loading defaults from a slow source");
    let (store, init) = Store::deferred(async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Settings::default()
    });
    let (settings, hydration) = persist(
        store.clone(),
        PersistOptions::new().key("settings").storage(storage.clone()),
    );
    tokio::spawn(init);
    hydration.await?;
    println!("   Hydrated: {} -> {:?}", settings.is_hydrated(), settings.unwrap());

    println!("\n2. A second binding on the same key");
    let (mirror, mirror_hydration) = persist(
        Store::new(Settings::default()),
        PersistOptions::new().key("settings").storage(storage.clone()),
    );
    mirror_hydration.await?;
    mirror.subscribe(|s| println!("   [mirror] volume {}", s.volume))?;

    println!("\n3. Turning the volume up through a lens");
    let volume = Lens::field(settings.clone(), |s| &s.volume, |s| &mut s.volume);
    volume.publish(9)?;
    println!("   Stored: {}", storage.get_item("settings")?.unwrap_or_default());

    println!("\n4. Forgetting the stored value");
    settings.forget()?;
    println!("   Stored: {:?}", storage.get_item("settings")?);
    println!("   In memory: {:?}", store.unwrap());

    Ok(())
}
