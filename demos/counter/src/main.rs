//! Counter example binary
//!
//! Demonstrates composing one counter feature into a larger application.

use counter::{AppAction, AppState, CounterAction, app_store_with_config};
use flowstore_runtime::StoreConfig;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "counter=debug,flowstore_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = StoreConfig::from_env().unwrap_or_else(|error| {
        tracing::warn!(%error, "Ignoring invalid store configuration");
        StoreConfig::default()
    });

    println!("=== Counter Example: flowstore ===\n");

    let store = app_store_with_config(AppState::default(), Duration::from_millis(200), config);
    let total = store.derived(AppState::total, AppAction::Main).await;
    let main_count = store.binding(|s: &AppState| s.main.count, |count: i64| {
        AppAction::Main(if count == 0 {
            CounterAction::Reset
        } else {
            CounterAction::CountTo(count)
        })
    });

    println!(">>> Main: Increment");
    store.send(AppAction::Main(CounterAction::Increment)).await;
    println!("Main count: {}", main_count.get().await);

    println!("\n>>> Main: IncrementLater (waits for the timer)");
    store.send(AppAction::Main(CounterAction::IncrementLater)).await;
    println!("Main count: {}", main_count.get().await);

    println!("\n>>> Main: CountTo(5) (follow-ups re-enter dispatch)");
    store.send(AppAction::Main(CounterAction::CountTo(5))).await;
    println!("Main count: {}", main_count.get().await);

    println!("\n>>> Named: add \"apples\", increment it, then increment missing \"pears\"");
    store.send(AppAction::AddNamed("apples".into())).await;
    store
        .send(AppAction::Named("apples".into(), CounterAction::Increment))
        .await;
    store
        .send(AppAction::Named("pears".into(), CounterAction::Increment))
        .await;
    let named = store.state(|s| s.named.clone()).await;
    println!("Named counters: {named:?}");

    println!("\n>>> Rows: add two, decrement row 1, then decrement out-of-range row 7");
    store.send(AppAction::AddRow).await;
    store.send(AppAction::AddRow).await;
    store.send(AppAction::Row(1, CounterAction::Decrement)).await;
    store.send(AppAction::Row(7, CounterAction::Decrement)).await;
    let rows = store.state(|s| s.rows.clone()).await;
    println!("Rows: {rows:?}");

    println!("\n>>> Binding: set main count to 0");
    main_count.set(0).await;
    println!("Main count: {}", main_count.get().await);

    println!("\n>>> Derived: send Increment through the total view");
    total.send(CounterAction::Increment).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    println!("Total across counters: {}", total.snapshot());

    if let Err(error) = store.close().await {
        tracing::error!(%error, "Store did not shut down cleanly");
    }

    println!("\n=== Composition Demonstration Complete ===");
    println!("\nKey concepts demonstrated:");
    println!("  • Reducer: pure transitions, lifted into a field, a map entry and a list element");
    println!("  • Middleware: timed and self-feeding follow-ups, lifted the same ways");
    println!("  • Prism: generated per action case by #[derive(Prisms)]");
    println!("  • Store: reduces first, then fans out to every middleware");
}
