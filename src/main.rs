use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aggregate_actors::actors::{ActorConfig, AggregateManager};
use aggregate_actors::domain::cart::{CartAggregate, CartCommand, CartId, ItemId, LineItem, Sku};
use aggregate_actors::event_sourcing::InMemoryJournal;
use aggregate_actors::messaging::{EventBus, Publication};

fn line_item(sku: &str, quantity: u32) -> LineItem {
    LineItem {
        item_id: ItemId::new(),
        sku: Sku::new(sku),
        quantity,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering.
    // Default to INFO level, can be overridden with RUST_LOG env var.
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,aggregate_actors=debug")),
        )
        .init();

    tracing::info!("starting event-sourced aggregate engine demo");

    // === 1. Wire journal, bus, and manager ===
    let journal = Arc::new(InMemoryJournal::<CartAggregate>::new());
    let bus = EventBus::new(256);
    let manager = AggregateManager::with_config(
        journal.clone(),
        bus.clone(),
        ActorConfig {
            idle_timeout: Duration::from_secs(30),
            ..Default::default()
        },
    );

    // === 2. Subscribe an observer to every publication ===
    let mut subscription = bus.subscribe();
    let observer = tokio::spawn(async move {
        while let Ok(publication) = subscription.recv().await {
            match publication {
                Publication::Event(envelope) => tracing::info!(
                    event = %envelope.metadata.event_name,
                    aggregate_id = %envelope.aggregate_id,
                    sequence = envelope.sequence_number,
                    "observed domain event"
                ),
                Publication::StateSignal(signal) => tracing::info!(
                    aggregate_id = %signal.aggregate_id,
                    sequence = signal.sequence_number,
                    items = signal.state.item_count(),
                    "observed state signal"
                ),
            }
        }
    });

    // === 3. Drive one cart through its lifecycle ===
    let cart_id = CartId::new();
    manager
        .execute(&cart_id, CartCommand::CreateCart { cart_id })
        .await?;
    tracing::info!(%cart_id, "cart created");

    for (sku, quantity) in [("SKU-0001", 2), ("SKU-0002", 1), ("SKU-0003", 4)] {
        manager
            .execute(
                &cart_id,
                CartCommand::AddItem {
                    item: line_item(sku, quantity),
                },
            )
            .await?;
    }
    tracing::info!(%cart_id, "items added");

    // === 4. Several identities processed in parallel ===
    let parallel = (0..3).map(|_| {
        let manager = manager.clone();
        async move {
            let other_id = CartId::new();
            manager
                .execute(&other_id, CartCommand::CreateCart { cart_id: other_id })
                .await?;
            manager
                .execute(
                    &other_id,
                    CartCommand::AddItem {
                        item: line_item("SKU-9999", 1),
                    },
                )
                .await
        }
    });
    futures_util::future::try_join_all(parallel).await?;
    tracing::info!("parallel carts processed");

    // === 5. Poison the first cart, then revive it with a state publish ===
    manager.poison(&cart_id).await;
    tracing::info!(%cart_id, "cart passivated");

    let signal = manager.publish_state(&cart_id).await?;
    tracing::info!(
        %cart_id,
        sequence = signal.sequence_number,
        items = signal.state.item_count(),
        total_quantity = signal.state.total_quantity(),
        "cart revived from journal"
    );

    // Let the observer drain its queue before shutting down.
    tokio::time::sleep(Duration::from_millis(100)).await;
    observer.abort();

    tracing::info!("demo complete");
    Ok(())
}
