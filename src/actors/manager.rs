use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{oneshot, RwLock};

use super::aggregate_actor::{
    spawn_aggregate_actor, ActorConfig, ActorContext, AggregateHandle, AggregateMsg,
};
use super::errors::CommandError;
use crate::event_sourcing::{Aggregate, EventEnvelope, Journal};
use crate::messaging::{EventBus, StateSignal};

// ============================================================================
// Aggregate Manager - Identity Routing & Instance Lifecycle
// ============================================================================
//
// Maps each identity to at most one live aggregate actor. Creation is lazy
// and idempotent: the first message for an unseen identity spawns an
// instance and recovers it from the journal; later messages reuse it.
//
// The manager holds no domain state of its own - only the identity->handle
// map. A dispatch that races a passivation is retried against a freshly
// recovered instance, so no command is ever silently dropped.
//
// ============================================================================

/// Dispatch attempts before giving up with `ActorGone`. Each retry spawns a
/// fresh instance, so more than a couple only helps if instances keep dying
/// mid-dispatch.
const DISPATCH_ATTEMPTS: usize = 3;

pub struct AggregateManager<A: Aggregate> {
    journal: Arc<dyn Journal<A>>,
    bus: EventBus<A>,
    config: ActorConfig,
    instances: Arc<RwLock<HashMap<A::Id, AggregateHandle<A>>>>,
}

impl<A: Aggregate> Clone for AggregateManager<A> {
    fn clone(&self) -> Self {
        Self {
            journal: self.journal.clone(),
            bus: self.bus.clone(),
            config: self.config.clone(),
            instances: self.instances.clone(),
        }
    }
}

impl<A: Aggregate> AggregateManager<A> {
    pub fn new(journal: Arc<dyn Journal<A>>, bus: EventBus<A>) -> Self {
        Self::with_config(journal, bus, ActorConfig::default())
    }

    pub fn with_config(
        journal: Arc<dyn Journal<A>>,
        bus: EventBus<A>,
        config: ActorConfig,
    ) -> Self {
        Self {
            journal,
            bus,
            config,
            instances: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn bus(&self) -> &EventBus<A> {
        &self.bus
    }

    /// Route a domain command to its identity's instance and wait for the
    /// outcome: the appended envelopes, or a typed error.
    pub async fn execute(
        &self,
        aggregate_id: &A::Id,
        command: A::Command,
    ) -> Result<Vec<EventEnvelope<A>>, CommandError<A::Error>> {
        for _ in 0..DISPATCH_ATTEMPTS {
            let handle = self.instance(aggregate_id).await;
            let (tx, rx) = oneshot::channel();
            if handle
                .sender
                .send(AggregateMsg::Execute {
                    command: command.clone(),
                    reply: tx,
                })
                .await
                .is_err()
            {
                // Mailbox closed between lookup and send: instance is
                // passivating. Retry against a fresh one.
                continue;
            }
            match rx.await {
                Ok(result) => return result,
                Err(_) => continue,
            }
        }
        Err(CommandError::ActorGone)
    }

    /// Read-only state publish: reports the sequence number and state as of
    /// the last applied event, and announces the same signal on the bus.
    /// Never appends, never advances the sequence number.
    pub async fn publish_state(
        &self,
        aggregate_id: &A::Id,
    ) -> Result<StateSignal<A>, CommandError<A::Error>> {
        for _ in 0..DISPATCH_ATTEMPTS {
            let handle = self.instance(aggregate_id).await;
            let (tx, rx) = oneshot::channel();
            if handle
                .sender
                .send(AggregateMsg::PublishState { reply: tx })
                .await
                .is_err()
            {
                continue;
            }
            match rx.await {
                Ok(result) => return result,
                Err(_) => continue,
            }
        }
        Err(CommandError::ActorGone)
    }

    /// Force passivation of one identity's resident instance, waiting until
    /// it has fully stopped. A non-resident identity is already passivated;
    /// its durable history is untouched either way, and any later message
    /// transparently revives the identity through replay.
    pub async fn poison(&self, aggregate_id: &A::Id) {
        let handle = {
            let instances = self.instances.read().await;
            instances.get(aggregate_id).cloned()
        };
        let Some(handle) = handle else {
            return;
        };

        if handle.is_alive() {
            let (tx, rx) = oneshot::channel();
            if handle
                .sender
                .send(AggregateMsg::Poison { reply: tx })
                .await
                .is_ok()
            {
                let _ = rx.await;
            }
        }
        handle.wait_terminated().await;

        let mut instances = self.instances.write().await;
        let stopped = instances
            .get(aggregate_id)
            .map_or(false, |current| !current.is_alive());
        if stopped {
            instances.remove(aggregate_id);
        }

        tracing::debug!(
            aggregate_type = A::AGGREGATE_TYPE,
            aggregate_id = %aggregate_id,
            "aggregate poisoned"
        );
    }

    /// Whether an identity currently has a live resident instance.
    pub async fn resident(&self, aggregate_id: &A::Id) -> bool {
        let instances = self.instances.read().await;
        instances
            .get(aggregate_id)
            .map_or(false, |handle| handle.is_alive())
    }

    /// Look up the identity's live instance, spawning one if needed.
    ///
    /// A stale (passivated) entry is only replaced after its task has fully
    /// exited, so two instances of one identity never run concurrently.
    async fn instance(&self, aggregate_id: &A::Id) -> AggregateHandle<A> {
        loop {
            {
                let instances = self.instances.read().await;
                if let Some(handle) = instances.get(aggregate_id) {
                    if handle.is_alive() {
                        return handle.clone();
                    }
                }
            }

            let stale = {
                let mut instances = self.instances.write().await;
                match instances.get(aggregate_id).cloned() {
                    Some(handle) if handle.is_alive() => return handle,
                    Some(stale) => {
                        instances.remove(aggregate_id);
                        Some(stale)
                    }
                    None => None,
                }
            };
            if let Some(stale) = stale {
                stale.wait_terminated().await;
            }

            let mut instances = self.instances.write().await;
            match instances.get(aggregate_id).cloned() {
                // Another dispatcher spawned while we waited.
                Some(handle) if handle.is_alive() => return handle,
                Some(_) => continue,
                None => {
                    tracing::debug!(
                        aggregate_type = A::AGGREGATE_TYPE,
                        aggregate_id = %aggregate_id,
                        "spawning aggregate instance"
                    );
                    let handle = spawn_aggregate_actor(ActorContext {
                        aggregate_id: aggregate_id.clone(),
                        journal: self.journal.clone(),
                        bus: self.bus.clone(),
                        config: self.config.clone(),
                    });
                    instances.insert(aggregate_id.clone(), handle.clone());
                    return handle;
                }
            }
        }
    }
}
