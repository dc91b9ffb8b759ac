use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;

use super::errors::CommandError;
use crate::event_sourcing::{replay, Aggregate, EventEnvelope, Journal, RecoveryError};
use crate::messaging::{EventBus, Publication, StateSignal};

// ============================================================================
// Aggregate Actor - One Exclusive Execution Context Per Identity
// ============================================================================
//
// Each resident identity is owned by exactly one tokio task. The task holds
// the aggregate state and sequence number, receives messages over an mpsc
// mailbox in strict arrival order, and processes one message to completion
// at a time. That single mailbox is what makes the sequence number
// race-free without locks.
//
// Lifecycle: Uninitialized -> Recovering (replay at task start; messages
// sent meanwhile buffer in the mailbox) -> Active -> Passivated (idle
// timeout, poison, or post-conflict stop). Passivation only ever happens
// between messages, never mid-command.
//
// ============================================================================

/// Whether poison lets commands already queued behind it drain on the dying
/// instance, or stops immediately. Discarded commands are not lost: the
/// manager observes the dead mailbox and retries them against a freshly
/// recovered instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoisonPolicy {
    DrainQueued,
    DiscardQueued,
}

#[derive(Debug, Clone)]
pub struct ActorConfig {
    /// Inactivity window after which a resident instance passivates.
    pub idle_timeout: Duration,
    /// Mailbox bound; senders are backpressured beyond this.
    pub mailbox_capacity: usize,
    pub poison_policy: PoisonPolicy,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            mailbox_capacity: 32,
            poison_policy: PoisonPolicy::DrainQueued,
        }
    }
}

type ExecuteReply<A> =
    Result<Vec<EventEnvelope<A>>, CommandError<<A as Aggregate>::Error>>;
type StateReply<A> = Result<StateSignal<A>, CommandError<<A as Aggregate>::Error>>;

/// Messages delivered to the actor, each with a oneshot reply channel.
pub(crate) enum AggregateMsg<A: Aggregate> {
    Execute {
        command: A::Command,
        reply: oneshot::Sender<ExecuteReply<A>>,
    },
    PublishState {
        reply: oneshot::Sender<StateReply<A>>,
    },
    Poison {
        reply: oneshot::Sender<()>,
    },
}

/// Everything a running actor needs, moved into its task at spawn.
pub(crate) struct ActorContext<A: Aggregate> {
    pub aggregate_id: A::Id,
    pub journal: Arc<dyn Journal<A>>,
    pub bus: EventBus<A>,
    pub config: ActorConfig,
}

/// Handle to a running aggregate actor. Cheap to clone.
pub(crate) struct AggregateHandle<A: Aggregate> {
    pub(crate) sender: mpsc::Sender<AggregateMsg<A>>,
    done: watch::Receiver<()>,
}

impl<A: Aggregate> Clone for AggregateHandle<A> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            done: self.done.clone(),
        }
    }
}

impl<A: Aggregate> AggregateHandle<A> {
    /// False once the actor's mailbox has closed (passivation started).
    pub(crate) fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Wait until the actor task has fully exited. The manager calls this
    /// before spawning a replacement so two instances of one identity never
    /// overlap.
    pub(crate) async fn wait_terminated(&self) {
        let mut done = self.done.clone();
        while done.changed().await.is_ok() {}
    }
}

pub(crate) fn spawn_aggregate_actor<A: Aggregate>(ctx: ActorContext<A>) -> AggregateHandle<A> {
    let (tx, rx) = mpsc::channel(ctx.config.mailbox_capacity);
    let (done_tx, done_rx) = watch::channel(());
    tokio::spawn(async move {
        run_actor(ctx, rx).await;
        drop(done_tx);
    });
    AggregateHandle {
        sender: tx,
        done: done_rx,
    }
}

enum Flow {
    Continue,
    Stop,
}

async fn run_actor<A: Aggregate>(ctx: ActorContext<A>, mut rx: mpsc::Receiver<AggregateMsg<A>>) {
    // Recovering: replay must complete before the first message is handled.
    // Messages arriving meanwhile queue in the mailbox in arrival order.
    let recovered = match replay(ctx.journal.as_ref(), &ctx.aggregate_id).await {
        Ok(recovered) => recovered,
        Err(err) => {
            tracing::error!(
                aggregate_type = A::AGGREGATE_TYPE,
                aggregate_id = %ctx.aggregate_id,
                error = %err,
                "recovery failed, refusing queued messages"
            );
            drain_with_error(&mut rx, &err).await;
            return;
        }
    };
    let mut state = recovered.state;
    let mut sequence = recovered.sequence_number;

    tracing::debug!(
        aggregate_type = A::AGGREGATE_TYPE,
        aggregate_id = %ctx.aggregate_id,
        sequence,
        "aggregate active"
    );

    loop {
        let msg = match timeout(ctx.config.idle_timeout, rx.recv()).await {
            Ok(Some(msg)) => msg,
            // All handles dropped.
            Ok(None) => break,
            Err(_elapsed) => {
                tracing::debug!(
                    aggregate_type = A::AGGREGATE_TYPE,
                    aggregate_id = %ctx.aggregate_id,
                    "idle timeout, passivating"
                );
                break;
            }
        };

        match msg {
            AggregateMsg::Poison { reply } => {
                if ctx.config.poison_policy == PoisonPolicy::DrainQueued {
                    rx.close();
                    while let Some(queued) = rx.recv().await {
                        if let Flow::Stop =
                            process_message(&ctx, &mut state, &mut sequence, queued).await
                        {
                            break;
                        }
                    }
                }
                let _ = reply.send(());
                break;
            }
            msg => {
                if let Flow::Stop = process_message(&ctx, &mut state, &mut sequence, msg).await {
                    break;
                }
            }
        }
    }

    tracing::debug!(
        aggregate_type = A::AGGREGATE_TYPE,
        aggregate_id = %ctx.aggregate_id,
        sequence,
        "aggregate passivated"
    );
}

async fn process_message<A: Aggregate>(
    ctx: &ActorContext<A>,
    state: &mut A,
    sequence: &mut u64,
    msg: AggregateMsg<A>,
) -> Flow {
    match msg {
        AggregateMsg::Execute { command, reply } => {
            let result = execute_command(ctx, state, sequence, command).await;
            let conflicted = matches!(result, Err(CommandError::Conflict { .. }));
            let _ = reply.send(result);
            if conflicted {
                // Another writer advanced the stream. The in-memory state is
                // stale and must be rebuilt from the journal, never patched.
                tracing::warn!(
                    aggregate_type = A::AGGREGATE_TYPE,
                    aggregate_id = %ctx.aggregate_id,
                    "append conflict, discarding in-memory state"
                );
                Flow::Stop
            } else {
                Flow::Continue
            }
        }
        AggregateMsg::PublishState { reply } => {
            let signal = StateSignal {
                aggregate_id: ctx.aggregate_id.clone(),
                sequence_number: *sequence,
                state: state.clone(),
                timestamp: Utc::now(),
            };
            ctx.bus.publish(Publication::StateSignal(signal.clone()));
            let _ = reply.send(Ok(signal));
            Flow::Continue
        }
        // Only reachable while already draining after a poison.
        AggregateMsg::Poison { reply } => {
            let _ = reply.send(());
            Flow::Continue
        }
    }
}

/// Run one command to completion: validate, append, apply, publish.
///
/// The append must succeed before any state mutation or publication; on
/// failure the command aborts with state untouched.
async fn execute_command<A: Aggregate>(
    ctx: &ActorContext<A>,
    state: &mut A,
    sequence: &mut u64,
    command: A::Command,
) -> ExecuteReply<A> {
    let events = state
        .handle_command(&command)
        .map_err(CommandError::Rejected)?;
    if events.is_empty() {
        return Ok(Vec::new());
    }

    let mut envelopes = Vec::with_capacity(events.len());
    let mut next = *sequence;
    for event in events {
        next += 1;
        envelopes.push(EventEnvelope::new(ctx.aggregate_id.clone(), next, event));
    }

    ctx.journal
        .append(&ctx.aggregate_id, &envelopes, *sequence)
        .await?;

    for envelope in &envelopes {
        state.apply(&envelope.event);
    }
    *sequence = next;

    tracing::info!(
        aggregate_type = A::AGGREGATE_TYPE,
        aggregate_id = %ctx.aggregate_id,
        sequence = next,
        event_count = envelopes.len(),
        "events appended"
    );

    for envelope in &envelopes {
        ctx.bus.publish(Publication::Event(envelope.clone()));
    }

    Ok(envelopes)
}

/// Recovery failed: answer everything already queued with the error, then
/// stop. Storage failures are retryable on the next contact; an integrity
/// error will fail the same way every time.
async fn drain_with_error<A: Aggregate>(
    rx: &mut mpsc::Receiver<AggregateMsg<A>>,
    err: &RecoveryError,
) {
    rx.close();
    while let Some(msg) = rx.recv().await {
        match msg {
            AggregateMsg::Execute { reply, .. } => {
                let _ = reply.send(Err(CommandError::from(err.clone())));
            }
            AggregateMsg::PublishState { reply } => {
                let _ = reply.send(Err(CommandError::from(err.clone())));
            }
            AggregateMsg::Poison { reply } => {
                let _ = reply.send(());
            }
        }
    }
}
