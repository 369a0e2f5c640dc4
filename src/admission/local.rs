//! In-process admission authority.
//!
//! [`LocalAdmission`] is a cheap, cloneable handle to an actor task that
//! owns a [`SlotRegistry`]. The actor applies commands strictly one at a
//! time, so no two callers can both observe the last free slot.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::registry::{Slot, SlotRegistry};
use super::{AdmissionConfig, AdmissionControl};
use crate::telemetry;
use crate::types::{AdmissionResult, AdmissionStatus, HolderId};
use crate::{HeimdallError, Result};

/// Capacity of the command channel between handles and the actor.
const COMMAND_BUFFER: usize = 256;

enum Command {
    Acquire {
        holder: HolderId,
        operation_tag: String,
        reply: oneshot::Sender<Result<AdmissionResult>>,
    },
    Release {
        holder: HolderId,
        reply: oneshot::Sender<()>,
    },
    CleanupStale {
        max_age: Duration,
        reply: oneshot::Sender<usize>,
    },
    Status {
        reply: oneshot::Sender<AdmissionStatus>,
    },
}

/// Handle to an in-process admission authority.
///
/// Clones share the same actor. The actor exits once every handle has been
/// dropped.
#[derive(Clone)]
pub struct LocalAdmission {
    tx: mpsc::Sender<Command>,
}

impl LocalAdmission {
    /// Spawn the actor on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn spawn(config: AdmissionConfig) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let actor = Actor {
            registry: SlotRegistry::new(config.capacity, config.wait),
            stale_after: config.stale_after,
        };
        info!(
            capacity = actor.registry.capacity(),
            stale_after_secs = config.stale_after.as_secs(),
            "admission authority started"
        );
        tokio::spawn(actor.run(rx, config.sweep_interval));
        Self { tx }
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| authority_stopped())?;
        rx.await.map_err(|_| authority_stopped())
    }
}

fn authority_stopped() -> HeimdallError {
    HeimdallError::Transport("admission authority stopped".into())
}

#[async_trait]
impl AdmissionControl for LocalAdmission {
    async fn acquire(&self, holder: &HolderId, operation_tag: &str) -> Result<AdmissionResult> {
        self.call(|reply| Command::Acquire {
            holder: holder.clone(),
            operation_tag: operation_tag.to_owned(),
            reply,
        })
        .await?
    }

    async fn release(&self, holder: &HolderId) -> Result<()> {
        self.call(|reply| Command::Release {
            holder: holder.clone(),
            reply,
        })
        .await
    }

    async fn cleanup_stale(&self, max_age: Duration) -> Result<usize> {
        self.call(|reply| Command::CleanupStale { max_age, reply })
            .await
    }

    async fn status(&self) -> Result<AdmissionStatus> {
        self.call(|reply| Command::Status { reply }).await
    }
}

struct Actor {
    registry: SlotRegistry,
    stale_after: Duration,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>, sweep_interval: Option<Duration>) {
        let mut sweep = sweep_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
                _ = next_tick(&mut sweep) => {
                    self.reclaim(self.stale_after, Instant::now());
                }
            }
        }
        debug!("admission authority stopped");
    }

    fn handle(&mut self, cmd: Command) {
        let now = Instant::now();
        match cmd {
            Command::Acquire {
                holder,
                operation_tag,
                reply,
            } => {
                self.reclaim(self.stale_after, now);
                let result = self.registry.acquire(holder.clone(), &operation_tag, now);
                if let Ok(r) = &result {
                    debug!(
                        holder = %holder,
                        operation = %operation_tag,
                        granted = r.granted,
                        current_slots = r.current_slots,
                        max_slots = r.max_slots,
                        "admission decided"
                    );
                }
                // A caller cancelled between grant and reply never learns it
                // holds the slot, so take it back right away.
                if let Err(Ok(r)) = reply.send(result)
                    && r.granted
                {
                    self.registry.cleanup_holder(&holder);
                    debug!(holder = %holder, "caller gone, grant rolled back");
                }
                self.publish_occupancy();
            }
            Command::Release { holder, reply } => {
                if let Some(slot) = self.registry.release(&holder, now) {
                    debug!(
                        holder = %holder,
                        operation = %slot.operation_tag,
                        held_ms = slot.age(now).as_millis() as u64,
                        "slot released"
                    );
                }
                self.publish_occupancy();
                let _ = reply.send(());
            }
            Command::CleanupStale { max_age, reply } => {
                let _ = reply.send(self.reclaim(max_age, now));
            }
            Command::Status { reply } => {
                let _ = reply.send(self.registry.status(now));
            }
        }
    }

    fn reclaim(&mut self, max_age: Duration, now: Instant) -> usize {
        let reclaimed = self.registry.cleanup_stale(max_age, now);
        for slot in &reclaimed {
            log_reclaimed(slot, now);
        }
        if !reclaimed.is_empty() {
            metrics::counter!(telemetry::SLOTS_RECLAIMED_TOTAL).increment(reclaimed.len() as u64);
            self.publish_occupancy();
        }
        reclaimed.len()
    }

    fn publish_occupancy(&self) {
        metrics::gauge!(telemetry::SLOTS_IN_USE).set(self.registry.occupancy() as f64);
    }
}

fn log_reclaimed(slot: &Slot, now: Instant) {
    warn!(
        holder = %slot.holder,
        operation = %slot.operation_tag,
        age_secs = slot.age(now).as_secs(),
        "reclaimed stale slot"
    );
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
