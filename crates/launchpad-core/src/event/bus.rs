//! Run event fan-out.
//!
//! The runner publishes every [`PipelineEvent`] on one broadcast channel.
//! Observers either take the raw receiver or a [`RunSubscription`], which
//! follows a single run (or every run) and ends once that run finishes.

use launchpad_types::event::PipelineEvent;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 256;

/// Broadcast channel shared by the runner and its observers. Clones share the
/// same sender.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Follow one run. Events from other runs on the same bus are dropped.
    pub fn subscribe_run(&self, run_id: Uuid) -> RunSubscription {
        RunSubscription {
            receiver: self.sender.subscribe(),
            run_id: Some(run_id),
            finished: false,
        }
    }

    /// Follow whichever run publishes next, until its `RunFinished`.
    pub fn subscribe_next_run(&self) -> RunSubscription {
        RunSubscription {
            receiver: self.sender.subscribe(),
            run_id: None,
            finished: false,
        }
    }

    /// Events published while nobody listens are dropped.
    pub fn publish(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Receiver scoped to a single run.
///
/// Lagged gaps are skipped. `next` returns `None` after the run's
/// `RunFinished` event or once every sender is gone.
pub struct RunSubscription {
    receiver: broadcast::Receiver<PipelineEvent>,
    run_id: Option<Uuid>,
    finished: bool,
}

impl RunSubscription {
    pub async fn next(&mut self) -> Option<PipelineEvent> {
        if self.finished {
            return None;
        }
        loop {
            let event = match self.receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "run subscription lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            };

            let run_id = *self.run_id.get_or_insert(event.run_id());
            if event.run_id() != run_id {
                continue;
            }
            if matches!(event, PipelineEvent::RunFinished { .. }) {
                self.finished = true;
            }
            return Some(event);
        }
    }

    /// The run being followed, once known.
    pub fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchpad_types::run::RunOutcome;

    fn cancel(run_id: Uuid) -> PipelineEvent {
        PipelineEvent::CancelRequested { run_id }
    }

    fn finished(run_id: Uuid) -> PipelineEvent {
        PipelineEvent::RunFinished {
            run_id,
            workflow: "deploy".to_string(),
            outcome: RunOutcome::Success,
            duration_ms: 1,
        }
    }

    #[tokio::test]
    async fn every_subscriber_sees_each_event() {
        let bus = EventBus::new(16);
        let mut first = bus.subscribe();
        let mut second = bus.clone().subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(cancel(Uuid::nil()));

        assert!(matches!(first.recv().await.unwrap(), PipelineEvent::CancelRequested { .. }));
        assert!(second.recv().await.is_ok());
    }

    #[tokio::test]
    async fn run_subscription_filters_other_runs_and_ends_on_finish() {
        let bus = EventBus::new(16);
        let mine = Uuid::now_v7();
        let other = Uuid::now_v7();
        let mut sub = bus.subscribe_run(mine);

        bus.publish(cancel(other));
        bus.publish(cancel(mine));
        bus.publish(finished(mine));
        bus.publish(cancel(mine));

        assert_eq!(sub.next().await.unwrap().run_id(), mine);
        assert!(matches!(sub.next().await, Some(PipelineEvent::RunFinished { .. })));
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn next_run_subscription_locks_onto_first_run() {
        let bus = EventBus::new(16);
        let first = Uuid::now_v7();
        let mut sub = bus.subscribe_next_run();
        assert!(sub.run_id().is_none());

        bus.publish(cancel(first));
        bus.publish(cancel(Uuid::now_v7()));
        bus.publish(finished(first));

        assert_eq!(sub.next().await.unwrap().run_id(), first);
        assert_eq!(sub.run_id(), Some(first));
        assert!(matches!(sub.next().await, Some(PipelineEvent::RunFinished { .. })));
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn subscription_ends_when_bus_is_dropped() {
        let bus = EventBus::new(4);
        let mut sub = bus.subscribe_next_run();
        drop(bus);
        assert!(sub.next().await.is_none());
    }
}
