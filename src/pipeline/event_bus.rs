//! Pipeline Event Bus
//!
//! Broadcasts registration, invalidation and coverage events to whoever is
//! listening (report writers, visualization layers). Publishing never
//! blocks and never fails when nobody subscribed.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum PipelineEvent {
    /// A non-reference scenario became visible to readers
    ScenarioRegistered { scenario_id: String },
    /// The first reference was installed
    ReferenceSet { scenario_id: String, epoch: u64 },
    /// The reference was swapped; everything computed before is stale
    ReferenceReplaced {
        previous: String,
        current: String,
        epoch: u64,
    },
    /// A scenario shares no spatial units with the reference
    CoverageGap {
        scenario_id: String,
        only_in_candidate: usize,
        only_in_reference: usize,
    },
    /// `run()` finished
    RunCompleted {
        epoch: u64,
        computed: usize,
        reused: usize,
    },
}

pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    /// Create a new subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish(PipelineEvent::ScenarioRegistered { scenario_id: "alt".into() });
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(PipelineEvent::ReferenceSet { scenario_id: "base".into(), epoch: 1 });

        let event = rx.recv().await.unwrap();
        assert_eq!(event, PipelineEvent::ReferenceSet { scenario_id: "base".into(), epoch: 1 });
    }

    #[test]
    fn test_serializes_tagged() {
        let event = PipelineEvent::ScenarioRegistered { scenario_id: "alt".into() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ScenarioRegistered");
        assert_eq!(json["payload"]["scenario_id"], "alt");
    }
}
