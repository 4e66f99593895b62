use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::agents::AgentKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AllocationEvent {
    AgentFailed {
        cycle_id: Uuid,
        agent: AgentKind,
        error: String,
    },
    SignalRejected {
        cycle_id: Uuid,
        asset_class: String,
        reason: String,
    },
    CorrelationLimitHit {
        cycle_id: Uuid,
        assets: (String, String),
        correlation: f64,
    },
    VarLimitBreached {
        cycle_id: Uuid,
        var: f64,
        limit: f64,
    },
    RecommendationIssued {
        cycle_id: Uuid,
        signals: usize,
        cash_allocation: f64,
        timestamp: DateTime<Utc>,
    },
    PortfolioRebalanced {
        cycle_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

pub struct EventBus {
    sender: broadcast::Sender<AllocationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: AllocationEvent) {
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!("📡 Event published to {} receivers", receivers);
            }
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!("No subscribers for event: {:?}", event);
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AllocationEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let cycle_id = Uuid::new_v4();

        bus.publish(AllocationEvent::VarLimitBreached {
            cycle_id,
            var: 0.3,
            limit: 0.25,
        });

        match rx.recv().await.unwrap() {
            AllocationEvent::VarLimitBreached { cycle_id: id, .. } => assert_eq!(id, cycle_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        bus.publish(AllocationEvent::PortfolioRebalanced {
            cycle_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        });
    }
}
