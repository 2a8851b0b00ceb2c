use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is gone.
    /// Used on paths where the domain operation already succeeded.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Reservation events
    StockReserved {
        session_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        expires_at: DateTime<Utc>,
    },
    StockReleased {
        session_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    SessionReleased {
        session_id: Uuid,
        holds_released: usize,
    },
    HoldsExpired {
        session_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        expired_at: DateTime<Utc>,
    },

    // Checkout events
    SaleCommitted {
        transaction_id: Uuid,
        checkout_session_id: Uuid,
        register_session_id: Uuid,
        total_ves: Decimal,
        total_usd: Decimal,
    },

    // Register events
    RegisterOpened {
        register_session_id: Uuid,
        opened_by: String,
    },
    TransactionAppended {
        register_session_id: Uuid,
        transaction_id: Uuid,
        receipt_code: String,
    },
    RegisterCloseStarted {
        register_session_id: Uuid,
        requires_authorization: bool,
    },
    RegisterClosed {
        register_session_id: Uuid,
        closed_by: String,
        authorized_discrepancies: usize,
    },

    // Inventory events
    StockAdjusted {
        product_id: Uuid,
        quantity_delta: i32,
        on_hand_after: i32,
        reason: String,
    },

    // Side-effect events
    NotificationFailed {
        transaction_id: Uuid,
        recipient: String,
        error: String,
    },

    // Generic event for custom messages
    Generic {
        message: String,
        timestamp: DateTime<Utc>,
        metadata: serde_json::Value,
    },
}

/// Consumes the event channel. Runs for the life of the process; today the
/// handlers only log, but this is the seam where downstream projections
/// (statistics, document queues) attach without touching the commit paths.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::HoldsExpired {
                session_id,
                product_id,
                quantity,
                ..
            } => {
                // Reclaims are audit-relevant: keep them visible even at
                // default log levels.
                info!(
                    session_id = %session_id,
                    product_id = %product_id,
                    quantity = %quantity,
                    "Expired hold reclaimed"
                );
            }
            Event::NotificationFailed {
                transaction_id,
                recipient,
                error,
            } => {
                warn!(
                    transaction_id = %transaction_id,
                    recipient = %recipient,
                    error = %error,
                    "Post-commit notification failed"
                );
            }
            other => {
                info!("Received event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_event() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        sender
            .send(Event::SessionReleased {
                session_id: Uuid::new_v4(),
                holds_released: 2,
            })
            .await
            .expect("send should succeed");

        let received = rx.recv().await.expect("event expected");
        assert!(matches!(received, Event::SessionReleased { holds_released: 2, .. }));
    }

    #[tokio::test]
    async fn send_or_log_tolerates_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        // Must not panic or error out
        sender
            .send_or_log(Event::Generic {
                message: "orphaned".into(),
                timestamp: Utc::now(),
                metadata: serde_json::json!({}),
            })
            .await;
    }
}
