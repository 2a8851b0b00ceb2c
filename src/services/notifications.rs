//! Notification sender boundary.
//!
//! Invoked strictly after a commit with rendered content. Delivery failure
//! is non-fatal by contract: callers log it and surface a flag on their
//! result, never unwinding the committed sale.

use async_trait::async_trait;
use tracing::info;

use crate::errors::ServiceError;
use crate::services::documents::RenderedDocument;

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        document: &RenderedDocument,
    ) -> Result<(), ServiceError>;
}

/// Default sender: records the delivery in the log stream. Deployments wire
/// a real channel (messaging gateway) behind the same trait.
pub struct LogNotificationSender;

#[async_trait]
impl NotificationSender for LogNotificationSender {
    async fn send(
        &self,
        recipient: &str,
        document: &RenderedDocument,
    ) -> Result<(), ServiceError> {
        info!(
            recipient = %recipient,
            title = %document.title,
            "Notification delivered (log sender)"
        );
        Ok(())
    }
}
