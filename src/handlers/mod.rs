pub mod checkout;
pub mod products;
pub mod registers;
pub mod reservations;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::catalog::CatalogService;
use crate::services::checkout::CheckoutService;
use crate::services::documents::{DocumentRenderer, TextReceiptRenderer};
use crate::services::notifications::{LogNotificationSender, NotificationSender};
use crate::services::registers::RegisterService;
use crate::services::reservations::{ReservationConfig, ReservationService};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub reservations: Arc<ReservationService>,
    pub registers: Arc<RegisterService>,
    pub checkout: Arc<CheckoutService>,
    pub catalog: Arc<CatalogService>,
}

impl AppServices {
    /// Build the default AppServices container with the log-backed
    /// notification sender and the plain-text renderer.
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, config: &AppConfig) -> Self {
        Self::with_collaborators(
            db_pool,
            event_sender,
            config,
            Arc::new(TextReceiptRenderer),
            Arc::new(LogNotificationSender),
        )
    }

    /// Build with explicit external collaborators (deployments with a real
    /// delivery channel; tests exercising failure paths).
    pub fn with_collaborators(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        config: &AppConfig,
        renderer: Arc<dyn DocumentRenderer>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        let reservations = Arc::new(ReservationService::new(
            db_pool.clone(),
            event_sender.clone(),
            ReservationConfig {
                ttl: config.reservation_ttl(),
                grace: config.reservation_grace(),
            },
        ));
        let registers = Arc::new(RegisterService::new(db_pool.clone(), event_sender.clone()));
        let catalog = Arc::new(CatalogService::new(db_pool.clone(), event_sender.clone()));
        let checkout = Arc::new(CheckoutService::new(
            db_pool,
            reservations.clone(),
            registers.clone(),
            event_sender,
            renderer,
            notifier,
        ));

        Self {
            reservations,
            registers,
            checkout,
            catalog,
        }
    }
}
