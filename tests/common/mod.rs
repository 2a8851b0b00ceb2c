#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use uuid::Uuid;

use caja_api::{
    api_v1_routes,
    config::AppConfig,
    db,
    entities::product::{self, ProductKind},
    entities::register_session,
    entities::transaction_payment::{PaymentCurrency, PaymentMethod},
    events::{self, EventSender},
    handlers::AppServices,
    services::catalog::CreateProductInput,
    services::documents::TextReceiptRenderer,
    services::notifications::NotificationSender,
    services::reconciliation::BucketAmounts,
    services::registers::{NewPayment, OpenRegisterInput},
    AppState,
};

/// Helper harness for spinning up an application state backed by an
/// in-memory SQLite database.
pub struct TestApp {
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// Same, but with a custom notification sender (failure-path tests).
    pub async fn with_notifier(notifier: Arc<dyn NotificationSender>) -> Self {
        Self::build(Some(notifier)).await
    }

    async fn build(notifier: Option<Arc<dyn NotificationSender>>) -> Self {
        // Minimal configuration suitable for tests. A single connection keeps
        // the in-memory SQLite database shared across the whole app.
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool).await.expect("migrations");

        let db_arc = Arc::new(pool);
        let (tx, rx) = mpsc::channel(256);
        let event_sender = EventSender::new(tx);
        let event_task = tokio::spawn(events::process_events(rx));

        let services = match notifier {
            Some(notifier) => AppServices::with_collaborators(
                db_arc.clone(),
                event_sender.clone(),
                &cfg,
                Arc::new(TextReceiptRenderer),
                notifier,
            ),
            None => AppServices::new(db_arc.clone(), event_sender.clone(), &cfg),
        };

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        TestApp {
            state,
            _event_task: event_task,
        }
    }

    pub fn router(&self) -> Router {
        api_v1_routes().with_state(self.state.clone())
    }

    pub async fn seed_product(
        &self,
        sku: &str,
        unit_price: Decimal,
        on_hand: i32,
    ) -> product::Model {
        self.state
            .services
            .catalog
            .create(CreateProductInput {
                sku: sku.to_string(),
                name: format!("{} (test)", sku),
                kind: ProductKind::Product,
                unit_price,
                on_hand,
                min_stock: None,
            })
            .await
            .expect("seed product")
    }

    pub async fn open_register(
        &self,
        opening: BucketAmounts,
        rate: Decimal,
    ) -> register_session::Model {
        self.state
            .services
            .registers
            .open(OpenRegisterInput {
                opening,
                rate_official: rate,
                rate_parallel: rate,
                operator: "supervisor-1".to_string(),
                note: None,
            })
            .await
            .expect("open register")
    }

    pub async fn on_hand(&self, product_id: Uuid) -> i32 {
        self.state
            .services
            .catalog
            .get(product_id)
            .await
            .expect("product lookup")
            .on_hand
    }
}

pub fn cash_ves(amount: Decimal) -> NewPayment {
    NewPayment {
        method: PaymentMethod::CashVes,
        amount,
        currency: PaymentCurrency::Ves,
        bank: None,
        reference: None,
    }
}

pub fn cash_usd(amount: Decimal) -> NewPayment {
    NewPayment {
        method: PaymentMethod::CashUsd,
        amount,
        currency: PaymentCurrency::Usd,
        bank: None,
        reference: None,
    }
}

pub fn mobile_payment(amount: Decimal) -> NewPayment {
    NewPayment {
        method: PaymentMethod::MobilePayment,
        amount,
        currency: PaymentCurrency::Ves,
        bank: Some("0102".to_string()),
        reference: Some("REF-TEST".to_string()),
    }
}
