//! Checkout commit tests: reservation conservation, idempotent retry,
//! atomicity when the ledger append fails, and non-fatal side effects.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{cash_usd, cash_ves, TestApp};
use rust_decimal_macros::dec;
use uuid::Uuid;

use caja_api::errors::ServiceError;
use caja_api::services::checkout::CommitSaleInput;
use caja_api::services::documents::RenderedDocument;
use caja_api::services::notifications::NotificationSender;
use caja_api::services::reconciliation::BucketAmounts;
use caja_api::services::registers::NewPayment;
use caja_api::services::reservations::{ReserveItem, ReserveOutcome};

const RATE: rust_decimal::Decimal = dec!(36.50);

fn commit_input(session: Uuid, payments: Vec<NewPayment>) -> CommitSaleInput {
    CommitSaleInput {
        checkout_session_id: session,
        payments,
        discount_ves: dec!(0),
        exchange_rate: None,
        customer_name: Some("Maria Perez".to_string()),
        note: None,
        operator: "cashier-1".to_string(),
        notify_recipient: None,
    }
}

async fn reserve(app: &TestApp, session: Uuid, product: Uuid, quantity: i32) {
    let outcome = app
        .state
        .services
        .reservations
        .reserve(
            vec![ReserveItem {
                product_id: product,
                quantity,
            }],
            session,
        )
        .await
        .expect("reserve call");
    assert!(matches!(outcome, ReserveOutcome::Reserved(_)));
}

#[tokio::test]
async fn commit_deducts_exactly_the_held_quantity() {
    let app = TestApp::new().await;
    app.open_register(BucketAmounts::new(dec!(1000), dec!(0), dec!(0)), RATE)
        .await;
    let product = app.seed_product("COMMIT-1", dec!(5.00), 10).await;

    let session = Uuid::new_v4();
    reserve(&app, session, product.id, 4).await;

    // 4 x $5 at 36.50 = 730 VES
    let result = app
        .state
        .services
        .checkout
        .commit_sale(commit_input(session, vec![cash_ves(dec!(730.00))]))
        .await
        .expect("commit");

    assert!(!result.already_committed);
    assert_eq!(result.record.lines.len(), 1);
    assert_eq!(result.record.lines[0].quantity, 4);
    assert_eq!(result.record.transaction.exchange_rate, RATE);
    assert_eq!(result.record.transaction.amount_ves_cash, dec!(730.00));

    // On-hand dropped by exactly the held quantity; the holds are gone.
    assert_eq!(app.on_hand(product.id).await, 6);
    assert_eq!(
        app.state.services.reservations.total_reserved(product.id).await,
        0
    );

    // The ledger accumulators moved in the same unit.
    let current = app
        .state
        .services
        .registers
        .current()
        .await
        .expect("current")
        .expect("open session");
    assert_eq!(current.ingress_ves_cash, dec!(730.00));
    assert_eq!(current.ingress_usd_cash, dec!(0));
}

#[tokio::test]
async fn commit_is_idempotent_per_checkout_session() {
    let app = TestApp::new().await;
    app.open_register(BucketAmounts::ZERO, RATE).await;
    let product = app.seed_product("IDEM-1", dec!(5.00), 10).await;

    let session = Uuid::new_v4();
    reserve(&app, session, product.id, 2).await;

    let first = app
        .state
        .services
        .checkout
        .commit_sale(commit_input(session, vec![cash_usd(dec!(10))]))
        .await
        .expect("first commit");
    assert!(!first.already_committed);
    assert_eq!(app.on_hand(product.id).await, 8);

    // Retry after a simulated disconnect: same token, no second deduction.
    let second = app
        .state
        .services
        .checkout
        .commit_sale(commit_input(session, vec![cash_usd(dec!(10))]))
        .await
        .expect("replayed commit");
    assert!(second.already_committed);
    assert_eq!(
        second.record.transaction.id,
        first.record.transaction.id
    );
    assert_eq!(app.on_hand(product.id).await, 8);
}

#[tokio::test]
async fn commit_without_holds_is_a_conflict() {
    let app = TestApp::new().await;
    app.open_register(BucketAmounts::ZERO, RATE).await;

    let err = app
        .state
        .services
        .checkout
        .commit_sale(commit_input(Uuid::new_v4(), vec![cash_ves(dec!(10))]))
        .await
        .expect_err("no holds to convert");
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn failed_commit_applies_nothing_and_keeps_the_holds() {
    let app = TestApp::new().await;
    // No register session is open: the ledger append must fail, and with it
    // the whole atomic unit including the stock deduction.
    let product = app.seed_product("ATOMIC-1", dec!(5.00), 10).await;

    let session = Uuid::new_v4();
    reserve(&app, session, product.id, 4).await;

    let err = app
        .state
        .services
        .checkout
        .commit_sale(commit_input(session, vec![cash_ves(dec!(730.00))]))
        .await
        .expect_err("no open register");
    assert!(matches!(err, ServiceError::InvalidOperation(_)));

    // Nothing partially applied.
    assert_eq!(app.on_hand(product.id).await, 10);
    // The holds survived for a retry.
    assert_eq!(
        app.state.services.reservations.total_reserved(product.id).await,
        4
    );

    // After opening a register, the retry goes through.
    app.open_register(BucketAmounts::ZERO, RATE).await;
    let result = app
        .state
        .services
        .checkout
        .commit_sale(commit_input(session, vec![cash_ves(dec!(730.00))]))
        .await
        .expect("retry succeeds");
    assert!(!result.already_committed);
    assert_eq!(app.on_hand(product.id).await, 6);
}

#[tokio::test]
async fn short_payments_abort_the_commit() {
    let app = TestApp::new().await;
    app.open_register(BucketAmounts::ZERO, RATE).await;
    let product = app.seed_product("SHORT-1", dec!(5.00), 10).await;

    let session = Uuid::new_v4();
    reserve(&app, session, product.id, 4).await;

    // 730 VES due, only 500 tendered.
    let err = app
        .state
        .services
        .checkout
        .commit_sale(commit_input(session, vec![cash_ves(dec!(500.00))]))
        .await
        .expect_err("payments short");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    assert_eq!(app.on_hand(product.id).await, 10);
    assert_eq!(
        app.state.services.reservations.total_reserved(product.id).await,
        4
    );
}

struct FailingSender;

#[async_trait]
impl NotificationSender for FailingSender {
    async fn send(
        &self,
        _recipient: &str,
        _document: &RenderedDocument,
    ) -> Result<(), ServiceError> {
        Err(ServiceError::ExternalServiceError(
            "message gateway timed out".to_string(),
        ))
    }
}

#[tokio::test]
async fn notification_failure_never_unwinds_the_sale() {
    let app = TestApp::with_notifier(Arc::new(FailingSender)).await;
    app.open_register(BucketAmounts::ZERO, RATE).await;
    let product = app.seed_product("NOTIFY-1", dec!(5.00), 10).await;

    let session = Uuid::new_v4();
    reserve(&app, session, product.id, 1).await;

    let mut input = commit_input(session, vec![cash_usd(dec!(5))]);
    input.notify_recipient = Some("+58-412-5550123".to_string());

    let result = app
        .state
        .services
        .checkout
        .commit_sale(input)
        .await
        .expect("commit succeeds despite delivery failure");

    assert_eq!(result.notification_delivered, Some(false));
    // The sale and the deduction stand.
    assert_eq!(app.on_hand(product.id).await, 9);
    assert!(!result.already_committed);
}

#[tokio::test]
async fn discount_reduces_the_required_payment() {
    let app = TestApp::new().await;
    app.open_register(BucketAmounts::ZERO, RATE).await;
    let product = app.seed_product("DISC-1", dec!(10.00), 5).await;

    let session = Uuid::new_v4();
    reserve(&app, session, product.id, 2).await;

    // 2 x $10 = 730 VES; 30 VES discount leaves 700 due.
    let mut input = commit_input(session, vec![cash_ves(dec!(700.00))]);
    input.discount_ves = dec!(30.00);

    let result = app
        .state
        .services
        .checkout
        .commit_sale(input)
        .await
        .expect("discounted commit");
    assert_eq!(result.record.transaction.amount_ves_cash, dec!(700.00));
    assert_eq!(app.on_hand(product.id).await, 3);
}
