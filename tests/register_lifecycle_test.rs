//! Register session lifecycle tests: single active drawer, accumulator
//! updates, state transitions, and terminal-state errors.

mod common;

use common::{cash_ves, mobile_payment, TestApp};
use rust_decimal_macros::dec;

use caja_api::entities::register_session::RegisterState;
use caja_api::entities::register_transaction::Direction;
use caja_api::errors::ServiceError;
use caja_api::services::reconciliation::BucketAmounts;
use caja_api::services::registers::{NewTransactionInput, OpenRegisterInput};

const RATE: rust_decimal::Decimal = dec!(36.50);

fn manual_entry(direction: Direction, payments: Vec<caja_api::services::registers::NewPayment>) -> NewTransactionInput {
    NewTransactionInput {
        direction,
        category: "manual entry".to_string(),
        lines: Vec::new(),
        payments,
        exchange_rate: None,
        checkout_session_id: None,
        customer_name: None,
        note: None,
        operator: "cashier-1".to_string(),
    }
}

#[tokio::test]
async fn only_one_session_may_be_active() {
    let app = TestApp::new().await;
    app.open_register(BucketAmounts::ZERO, RATE).await;

    let err = app
        .state
        .services
        .registers
        .open(OpenRegisterInput {
            opening: BucketAmounts::ZERO,
            rate_official: RATE,
            rate_parallel: RATE,
            operator: "supervisor-2".to_string(),
            note: None,
        })
        .await
        .expect_err("second open must conflict");
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn duplicate_open_is_still_blocked_while_pending_close() {
    let app = TestApp::new().await;
    app.open_register(BucketAmounts::ZERO, RATE).await;

    app.state
        .services
        .registers
        .force_pending_close("supervisor-1".to_string())
        .await
        .expect("force pending");

    let err = app
        .state
        .services
        .registers
        .open(OpenRegisterInput {
            opening: BucketAmounts::ZERO,
            rate_official: RATE,
            rate_parallel: RATE,
            operator: "supervisor-2".to_string(),
            note: None,
        })
        .await
        .expect_err("pending session still owns the drawer");
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn appends_move_the_right_accumulators() {
    let app = TestApp::new().await;
    app.open_register(BucketAmounts::new(dec!(1000), dec!(0), dec!(0)), RATE)
        .await;
    let registers = &app.state.services.registers;

    registers
        .create_manual_transaction(manual_entry(
            Direction::Ingress,
            vec![cash_ves(dec!(500.00)), mobile_payment(dec!(200.00))],
        ))
        .await
        .expect("ingress entry");

    registers
        .create_manual_transaction(manual_entry(
            Direction::Egress,
            vec![cash_ves(dec!(120.00))],
        ))
        .await
        .expect("egress entry");

    let session = registers.current().await.expect("current").expect("open");
    assert_eq!(session.ingress_ves_cash, dec!(500.00));
    assert_eq!(session.ingress_transfer, dec!(200.00));
    assert_eq!(session.ingress_usd_cash, dec!(0));
    assert_eq!(session.egress_ves_cash, dec!(120.00));

    let records = registers.transactions(session.id).await.expect("ledger");
    assert_eq!(records.len(), 2);
    let ingress = records
        .iter()
        .find(|r| r.transaction.receipt_code.starts_with('I'))
        .expect("ingress entry recorded");
    assert!(records
        .iter()
        .any(|r| r.transaction.receipt_code.starts_with('E')));
    assert_eq!(ingress.payments.len(), 2);
}

#[tokio::test]
async fn append_without_an_open_register_is_a_caller_error() {
    let app = TestApp::new().await;

    let err = app
        .state
        .services
        .registers
        .create_manual_transaction(manual_entry(
            Direction::Ingress,
            vec![cash_ves(dec!(10.00))],
        ))
        .await
        .expect_err("no open session");
    assert!(matches!(err, ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn opening_scenario_closes_clean_without_authorization() {
    // Open with 1000 VES, take one ingress of 500, count 1500 at close.
    let app = TestApp::new().await;
    app.open_register(BucketAmounts::new(dec!(1000), dec!(0), dec!(0)), RATE)
        .await;
    let registers = &app.state.services.registers;

    registers
        .create_manual_transaction(manual_entry(
            Direction::Ingress,
            vec![cash_ves(dec!(500.00))],
        ))
        .await
        .expect("ingress entry");

    let preview = registers
        .begin_physical_close(
            BucketAmounts::new(dec!(1500.00), dec!(0), dec!(0)),
            "supervisor-1".to_string(),
            None,
        )
        .await
        .expect("begin close");

    assert_eq!(preview.reconciliation.ves_cash.expected, dec!(1500.00));
    assert_eq!(preview.reconciliation.ves_cash.discrepancy, dec!(0));
    assert!(!preview.requires_authorization);

    let closed = registers
        .finalize_close(None, "supervisor-1".to_string(), None)
        .await
        .expect("finalize without authorization");
    assert_eq!(closed.session.state, RegisterState::Closed);
    assert!(closed.authorizations.is_empty());
}

#[tokio::test]
async fn begin_close_freezes_the_session_against_appends() {
    let app = TestApp::new().await;
    app.open_register(BucketAmounts::ZERO, RATE).await;
    let registers = &app.state.services.registers;

    registers
        .begin_physical_close(BucketAmounts::ZERO, "supervisor-1".to_string(), None)
        .await
        .expect("begin close");

    let err = registers
        .create_manual_transaction(manual_entry(
            Direction::Ingress,
            vec![cash_ves(dec!(10.00))],
        ))
        .await
        .expect_err("frozen session takes no transactions");
    assert!(matches!(err, ServiceError::InvalidStatus(_)));
}

#[tokio::test]
async fn closed_is_terminal() {
    let app = TestApp::new().await;
    app.open_register(BucketAmounts::ZERO, RATE).await;
    let registers = &app.state.services.registers;

    registers
        .begin_physical_close(BucketAmounts::ZERO, "supervisor-1".to_string(), None)
        .await
        .expect("begin close");
    registers
        .finalize_close(None, "supervisor-1".to_string(), None)
        .await
        .expect("finalize");

    // No session accepts appends any more.
    let err = registers
        .create_manual_transaction(manual_entry(
            Direction::Ingress,
            vec![cash_ves(dec!(10.00))],
        ))
        .await
        .expect_err("closed register");
    assert!(matches!(err, ServiceError::InvalidOperation(_)));

    // Finalizing again finds nothing to finalize.
    let err = registers
        .finalize_close(None, "supervisor-1".to_string(), None)
        .await
        .expect_err("nothing to finalize");
    assert!(matches!(err, ServiceError::InvalidOperation(_)));

    // A new day can open a fresh session.
    app.open_register(BucketAmounts::ZERO, RATE).await;
}

#[tokio::test]
async fn finalize_requires_a_recorded_count() {
    let app = TestApp::new().await;
    app.open_register(BucketAmounts::ZERO, RATE).await;
    let registers = &app.state.services.registers;

    // Straight to finalize while still open: must begin a close first.
    let err = registers
        .finalize_close(None, "supervisor-1".to_string(), None)
        .await
        .expect_err("close not begun");
    assert!(matches!(err, ServiceError::InvalidStatus(_)));

    // Scheduled force-close parks the session without counted amounts.
    registers
        .force_pending_close("scheduler".to_string())
        .await
        .expect("force pending");

    let err = registers
        .finalize_close(None, "supervisor-1".to_string(), None)
        .await
        .expect_err("no physical count recorded yet");
    assert!(matches!(err, ServiceError::Conflict(_)));

    // Counting the drawer unblocks the finalize.
    registers
        .begin_physical_close(BucketAmounts::ZERO, "supervisor-1".to_string(), None)
        .await
        .expect("record count");
    registers
        .finalize_close(None, "supervisor-1".to_string(), None)
        .await
        .expect("finalize after count");
}

#[tokio::test]
async fn ledger_closure_holds_for_any_append_order() {
    let app = TestApp::new().await;
    app.open_register(BucketAmounts::new(dec!(100), dec!(0), dec!(50)), RATE)
        .await;
    let registers = &app.state.services.registers;

    // Mixed directions and buckets, in an arbitrary order.
    let entries = [
        (Direction::Ingress, dec!(200.00)),
        (Direction::Egress, dec!(30.00)),
        (Direction::Ingress, dec!(70.00)),
        (Direction::Egress, dec!(40.00)),
        (Direction::Ingress, dec!(15.00)),
    ];
    for (direction, amount) in entries {
        registers
            .create_manual_transaction(manual_entry(direction, vec![cash_ves(amount)]))
            .await
            .expect("entry");
    }

    let preview = registers
        .begin_physical_close(
            BucketAmounts::new(dec!(315.00), dec!(0), dec!(50)),
            "supervisor-1".to_string(),
            None,
        )
        .await
        .expect("begin close");

    // 100 + (200 + 70 + 15) − (30 + 40) = 315, independent of append order.
    assert_eq!(preview.reconciliation.ves_cash.expected, dec!(315.00));
    assert_eq!(preview.reconciliation.ves_cash.discrepancy, dec!(0));
    assert_eq!(preview.reconciliation.transfer.expected, dec!(50));
}
