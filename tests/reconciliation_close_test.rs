//! Close reconciliation tests: the discrepancy authorization gate and the
//! historical-rate invariant on closed sessions.

mod common;

use common::{cash_ves, TestApp};
use rust_decimal_macros::dec;
use uuid::Uuid;

use caja_api::entities::discrepancy_authorization::CurrencyBucket;
use caja_api::errors::ServiceError;
use caja_api::services::checkout::CommitSaleInput;
use caja_api::services::documents::{DocumentRenderer, TextReceiptRenderer};
use caja_api::services::reconciliation::{AuthorizationInput, BucketAmounts};
use caja_api::services::reservations::{ReserveItem, ReserveOutcome};

const RATE: rust_decimal::Decimal = dec!(36.50);

fn auth(ves: rust_decimal::Decimal) -> AuthorizationInput {
    AuthorizationInput {
        authorized_by: "admin-ceo".to_string(),
        justification: "shortfall acknowledged after recount".to_string(),
        differences: BucketAmounts::new(ves, dec!(0), dec!(0)),
    }
}

#[tokio::test]
async fn discrepancy_gate_blocks_then_accepts_a_matching_authorization() {
    let app = TestApp::new().await;
    app.open_register(BucketAmounts::new(dec!(1000), dec!(0), dec!(0)), RATE)
        .await;
    let registers = &app.state.services.registers;

    // Counted 50 VES short.
    let preview = registers
        .begin_physical_close(
            BucketAmounts::new(dec!(950.00), dec!(0), dec!(0)),
            "supervisor-1".to_string(),
            None,
        )
        .await
        .expect("begin close");
    assert!(preview.requires_authorization);
    assert_eq!(preview.reconciliation.ves_cash.discrepancy, dec!(-50.00));

    // No authorization: blocked.
    let err = registers
        .finalize_close(None, "supervisor-1".to_string(), None)
        .await
        .expect_err("discrepancy without authorization");
    assert!(matches!(err, ServiceError::Conflict(_)));

    // Wrong amount: rejected just the same.
    let err = registers
        .finalize_close(Some(auth(dec!(-40.00))), "supervisor-1".to_string(), None)
        .await
        .expect_err("authorization for the wrong amount");
    assert!(matches!(err, ServiceError::Conflict(_)));

    // Matching authorization: accepted and persisted per bucket.
    let closed = registers
        .finalize_close(Some(auth(dec!(-50.00))), "supervisor-1".to_string(), None)
        .await
        .expect("authorized close");

    assert_eq!(closed.authorizations.len(), 1);
    let record = &closed.authorizations[0];
    assert_eq!(record.bucket, CurrencyBucket::VesCash);
    assert_eq!(record.expected, dec!(1000.00));
    assert_eq!(record.counted, dec!(950.00));
    assert_eq!(record.difference, dec!(-50.00));
    assert_eq!(record.authorized_by, "admin-ceo");
}

#[tokio::test]
async fn authorization_must_cover_every_discrepant_bucket() {
    let app = TestApp::new().await;
    app.open_register(
        BucketAmounts::new(dec!(1000), dec!(100), dec!(0)),
        RATE,
    )
    .await;
    let registers = &app.state.services.registers;

    // VES short 50 and USD over 5: one covered, one not.
    registers
        .begin_physical_close(
            BucketAmounts::new(dec!(950.00), dec!(105.00), dec!(0)),
            "supervisor-1".to_string(),
            None,
        )
        .await
        .expect("begin close");

    let err = registers
        .finalize_close(Some(auth(dec!(-50.00))), "supervisor-1".to_string(), None)
        .await
        .expect_err("usd bucket not covered");
    assert!(matches!(err, ServiceError::Conflict(_)));

    let full = AuthorizationInput {
        authorized_by: "admin-ceo".to_string(),
        justification: "recount signed off".to_string(),
        differences: BucketAmounts::new(dec!(-50.00), dec!(5.00), dec!(0)),
    };
    let closed = registers
        .finalize_close(Some(full), "supervisor-1".to_string(), None)
        .await
        .expect("both buckets covered");
    assert_eq!(closed.authorizations.len(), 2);
}

#[tokio::test]
async fn closed_sessions_keep_their_historical_rate() {
    let app = TestApp::new().await;
    let first = app
        .open_register(BucketAmounts::ZERO, RATE)
        .await;
    let product = app.seed_product("HIST-1", dec!(10.00), 5).await;

    // Sell 2 x $10 at 36.50 = 730 VES.
    let session = Uuid::new_v4();
    let outcome = app
        .state
        .services
        .reservations
        .reserve(
            vec![ReserveItem {
                product_id: product.id,
                quantity: 2,
            }],
            session,
        )
        .await
        .expect("reserve");
    assert!(matches!(outcome, ReserveOutcome::Reserved(_)));

    app.state
        .services
        .checkout
        .commit_sale(CommitSaleInput {
            checkout_session_id: session,
            payments: vec![cash_ves(dec!(730.00))],
            discount_ves: dec!(0),
            exchange_rate: None,
            customer_name: None,
            note: None,
            operator: "cashier-1".to_string(),
            notify_recipient: None,
        })
        .await
        .expect("commit");

    let registers = &app.state.services.registers;
    registers
        .begin_physical_close(
            BucketAmounts::new(dec!(730.00), dec!(0), dec!(0)),
            "supervisor-1".to_string(),
            None,
        )
        .await
        .expect("begin close");
    let closed = registers
        .finalize_close(None, "supervisor-1".to_string(), None)
        .await
        .expect("close");
    let first_expected = closed.reconciliation.expected();

    // The live rate moves: a later session opens at 40.00.
    app.open_register(BucketAmounts::ZERO, dec!(40.00)).await;

    // Re-running reconciliation on the closed session reproduces the
    // original figures exactly; its stored rate did not move.
    let replay = registers
        .reconciliation_for(first.id)
        .await
        .expect("replay reconciliation");
    assert_eq!(replay.expected(), first_expected);
    assert_eq!(replay.ves_cash.expected, dec!(730.00));

    let stored = registers.get(first.id).await.expect("closed session");
    assert_eq!(stored.rate_official, RATE);

    // The sale transaction still carries the rate it was written with.
    let ledger = registers.transactions(first.id).await.expect("ledger");
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].transaction.exchange_rate, RATE);

    // And the closing report renders from the stored rate, not the new one.
    let authorizations = registers.authorizations(first.id).await.expect("auths");
    let rendered = TextReceiptRenderer
        .render_closing_report(&caja_api::services::registers::ClosedRegister {
            session: stored,
            reconciliation: replay,
            authorizations,
        })
        .expect("render");
    assert!(rendered.body.contains("official 36.5"));
    assert!(!rendered.body.contains("official 40"));
}
