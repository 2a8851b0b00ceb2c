//! Concurrency and lifecycle tests for the inventory reservation engine:
//! no oversell under concurrent reserve calls, idempotent release, expiry
//! sweep behavior, and the commit fence.

mod common;

use chrono::{Duration, Utc};
use common::TestApp;
use rust_decimal_macros::dec;
use uuid::Uuid;

use caja_api::errors::ServiceError;
use caja_api::services::reservations::{ReserveItem, ReserveOutcome};

fn item(product_id: Uuid, quantity: i32) -> ReserveItem {
    ReserveItem {
        product_id,
        quantity,
    }
}

#[tokio::test]
async fn concurrent_reservations_never_oversell() {
    let app = TestApp::new().await;
    let product = app.seed_product("CONC-1", dec!(5.00), 10).await;

    // 20 sessions race for one unit each; only 10 can win.
    let mut tasks = Vec::new();
    for _ in 0..20 {
        let reservations = app.state.services.reservations.clone();
        let product_id = product.id;
        tasks.push(tokio::spawn(async move {
            let outcome = reservations
                .reserve(vec![item(product_id, 1)], Uuid::new_v4())
                .await
                .expect("reserve call");
            matches!(outcome, ReserveOutcome::Reserved(_))
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.expect("task") {
            successes += 1;
        }
    }

    assert_eq!(
        successes, 10,
        "exactly 10 reservations should succeed; got {}",
        successes
    );
    assert_eq!(
        app.state
            .services
            .reservations
            .total_reserved(product.id)
            .await,
        10
    );
    // Reservations never touch the persisted on-hand quantity.
    assert_eq!(app.on_hand(product.id).await, 10);
}

#[tokio::test]
async fn loser_of_a_race_gets_structured_conflict() {
    let app = TestApp::new().await;
    let product = app.seed_product("RACE-35", dec!(5.00), 5).await;

    let session_a = Uuid::new_v4();
    let session_b = Uuid::new_v4();

    let r1 = app.state.services.reservations.clone();
    let r2 = app.state.services.reservations.clone();
    let (pa, pb) = (product.id, product.id);
    let (a, b) = tokio::join!(
        tokio::spawn(async move { r1.reserve(vec![item(pa, 3)], session_a).await }),
        tokio::spawn(async move { r2.reserve(vec![item(pb, 3)], session_b).await }),
    );

    let outcomes = [a.unwrap().unwrap(), b.unwrap().unwrap()];
    let winners = outcomes
        .iter()
        .filter(|o| matches!(o, ReserveOutcome::Reserved(_)))
        .count();
    assert_eq!(winners, 1, "exactly one session may take 3 of 5");

    let conflict = outcomes
        .iter()
        .find_map(|o| match o {
            ReserveOutcome::Conflict(c) => Some(c.clone()),
            _ => None,
        })
        .expect("one session must get a conflict");
    assert_eq!(conflict.len(), 1);
    assert_eq!(conflict[0].product_id, product.id);
    assert_eq!(conflict[0].requested, 3);
    assert_eq!(conflict[0].available, 2);
}

#[tokio::test]
async fn batch_reservation_is_all_or_nothing() {
    let app = TestApp::new().await;
    let plenty = app.seed_product("BATCH-OK", dec!(1.00), 100).await;
    let scarce = app.seed_product("BATCH-NO", dec!(1.00), 1).await;

    let session = Uuid::new_v4();
    let outcome = app
        .state
        .services
        .reservations
        .reserve(vec![item(plenty.id, 5), item(scarce.id, 3)], session)
        .await
        .expect("reserve call");

    let ReserveOutcome::Conflict(conflicts) = outcome else {
        panic!("batch with an unavailable item must fail");
    };
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].product_id, scarce.id);

    // The passing item must not be left partially held.
    assert_eq!(
        app.state.services.reservations.total_reserved(plenty.id).await,
        0
    );
}

#[tokio::test]
async fn re_reserving_replaces_the_sessions_hold() {
    let app = TestApp::new().await;
    let product = app.seed_product("UPSERT-1", dec!(2.00), 5).await;
    let session = Uuid::new_v4();
    let reservations = &app.state.services.reservations;

    for quantity in [3, 5] {
        let outcome = reservations
            .reserve(vec![item(product.id, quantity)], session)
            .await
            .expect("reserve call");
        assert!(matches!(outcome, ReserveOutcome::Reserved(_)));
    }

    // The second call replaced the first hold instead of stacking 3 + 5.
    assert_eq!(reservations.total_reserved(product.id).await, 5);

    // Another session now sees zero availability.
    let outcome = reservations
        .reserve(vec![item(product.id, 1)], Uuid::new_v4())
        .await
        .expect("reserve call");
    let ReserveOutcome::Conflict(conflicts) = outcome else {
        panic!("no availability should remain");
    };
    assert_eq!(conflicts[0].available, 0);
}

#[tokio::test]
async fn release_is_idempotent_and_never_touches_on_hand() {
    let app = TestApp::new().await;
    let product = app.seed_product("REL-1", dec!(2.00), 5).await;
    let session = Uuid::new_v4();
    let reservations = &app.state.services.reservations;

    // Releasing a hold that never existed is a no-op.
    reservations
        .release(product.id, session, None)
        .await
        .expect("release of nothing");

    reservations
        .reserve(vec![item(product.id, 4)], session)
        .await
        .expect("reserve call");

    reservations
        .release(product.id, session, Some(1))
        .await
        .expect("partial release");
    assert_eq!(reservations.total_reserved(product.id).await, 3);

    reservations
        .release(product.id, session, None)
        .await
        .expect("full release");
    reservations
        .release(product.id, session, None)
        .await
        .expect("double release");

    assert_eq!(reservations.total_reserved(product.id).await, 0);
    assert_eq!(app.on_hand(product.id).await, 5);
}

#[tokio::test]
async fn release_all_frees_availability_for_other_sessions() {
    let app = TestApp::new().await;
    let product = app.seed_product("RELALL-1", dec!(2.00), 5).await;
    let holder = Uuid::new_v4();
    let waiter = Uuid::new_v4();
    let reservations = &app.state.services.reservations;

    reservations
        .reserve(vec![item(product.id, 5)], holder)
        .await
        .expect("reserve call");

    let outcome = reservations
        .reserve(vec![item(product.id, 1)], waiter)
        .await
        .expect("reserve call");
    assert!(matches!(outcome, ReserveOutcome::Conflict(_)));

    let released = reservations.release_all(holder).await.expect("release all");
    assert_eq!(released, 1);
    // Cancellation is idempotent.
    assert_eq!(reservations.release_all(holder).await.expect("again"), 0);

    let outcome = reservations
        .reserve(vec![item(product.id, 5)], waiter)
        .await
        .expect("reserve call");
    assert!(matches!(outcome, ReserveOutcome::Reserved(_)));
}

#[tokio::test]
async fn heartbeat_renews_until_holds_are_gone() {
    let app = TestApp::new().await;
    let product = app.seed_product("HB-1", dec!(2.00), 5).await;
    let session = Uuid::new_v4();
    let reservations = &app.state.services.reservations;

    reservations
        .reserve(vec![item(product.id, 2)], session)
        .await
        .expect("reserve call");

    assert_eq!(reservations.renew(session).await.expect("renew"), 1);

    reservations.release_all(session).await.expect("release all");
    // An expired/empty session renews nothing; the API maps this to 404.
    assert_eq!(reservations.renew(session).await.expect("renew"), 0);
}

#[tokio::test]
async fn sweeper_honors_ttl_plus_grace() {
    let app = TestApp::new().await;
    let product = app.seed_product("SWEEP-1", dec!(2.00), 5).await;
    let session = Uuid::new_v4();
    let reservations = &app.state.services.reservations;

    reservations
        .reserve(vec![item(product.id, 5)], session)
        .await
        .expect("reserve call");

    let ttl = Duration::from_std(app.state.config.reservation_ttl()).unwrap();
    let grace = Duration::from_std(app.state.config.reservation_grace()).unwrap();

    // Past TTL but inside the grace margin: nothing is reclaimed yet.
    let reclaimed = reservations
        .sweep_expired(Utc::now() + ttl + grace / 2)
        .await
        .expect("sweep");
    assert_eq!(reclaimed, 0);

    // Past TTL plus grace: the hold is reclaimed and availability returns.
    let reclaimed = reservations
        .sweep_expired(Utc::now() + ttl + grace + Duration::seconds(1))
        .await
        .expect("sweep");
    assert_eq!(reclaimed, 1);
    assert_eq!(reservations.total_reserved(product.id).await, 0);

    let outcome = reservations
        .reserve(vec![item(product.id, 5)], Uuid::new_v4())
        .await
        .expect("reserve call");
    assert!(matches!(outcome, ReserveOutcome::Reserved(_)));
}

#[tokio::test]
async fn sweeper_never_touches_a_commit_in_flight() {
    let app = TestApp::new().await;
    let product = app.seed_product("SWEEP-COMMIT", dec!(2.00), 5).await;
    let session = Uuid::new_v4();
    let reservations = &app.state.services.reservations;

    reservations
        .reserve(vec![item(product.id, 3)], session)
        .await
        .expect("reserve call");

    let holds = reservations.begin_commit(session).await.expect("begin commit");
    assert_eq!(holds.len(), 1);
    assert_eq!(holds[0].quantity, 3);

    // Even arbitrarily far in the future, committing holds stay put.
    let reclaimed = reservations
        .sweep_expired(Utc::now() + Duration::days(365))
        .await
        .expect("sweep");
    assert_eq!(reclaimed, 0);

    // A second commit attempt while one is in flight is rejected.
    let err = reservations.begin_commit(session).await.expect_err("fenced");
    assert!(matches!(err, ServiceError::Conflict(_)));

    // A failed commit returns the holds to the live pool with a fresh TTL.
    reservations.finish_commit(session, false).await;
    assert_eq!(reservations.total_reserved(product.id).await, 3);

    let ttl = Duration::from_std(app.state.config.reservation_ttl()).unwrap();
    let grace = Duration::from_std(app.state.config.reservation_grace()).unwrap();
    let reclaimed = reservations
        .sweep_expired(Utc::now() + ttl + grace + Duration::seconds(1))
        .await
        .expect("sweep");
    assert_eq!(reclaimed, 1);
}

#[tokio::test]
async fn service_products_are_never_stock_checked() {
    let app = TestApp::new().await;

    let service = app
        .state
        .services
        .catalog
        .create(caja_api::services::catalog::CreateProductInput {
            sku: "SVC-DELIVERY".to_string(),
            name: "Delivery".to_string(),
            kind: caja_api::entities::product::ProductKind::Service,
            unit_price: dec!(3.00),
            on_hand: 0,
            min_stock: None,
        })
        .await
        .expect("seed service");

    let outcome = app
        .state
        .services
        .reservations
        .reserve(vec![item(service.id, 99)], Uuid::new_v4())
        .await
        .expect("reserve call");
    assert!(matches!(outcome, ReserveOutcome::Reserved(_)));
    assert_eq!(
        app.state.services.reservations.total_reserved(service.id).await,
        0
    );
}
