//! Inventory Reservation Engine
//!
//! Holds inventory provisionally for checkout sessions without touching
//! persisted on-hand quantity until a sale commits. The hold table is owned
//! by this service and guarded by a single async mutex: every operation that
//! reads availability also mutates under the same lock, so two concurrent
//! `reserve` calls against the same product serialize and check-then-act
//! races cannot oversell. The store read for on-hand happens inside the
//! critical section on purpose; external I/O (rendering, notification) never
//! does.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lazy_static::lazy_static;
use prometheus::{register_int_counter, IntCounter};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::product::{self, Entity as ProductEntity};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

lazy_static! {
    static ref STOCK_RESERVATIONS: IntCounter = register_int_counter!(
        "caja_stock_reservations_total",
        "Total number of stock holds placed"
    )
    .expect("metric can be created");
    static ref STOCK_RESERVATION_CONFLICTS: IntCounter = register_int_counter!(
        "caja_stock_reservation_conflicts_total",
        "Total number of reserve batches rejected for insufficient availability"
    )
    .expect("metric can be created");
    static ref STOCK_RELEASES: IntCounter = register_int_counter!(
        "caja_stock_releases_total",
        "Total number of stock holds released"
    )
    .expect("metric can be created");
    static ref STOCK_HOLDS_EXPIRED: IntCounter = register_int_counter!(
        "caja_stock_holds_expired_total",
        "Total number of stock holds reclaimed by the expiry sweeper"
    )
    .expect("metric can be created");
}

/// Timing knobs for the hold table.
#[derive(Debug, Clone)]
pub struct ReservationConfig {
    /// How long a hold lives without a heartbeat
    pub ttl: Duration,
    /// Margin past the TTL before the sweeper may reclaim. Must exceed the
    /// heartbeat interval so a commit started just before expiry always
    /// finishes first.
    pub grace: Duration,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            grace: Duration::from_secs(150),
        }
    }
}

/// A session-scoped claim on inventory quantity. Exclusively owned by the
/// session that created it.
#[derive(Debug, Clone)]
struct Hold {
    product_id: Uuid,
    session_id: Uuid,
    quantity: i32,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    /// Set while a commit is converting this hold; the sweeper and the
    /// release paths leave flagged holds alone.
    committing: bool,
}

#[derive(Debug, Default)]
struct HoldTable {
    holds: HashMap<(Uuid, Uuid), Hold>,
}

impl HoldTable {
    fn reserved_by_others(&self, product_id: Uuid, session_id: Uuid) -> i32 {
        self.holds
            .values()
            .filter(|h| h.product_id == product_id && h.session_id != session_id)
            .map(|h| h.quantity)
            .sum()
    }

    fn reserved_by_session(&self, product_id: Uuid, session_id: Uuid) -> i32 {
        self.holds
            .get(&(product_id, session_id))
            .map(|h| h.quantity)
            .unwrap_or(0)
    }

    fn session_keys(&self, session_id: Uuid) -> Vec<(Uuid, Uuid)> {
        self.holds
            .keys()
            .filter(|(_, sid)| *sid == session_id)
            .copied()
            .collect()
    }
}

/// One item of a reserve request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReserveItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// A successfully placed (or refreshed) hold.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReservedHold {
    pub product_id: Uuid,
    pub quantity: i32,
    pub expires_at: DateTime<Utc>,
}

/// Structured conflict detail for a product that could not be reserved.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockConflict {
    pub product_id: Uuid,
    pub requested: i32,
    pub available: i32,
}

/// Result of an all-or-nothing reserve batch.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReservationBatch {
    pub session_id: Uuid,
    pub reserved: Vec<ReservedHold>,
}

/// Either the whole batch reserved or nothing changed.
#[derive(Debug, Clone)]
pub enum ReserveOutcome {
    Reserved(ReservationBatch),
    /// One entry per failing product; no partial holds were left behind
    Conflict(Vec<StockConflict>),
}

/// Availability snapshot for one product, as seen by one session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductAvailability {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub stocked: bool,
    pub on_hand: i32,
    pub reserved_by_others: i32,
    pub reserved_own: i32,
    pub available: i32,
    pub low_stock: bool,
}

/// Holds snapshotted by `begin_commit`, consumed by the checkout service.
#[derive(Debug, Clone)]
pub struct CommittedHold {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Service owning the reservation table.
pub struct ReservationService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    table: Mutex<HoldTable>,
    config: ReservationConfig,
}

impl ReservationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        config: ReservationConfig,
    ) -> Self {
        Self {
            db,
            event_sender,
            table: Mutex::new(HoldTable::default()),
            config,
        }
    }

    fn ttl(&self) -> ChronoDuration {
        ChronoDuration::from_std(self.config.ttl).unwrap_or_else(|_| ChronoDuration::seconds(300))
    }

    fn grace(&self) -> ChronoDuration {
        ChronoDuration::from_std(self.config.grace).unwrap_or_else(|_| ChronoDuration::seconds(150))
    }

    /// Places holds for every item or none of them.
    ///
    /// Availability per product is `on_hand − reserved_by_other_sessions`;
    /// the session's own existing hold is excluded so re-reserving the same
    /// product replaces the quantity instead of stacking on top of it.
    /// Service-kind products need no stock and always pass.
    #[instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn reserve(
        &self,
        items: Vec<ReserveItem>,
        session_id: Uuid,
    ) -> Result<ReserveOutcome, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Reserve request must contain at least one item".to_string(),
            ));
        }
        for item in &items {
            if item.quantity <= 0 {
                return Err(ServiceError::ValidationError(format!(
                    "Quantity for product {} must be positive",
                    item.product_id
                )));
            }
        }
        {
            let mut seen = std::collections::HashSet::new();
            for item in &items {
                if !seen.insert(item.product_id) {
                    return Err(ServiceError::ValidationError(format!(
                        "Product {} appears more than once in the batch",
                        item.product_id
                    )));
                }
            }
        }

        let mut table = self.table.lock().await;

        if table
            .holds
            .values()
            .any(|h| h.session_id == session_id && h.committing)
        {
            return Err(ServiceError::Conflict(format!(
                "A commit is in flight for checkout session {}",
                session_id
            )));
        }

        // Store read inside the critical section: the lock is what makes the
        // availability check and the hold insertion one atomic step.
        let ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let products: HashMap<Uuid, product::Model> = ProductEntity::find()
            .filter(product::Column::Id.is_in(ids.clone()))
            .filter(product::Column::Active.eq(true))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        for id in &ids {
            if !products.contains_key(id) {
                return Err(ServiceError::NotFound(format!(
                    "Product {} not found or inactive",
                    id
                )));
            }
        }

        let mut conflicts = Vec::new();
        for item in &items {
            let product = &products[&item.product_id];
            if !product.kind.is_stocked() {
                continue;
            }

            let reserved_others = table.reserved_by_others(product.id, session_id);
            let available = (product.on_hand - reserved_others).max(0);
            if item.quantity > available {
                conflicts.push(StockConflict {
                    product_id: product.id,
                    requested: item.quantity,
                    available,
                });
            }
        }

        if !conflicts.is_empty() {
            STOCK_RESERVATION_CONFLICTS.inc();
            info!(
                session_id = %session_id,
                conflicts = conflicts.len(),
                "Reserve batch rejected, nothing held"
            );
            return Ok(ReserveOutcome::Conflict(conflicts));
        }

        let now = Utc::now();
        let expires_at = now + self.ttl();
        let mut reserved = Vec::with_capacity(items.len());
        let mut events = Vec::new();

        for item in &items {
            let product = &products[&item.product_id];
            if product.kind.is_stocked() {
                let previous = table.holds.insert(
                    (product.id, session_id),
                    Hold {
                        product_id: product.id,
                        session_id,
                        quantity: item.quantity,
                        created_at: now,
                        expires_at,
                        committing: false,
                    },
                );
                if previous.is_none() {
                    STOCK_RESERVATIONS.inc();
                }
                events.push(Event::StockReserved {
                    session_id,
                    product_id: product.id,
                    quantity: item.quantity,
                    expires_at,
                });
            }
            reserved.push(ReservedHold {
                product_id: product.id,
                quantity: item.quantity,
                expires_at,
            });
        }

        drop(table);

        for event in events {
            self.event_sender.send_or_log(event).await;
        }

        Ok(ReserveOutcome::Reserved(ReservationBatch {
            session_id,
            reserved,
        }))
    }

    /// Releases one hold, fully or partially. Idempotent: releasing a hold
    /// that does not exist is a no-op, not an error.
    #[instrument(skip(self))]
    pub async fn release(
        &self,
        product_id: Uuid,
        session_id: Uuid,
        quantity: Option<i32>,
    ) -> Result<(), ServiceError> {
        if let Some(q) = quantity {
            if q <= 0 {
                return Err(ServiceError::ValidationError(
                    "Release quantity must be positive".to_string(),
                ));
            }
        }

        let mut table = self.table.lock().await;
        let key = (product_id, session_id);

        let (committing, held) = match table.holds.get(&key) {
            Some(hold) => (hold.committing, hold.quantity),
            None => return Ok(()),
        };
        if committing {
            // A commit owns these units now; the release becomes a no-op.
            return Ok(());
        }

        let released = match quantity {
            Some(q) if q < held => {
                if let Some(hold) = table.holds.get_mut(&key) {
                    hold.quantity -= q;
                }
                q
            }
            _ => {
                table.holds.remove(&key);
                held
            }
        };
        drop(table);

        STOCK_RELEASES.inc();
        self.event_sender
            .send_or_log(Event::StockReleased {
                session_id,
                product_id,
                quantity: released,
            })
            .await;

        Ok(())
    }

    /// Cancellation primitive: drops every hold the session owns. Safe to
    /// call repeatedly (wizard close, unload handler, retry).
    #[instrument(skip(self))]
    pub async fn release_all(&self, session_id: Uuid) -> Result<usize, ServiceError> {
        let mut table = self.table.lock().await;
        let keys = table.session_keys(session_id);

        let mut released = 0;
        for key in keys {
            let committing = table.holds.get(&key).map(|h| h.committing).unwrap_or(false);
            if !committing {
                table.holds.remove(&key);
                released += 1;
            }
        }
        drop(table);

        if released > 0 {
            STOCK_RELEASES.inc_by(released as u64);
        }
        self.event_sender
            .send_or_log(Event::SessionReleased {
                session_id,
                holds_released: released,
            })
            .await;

        Ok(released)
    }

    /// Heartbeat: pushes the expiry of every hold the session owns. Returns
    /// the number renewed; zero means the session has nothing left and must
    /// re-reserve.
    #[instrument(skip(self))]
    pub async fn renew(&self, session_id: Uuid) -> Result<usize, ServiceError> {
        let mut table = self.table.lock().await;
        let expires_at = Utc::now() + self.ttl();

        let mut renewed = 0;
        for hold in table
            .holds
            .values_mut()
            .filter(|h| h.session_id == session_id && !h.committing)
        {
            hold.expires_at = expires_at;
            renewed += 1;
        }

        Ok(renewed)
    }

    /// Snapshots the session's holds and flags them as committing. The
    /// flagged holds still count against availability but can no longer be
    /// released, renewed or swept; `finish_commit` settles them.
    pub async fn begin_commit(&self, session_id: Uuid) -> Result<Vec<CommittedHold>, ServiceError> {
        let mut table = self.table.lock().await;
        let keys = table.session_keys(session_id);

        if keys.is_empty() {
            return Err(ServiceError::Conflict(format!(
                "Checkout session {} holds no inventory",
                session_id
            )));
        }
        if keys
            .iter()
            .any(|k| table.holds.get(k).map(|h| h.committing).unwrap_or(false))
        {
            return Err(ServiceError::Conflict(format!(
                "A commit is already in flight for checkout session {}",
                session_id
            )));
        }

        let mut snapshot = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(hold) = table.holds.get_mut(&key) {
                hold.committing = true;
                snapshot.push(CommittedHold {
                    product_id: hold.product_id,
                    quantity: hold.quantity,
                });
            }
        }

        Ok(snapshot)
    }

    /// Settles a commit attempt. Success removes the flagged holds for good;
    /// failure returns them to the live pool with a fresh TTL so the client
    /// can retry the whole operation.
    pub async fn finish_commit(&self, session_id: Uuid, success: bool) {
        let mut table = self.table.lock().await;
        let keys = table.session_keys(session_id);
        let expires_at = Utc::now() + self.ttl();

        for key in keys {
            let committing = table.holds.get(&key).map(|h| h.committing).unwrap_or(false);
            if !committing {
                continue;
            }
            if success {
                table.holds.remove(&key);
            } else if let Some(hold) = table.holds.get_mut(&key) {
                hold.committing = false;
                hold.expires_at = expires_at;
            }
        }
    }

    /// Availability snapshot for one product as seen by one session.
    #[instrument(skip(self))]
    pub async fn availability(
        &self,
        product_id: Uuid,
        session_id: Option<Uuid>,
    ) -> Result<ProductAvailability, ServiceError> {
        let product = ProductEntity::find_by_id(product_id)
            .filter(product::Column::Active.eq(true))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found or inactive", product_id))
            })?;

        let table = self.table.lock().await;
        let viewer = session_id.unwrap_or_else(Uuid::nil);
        let reserved_others = table.reserved_by_others(product_id, viewer);
        let reserved_own = table.reserved_by_session(product_id, viewer);
        drop(table);

        let stocked = product.kind.is_stocked();
        let available = if stocked {
            (product.on_hand - reserved_others).max(0)
        } else {
            i32::MAX
        };

        Ok(ProductAvailability {
            product_id,
            sku: product.sku,
            name: product.name,
            stocked,
            on_hand: product.on_hand,
            reserved_by_others: reserved_others,
            reserved_own,
            available,
            low_stock: stocked
                && product
                    .min_stock
                    .map(|min| available <= min)
                    .unwrap_or(false),
        })
    }

    /// Reclaims holds whose TTL plus grace margin has passed. Committing
    /// holds are never touched. Returns the number reclaimed.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let grace = self.grace();
        let mut table = self.table.lock().await;

        let expired: Vec<(Uuid, Uuid)> = table
            .holds
            .values()
            .filter(|h| !h.committing && h.expires_at + grace < now)
            .map(|h| (h.product_id, h.session_id))
            .collect();

        let mut events = Vec::with_capacity(expired.len());
        for key in &expired {
            if let Some(hold) = table.holds.remove(key) {
                warn!(
                    session_id = %hold.session_id,
                    product_id = %hold.product_id,
                    quantity = hold.quantity,
                    held_since = %hold.created_at,
                    "Reclaiming expired hold"
                );
                events.push(Event::HoldsExpired {
                    session_id: hold.session_id,
                    product_id: hold.product_id,
                    quantity: hold.quantity,
                    expired_at: now,
                });
            }
        }
        drop(table);

        if !events.is_empty() {
            STOCK_HOLDS_EXPIRED.inc_by(events.len() as u64);
        }
        let count = events.len();
        for event in events {
            self.event_sender.send_or_log(event).await;
        }

        Ok(count)
    }

    /// Total quantity currently held for a product across all sessions.
    /// Diagnostic; used by tests to assert the no-oversell property.
    pub async fn total_reserved(&self, product_id: Uuid) -> i32 {
        let table = self.table.lock().await;
        table
            .holds
            .values()
            .filter(|h| h.product_id == product_id)
            .map(|h| h.quantity)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hold(product_id: Uuid, session_id: Uuid, quantity: i32, committing: bool) -> Hold {
        let now = Utc::now();
        Hold {
            product_id,
            session_id,
            quantity,
            created_at: now,
            expires_at: now,
            committing,
        }
    }

    #[test]
    fn reserved_by_others_excludes_own_session() {
        let product = Uuid::new_v4();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut table = HoldTable::default();
        table.holds.insert((product, me), hold(product, me, 2, false));
        table
            .holds
            .insert((product, other), hold(product, other, 3, false));

        assert_eq!(table.reserved_by_others(product, me), 3);
        assert_eq!(table.reserved_by_session(product, me), 2);
    }

    #[test]
    fn committing_holds_still_count_against_availability() {
        let product = Uuid::new_v4();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut table = HoldTable::default();
        table
            .holds
            .insert((product, other), hold(product, other, 4, true));

        // The units are spoken for until finish_commit settles them.
        assert_eq!(table.reserved_by_others(product, me), 4);
    }

    #[test]
    fn session_keys_scopes_to_one_session() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();

        let mut table = HoldTable::default();
        table.holds.insert((p1, me), hold(p1, me, 1, false));
        table.holds.insert((p2, me), hold(p2, me, 1, false));
        table.holds.insert((p1, other), hold(p1, other, 1, false));

        let mut keys = table.session_keys(me);
        keys.sort();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|(_, sid)| *sid == me));
    }
}
