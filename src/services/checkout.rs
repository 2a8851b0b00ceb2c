//! Checkout commit: the atomic conversion of a session's holds into a
//! permanent inventory deduction plus a ledger transaction.
//!
//! The commit is idempotent per checkout session: the checkout session id is
//! stored on the register transaction, so a retry after a disconnect finds
//! the prior result instead of selling twice. Side effects (receipt
//! rendering, notification) run strictly after the atomic unit and are
//! non-fatal.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::product::{self, Entity as ProductEntity};
use crate::entities::register_transaction::{self, Direction};
use crate::entities::stock_movement::{self, MovementKind};
use crate::entities::transaction_line::{self, Entity as TransactionLineEntity};
use crate::entities::transaction_payment::{self, Entity as TransactionPaymentEntity};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::documents::DocumentRenderer;
use crate::services::notifications::NotificationSender;
use crate::services::registers::{
    NewLine, NewPayment, NewTransactionInput, RegisterService, TransactionRecord,
};
use crate::services::reservations::ReservationService;

/// Accepted rounding slack when comparing payments to the sale total (VES)
const PAYMENT_TOLERANCE_VES: Decimal = dec!(0.01);

/// Input for committing a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommitSaleInput {
    /// The wizard session whose holds are being converted; also the
    /// idempotency token for safe retries
    pub checkout_session_id: Uuid,
    pub payments: Vec<NewPayment>,
    /// Discount applied to the whole sale, in VES
    #[serde(default)]
    pub discount_ves: Decimal,
    /// Rate for this sale; defaults to the session's official rate
    pub exchange_rate: Option<Decimal>,
    pub customer_name: Option<String>,
    pub note: Option<String>,
    pub operator: String,
    /// Where to send the rendered receipt, if anywhere
    pub notify_recipient: Option<String>,
}

/// Result of a commit. `already_committed` marks an idempotent replay;
/// `notification_delivered` is None when no recipient was requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSaleResult {
    pub record: TransactionRecord,
    pub already_committed: bool,
    pub notification_delivered: Option<bool>,
}

pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    reservations: Arc<ReservationService>,
    registers: Arc<RegisterService>,
    event_sender: EventSender,
    renderer: Arc<dyn DocumentRenderer>,
    notifier: Arc<dyn NotificationSender>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        reservations: Arc<ReservationService>,
        registers: Arc<RegisterService>,
        event_sender: EventSender,
        renderer: Arc<dyn DocumentRenderer>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            db,
            reservations,
            registers,
            event_sender,
            renderer,
            notifier,
        }
    }

    /// Commits a sale. Retry-safe: a second call with the same checkout
    /// session id is a no-op returning the original transaction.
    #[instrument(skip(self, input), fields(checkout_session_id = %input.checkout_session_id))]
    pub async fn commit_sale(
        &self,
        input: CommitSaleInput,
    ) -> Result<CommitSaleResult, ServiceError> {
        if input.operator.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Operator is required to commit a sale".to_string(),
            ));
        }
        if input.payments.is_empty() {
            return Err(ServiceError::ValidationError(
                "A sale needs at least one payment".to_string(),
            ));
        }
        if input.discount_ves < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Discount cannot be negative".to_string(),
            ));
        }

        // Idempotency: a prior commit for this session wins outright.
        if let Some(existing) = self
            .registers
            .find_by_checkout_session(input.checkout_session_id)
            .await?
        {
            info!(
                transaction_id = %existing.id,
                "Commit replay for checkout session; returning prior transaction"
            );
            let record = self.materialize(existing).await?;
            return Ok(CommitSaleResult {
                record,
                already_committed: true,
                notification_delivered: None,
            });
        }

        // Snapshot and fence the holds. From here until finish_commit the
        // sweeper and the release paths leave them alone.
        let holds = self
            .reservations
            .begin_commit(input.checkout_session_id)
            .await?;

        let outcome = self.commit_in_store(&input, &holds).await;

        match outcome {
            Ok(record) => {
                self.reservations
                    .finish_commit(input.checkout_session_id, true)
                    .await;

                let total_usd: Decimal =
                    record.lines.iter().map(|l| l.subtotal).sum();
                self.event_sender
                    .send_or_log(Event::SaleCommitted {
                        transaction_id: record.transaction.id,
                        checkout_session_id: input.checkout_session_id,
                        register_session_id: record.transaction.register_session_id,
                        total_ves: total_usd * record.transaction.exchange_rate,
                        total_usd,
                    })
                    .await;

                // Side effects happen strictly after the atomic unit.
                let notification_delivered = match &input.notify_recipient {
                    Some(recipient) => Some(self.deliver_receipt(recipient, &record).await),
                    None => None,
                };

                Ok(CommitSaleResult {
                    record,
                    already_committed: false,
                    notification_delivered,
                })
            }
            Err(e) => {
                // Nothing was applied; the holds go back to the live pool so
                // the client can retry the whole operation.
                self.reservations
                    .finish_commit(input.checkout_session_id, false)
                    .await;
                Err(e)
            }
        }
    }

    /// The atomic unit: guarded on-hand decrements, movement audit rows, and
    /// the ledger append all on one store transaction.
    async fn commit_in_store(
        &self,
        input: &CommitSaleInput,
        holds: &[crate::services::reservations::CommittedHold],
    ) -> Result<TransactionRecord, ServiceError> {
        self.db
            .transaction::<_, TransactionRecord, ServiceError>(|txn| {
                Box::pin(async move {
                    let mut lines = Vec::with_capacity(holds.len());

                    for hold in holds {
                        let product = ProductEntity::find_by_id(hold.product_id)
                            .one(txn)
                            .await
                            .map_err(ServiceError::DatabaseError)?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "Product {} vanished before commit",
                                    hold.product_id
                                ))
                            })?;

                        // In-store backstop for the reservation engine's
                        // bookkeeping: the decrement only applies if enough
                        // stock is still there.
                        let updated = ProductEntity::update_many()
                            .col_expr(
                                product::Column::OnHand,
                                Expr::col(product::Column::OnHand).sub(hold.quantity),
                            )
                            .filter(product::Column::Id.eq(product.id))
                            .filter(product::Column::OnHand.gte(hold.quantity))
                            .exec(txn)
                            .await
                            .map_err(ServiceError::DatabaseError)?;

                        if updated.rows_affected != 1 {
                            return Err(ServiceError::InsufficientStock(format!(
                                "Product {} has {} on hand, hold needs {}",
                                product.sku, product.on_hand, hold.quantity
                            )));
                        }

                        stock_movement::ActiveModel {
                            product_id: Set(product.id),
                            kind: Set(MovementKind::Sale),
                            quantity_delta: Set(-hold.quantity),
                            on_hand_before: Set(product.on_hand),
                            on_hand_after: Set(product.on_hand - hold.quantity),
                            reason: Set(format!(
                                "Sale for checkout session {}",
                                input.checkout_session_id
                            )),
                            operator: Set(input.operator.clone()),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?;

                        lines.push(NewLine {
                            product_id: Some(product.id),
                            description: product.name.clone(),
                            quantity: hold.quantity,
                            unit_price: product.unit_price,
                            discount: Decimal::ZERO,
                        });
                    }

                    let record = self
                        .registers
                        .append_transaction(
                            txn,
                            NewTransactionInput {
                                direction: Direction::Ingress,
                                category: "sale".to_string(),
                                lines,
                                payments: input.payments.clone(),
                                exchange_rate: input.exchange_rate,
                                checkout_session_id: Some(input.checkout_session_id),
                                customer_name: input.customer_name.clone(),
                                note: input.note.clone(),
                                operator: input.operator.clone(),
                            },
                        )
                        .await?;

                    verify_payment_coverage(
                        &record,
                        input.discount_ves,
                    )?;

                    Ok(record)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })
    }

    async fn deliver_receipt(&self, recipient: &str, record: &TransactionRecord) -> bool {
        let rendered = match self.renderer.render_receipt(record) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(
                    transaction_id = %record.transaction.id,
                    error = %e,
                    "Receipt rendering failed; sale stands"
                );
                self.event_sender
                    .send_or_log(Event::NotificationFailed {
                        transaction_id: record.transaction.id,
                        recipient: recipient.to_string(),
                        error: e.to_string(),
                    })
                    .await;
                return false;
            }
        };

        match self.notifier.send(recipient, &rendered).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    transaction_id = %record.transaction.id,
                    recipient = %recipient,
                    error = %e,
                    "Notification failed; sale stands"
                );
                self.event_sender
                    .send_or_log(Event::NotificationFailed {
                        transaction_id: record.transaction.id,
                        recipient: recipient.to_string(),
                        error: e.to_string(),
                    })
                    .await;
                false
            }
        }
    }

    async fn materialize(
        &self,
        transaction: register_transaction::Model,
    ) -> Result<TransactionRecord, ServiceError> {
        let lines = TransactionLineEntity::find()
            .filter(transaction_line::Column::TransactionId.eq(transaction.id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let payments = TransactionPaymentEntity::find()
            .filter(transaction_payment::Column::TransactionId.eq(transaction.id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(TransactionRecord {
            transaction,
            lines,
            payments,
        })
    }
}

/// Payments must cover the sale total. Shortfalls beyond rounding slack
/// abort the commit; overpayment is the operator handing back change and is
/// accepted.
fn verify_payment_coverage(
    record: &TransactionRecord,
    discount_ves: Decimal,
) -> Result<(), ServiceError> {
    let rate = record.transaction.exchange_rate;
    let total_usd: Decimal = record.lines.iter().map(|l| l.subtotal).sum();
    let total_ves = total_usd * rate - discount_ves;

    let paid_ves = record.transaction.amount_ves_cash
        + record.transaction.amount_transfer
        + record.transaction.amount_usd_cash * rate;

    if paid_ves + PAYMENT_TOLERANCE_VES < total_ves {
        return Err(ServiceError::ValidationError(format!(
            "Payments cover {} VES but the sale totals {} VES",
            paid_ves, total_ves
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::transaction_payment::{PaymentCurrency, PaymentMethod};
    use chrono::Utc;

    fn record_with(
        rate: Decimal,
        lines: Vec<(i32, Decimal)>,
        ves_cash: Decimal,
        usd_cash: Decimal,
        transfer: Decimal,
    ) -> TransactionRecord {
        let tx_id = Uuid::new_v4();
        TransactionRecord {
            transaction: register_transaction::Model {
                id: tx_id,
                register_session_id: Uuid::new_v4(),
                direction: Direction::Ingress,
                category: "sale".into(),
                amount_ves_cash: ves_cash,
                amount_usd_cash: usd_cash,
                amount_transfer: transfer,
                exchange_rate: rate,
                receipt_code: "I010125001".into(),
                daily_seq: 1,
                checkout_session_id: Some(Uuid::new_v4()),
                customer_name: None,
                note: None,
                operator: "cashier-1".into(),
                created_at: Utc::now(),
            },
            lines: lines
                .into_iter()
                .enumerate()
                .map(|(i, (qty, unit))| transaction_line::Model {
                    id: Uuid::new_v4(),
                    transaction_id: tx_id,
                    product_id: Some(Uuid::new_v4()),
                    description: format!("item {}", i),
                    quantity: qty,
                    unit_price: unit,
                    discount: Decimal::ZERO,
                    subtotal: unit * Decimal::from(qty),
                })
                .collect(),
            payments: vec![transaction_payment::Model {
                id: Uuid::new_v4(),
                transaction_id: tx_id,
                method: PaymentMethod::CashVes,
                amount: ves_cash,
                currency: PaymentCurrency::Ves,
                bank: None,
                reference: None,
            }],
        }
    }

    #[test]
    fn exact_payment_passes() {
        // 2 x $5 at 36.50 = 365 VES
        let record = record_with(
            dec!(36.50),
            vec![(2, dec!(5))],
            dec!(365.00),
            dec!(0),
            dec!(0),
        );
        assert!(verify_payment_coverage(&record, Decimal::ZERO).is_ok());
    }

    #[test]
    fn shortfall_is_rejected() {
        let record = record_with(
            dec!(36.50),
            vec![(2, dec!(5))],
            dec!(300.00),
            dec!(0),
            dec!(0),
        );
        let err = verify_payment_coverage(&record, Decimal::ZERO)
            .expect_err("payments are 65 VES short");
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn discount_reduces_the_required_total() {
        let record = record_with(
            dec!(36.50),
            vec![(2, dec!(5))],
            dec!(300.00),
            dec!(0),
            dec!(0),
        );
        assert!(verify_payment_coverage(&record, dec!(65.00)).is_ok());
    }

    #[test]
    fn mixed_currency_payment_converts_at_the_stored_rate() {
        // 365 VES due; $10 cash covers it at 36.50
        let record = record_with(
            dec!(36.50),
            vec![(2, dec!(5))],
            dec!(0),
            dec!(10),
            dec!(0),
        );
        assert!(verify_payment_coverage(&record, Decimal::ZERO).is_ok());
    }

    #[test]
    fn rounding_slack_is_accepted() {
        let record = record_with(
            dec!(36.50),
            vec![(2, dec!(5))],
            dec!(364.99),
            dec!(0),
            dec!(0),
        );
        assert!(verify_payment_coverage(&record, Decimal::ZERO).is_ok());
    }
}
