//! Register session state machine.
//!
//! One physical drawer, one active session: `open → pending_physical_close
//! → closed`. Appends are only legal while `open`, so transitioning to
//! `pending_physical_close` first is what freezes the accumulators the
//! reconciliation reads. `closed` is terminal.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::discrepancy_authorization::{self, Entity as DiscrepancyAuthorizationEntity};
use crate::entities::register_session::{self, Entity as RegisterSessionEntity, RegisterState};
use crate::entities::register_transaction::{
    self, Direction, Entity as RegisterTransactionEntity,
};
use crate::entities::transaction_line::{self, Entity as TransactionLineEntity};
use crate::entities::transaction_payment::{
    self, Entity as TransactionPaymentEntity, PaymentCurrency, PaymentMethod,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::reconciliation::{
    self, AuthorizationInput, BucketAmounts, Reconciliation,
};

/// Input for opening a drawer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OpenRegisterInput {
    pub opening: BucketAmounts,
    /// Official VES-per-USD rate at open
    pub rate_official: Decimal,
    /// Parallel-market rate at open
    pub rate_parallel: Decimal,
    pub operator: String,
    pub note: Option<String>,
}

/// One line item on a new transaction.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewLine {
    pub product_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    /// Unit price in USD
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
}

impl NewLine {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity) - self.discount
    }
}

/// One payment on a new transaction.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewPayment {
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub currency: PaymentCurrency,
    pub bank: Option<String>,
    pub reference: Option<String>,
}

/// Input for appending a ledger transaction to the open session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewTransactionInput {
    pub direction: Direction,
    pub category: String,
    #[serde(default)]
    pub lines: Vec<NewLine>,
    pub payments: Vec<NewPayment>,
    /// Rate for this transaction; defaults to the session's official rate
    pub exchange_rate: Option<Decimal>,
    pub checkout_session_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub note: Option<String>,
    pub operator: String,
}

/// A fully materialized transaction: the row plus its children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction: register_transaction::Model,
    pub lines: Vec<transaction_line::Model>,
    pub payments: Vec<transaction_payment::Model>,
}

/// Reconciliation preview returned by begin-close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosePreview {
    pub session: register_session::Model,
    pub reconciliation: Reconciliation,
    pub requires_authorization: bool,
}

/// Final closing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedRegister {
    pub session: register_session::Model,
    pub reconciliation: Reconciliation,
    pub authorizations: Vec<discrepancy_authorization::Model>,
}

/// Per-bucket amounts a set of payments settles into.
///
/// Buckets follow the explicit method/currency tags: VES cash, USD cash, or
/// the electronic rail (VES-denominated). Nothing is inferred from the size
/// of a number.
pub fn bucket_amounts_for_payments(
    payments: &[NewPayment],
) -> Result<BucketAmounts, ServiceError> {
    let mut amounts = BucketAmounts::ZERO;

    for payment in payments {
        if payment.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Every payment amount must be positive".to_string(),
            ));
        }

        match (payment.method, payment.currency) {
            (PaymentMethod::CashVes, PaymentCurrency::Ves) => {
                amounts.ves_cash += payment.amount;
            }
            (PaymentMethod::CashUsd, PaymentCurrency::Usd) => {
                amounts.usd_cash += payment.amount;
            }
            (m, PaymentCurrency::Ves) if m.is_electronic() => {
                amounts.transfer += payment.amount;
            }
            (m, c) => {
                return Err(ServiceError::ValidationError(format!(
                    "Payment method {:?} does not settle in {:?}",
                    m, c
                )));
            }
        }
    }

    Ok(amounts)
}

pub struct RegisterService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl RegisterService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Opens a new register session. Exactly one session may be active per
    /// drawer; an `open` or `pending_physical_close` session blocks this.
    #[instrument(skip(self, input), fields(operator = %input.operator))]
    pub async fn open(
        &self,
        input: OpenRegisterInput,
    ) -> Result<register_session::Model, ServiceError> {
        if input.operator.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Operator is required to open a register".to_string(),
            ));
        }
        if !input.opening.is_non_negative() {
            return Err(ServiceError::ValidationError(
                "Opening balances cannot be negative".to_string(),
            ));
        }
        if input.rate_official <= Decimal::ZERO || input.rate_parallel <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Exchange rates must be positive".to_string(),
            ));
        }

        let existing = Self::find_active(&*self.db).await?;
        if let Some(session) = existing {
            return Err(ServiceError::Conflict(format!(
                "Register session {} is still {:?}; close it first",
                session.id, session.state
            )));
        }

        let now = Utc::now();
        let model = register_session::ActiveModel {
            business_date: Set(now.date_naive()),
            state: Set(RegisterState::Open),
            opening_ves_cash: Set(input.opening.ves_cash),
            opening_usd_cash: Set(input.opening.usd_cash),
            opening_transfer: Set(input.opening.transfer),
            ingress_ves_cash: Set(Decimal::ZERO),
            ingress_usd_cash: Set(Decimal::ZERO),
            ingress_transfer: Set(Decimal::ZERO),
            egress_ves_cash: Set(Decimal::ZERO),
            egress_usd_cash: Set(Decimal::ZERO),
            egress_transfer: Set(Decimal::ZERO),
            rate_official: Set(input.rate_official),
            rate_parallel: Set(input.rate_parallel),
            opened_at: Set(now),
            opened_by: Set(input.operator.clone()),
            opening_note: Set(input.note),
            ..Default::default()
        };

        let session = model
            .insert(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        info!(session_id = %session.id, operator = %session.opened_by, "Register opened");
        self.event_sender
            .send_or_log(Event::RegisterOpened {
                register_session_id: session.id,
                opened_by: session.opened_by.clone(),
            })
            .await;

        Ok(session)
    }

    /// The active session (`open` or `pending_physical_close`), if any.
    pub async fn current(&self) -> Result<Option<register_session::Model>, ServiceError> {
        Self::find_active(&*self.db).await
    }

    async fn find_active<C: ConnectionTrait>(
        conn: &C,
    ) -> Result<Option<register_session::Model>, ServiceError> {
        RegisterSessionEntity::find()
            .filter(
                register_session::Column::State
                    .is_in([RegisterState::Open, RegisterState::PendingPhysicalClose]),
            )
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn find_open<C: ConnectionTrait>(
        conn: &C,
    ) -> Result<register_session::Model, ServiceError> {
        let active = Self::find_active(conn).await?;
        match active {
            Some(session) if session.state.accepts_transactions() => Ok(session),
            Some(session) => Err(ServiceError::InvalidStatus(format!(
                "Register session {} is {:?} and no longer accepts transactions",
                session.id, session.state
            ))),
            None => Err(ServiceError::InvalidOperation(
                "No open register session".to_string(),
            )),
        }
    }

    /// Appends a ledger transaction on the caller's connection. Callers that
    /// also mutate inventory pass their `DatabaseTransaction` so both land
    /// in one atomic unit.
    pub async fn append_transaction<C: ConnectionTrait>(
        conn: &C,
        input: NewTransactionInput,
    ) -> Result<TransactionRecord, ServiceError> {
        if input.category.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Transaction category is required".to_string(),
            ));
        }
        if input.operator.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Transaction operator is required".to_string(),
            ));
        }
        if input.payments.is_empty() {
            return Err(ServiceError::ValidationError(
                "A transaction needs at least one payment".to_string(),
            ));
        }
        for line in &input.lines {
            if line.quantity <= 0 {
                return Err(ServiceError::ValidationError(format!(
                    "Line quantity for '{}' must be positive",
                    line.description
                )));
            }
        }

        let session = Self::find_open(conn).await?;
        let amounts = bucket_amounts_for_payments(&input.payments)?;
        let exchange_rate = input.exchange_rate.unwrap_or(session.rate_official);
        if exchange_rate <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Exchange rate must be positive".to_string(),
            ));
        }

        let (receipt_code, daily_seq) =
            Self::next_receipt_code(conn, input.direction).await?;

        let transaction = register_transaction::ActiveModel {
            register_session_id: Set(session.id),
            direction: Set(input.direction),
            category: Set(input.category.trim().to_string()),
            amount_ves_cash: Set(amounts.ves_cash),
            amount_usd_cash: Set(amounts.usd_cash),
            amount_transfer: Set(amounts.transfer),
            exchange_rate: Set(exchange_rate),
            receipt_code: Set(receipt_code),
            daily_seq: Set(daily_seq),
            checkout_session_id: Set(input.checkout_session_id),
            customer_name: Set(input.customer_name),
            note: Set(input.note),
            operator: Set(input.operator),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;

        let mut lines = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let row = transaction_line::ActiveModel {
                transaction_id: Set(transaction.id),
                product_id: Set(line.product_id),
                description: Set(line.description.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                discount: Set(line.discount),
                subtotal: Set(line.subtotal()),
                ..Default::default()
            }
            .insert(conn)
            .await
            .map_err(ServiceError::DatabaseError)?;
            lines.push(row);
        }

        let mut payments = Vec::with_capacity(input.payments.len());
        for payment in &input.payments {
            let row = transaction_payment::ActiveModel {
                transaction_id: Set(transaction.id),
                method: Set(payment.method),
                amount: Set(payment.amount),
                currency: Set(payment.currency),
                bank: Set(payment.bank.clone()),
                reference: Set(payment.reference.clone()),
                ..Default::default()
            }
            .insert(conn)
            .await
            .map_err(ServiceError::DatabaseError)?;
            payments.push(row);
        }

        // Accumulators move with the same SQL statement shape the original
        // used: in-database increments, inside the caller's atomic unit.
        let (ves_col, usd_col, transfer_col) = match input.direction {
            Direction::Ingress => (
                register_session::Column::IngressVesCash,
                register_session::Column::IngressUsdCash,
                register_session::Column::IngressTransfer,
            ),
            Direction::Egress => (
                register_session::Column::EgressVesCash,
                register_session::Column::EgressUsdCash,
                register_session::Column::EgressTransfer,
            ),
        };

        RegisterSessionEntity::update_many()
            .col_expr(ves_col, Expr::col(ves_col).add(amounts.ves_cash))
            .col_expr(usd_col, Expr::col(usd_col).add(amounts.usd_cash))
            .col_expr(
                transfer_col,
                Expr::col(transfer_col).add(amounts.transfer),
            )
            .filter(register_session::Column::Id.eq(session.id))
            .exec(conn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(TransactionRecord {
            transaction,
            lines,
            payments,
        })
    }

    /// Appends a manual ingress/egress entry in its own transaction.
    #[instrument(skip(self, input))]
    pub async fn create_manual_transaction(
        &self,
        input: NewTransactionInput,
    ) -> Result<TransactionRecord, ServiceError> {
        let record = self
            .db
            .transaction::<_, TransactionRecord, ServiceError>(|txn| {
                Box::pin(async move { self.append_transaction(txn, input).await })
            })
            .await
            .map_err(unwrap_transaction_error)?;

        self.event_sender
            .send_or_log(Event::TransactionAppended {
                register_session_id: record.transaction.register_session_id,
                transaction_id: record.transaction.id,
                receipt_code: record.transaction.receipt_code.clone(),
            })
            .await;

        Ok(record)
    }

    async fn next_receipt_code<C: ConnectionTrait>(
        conn: &C,
        direction: Direction,
    ) -> Result<(String, i32), ServiceError> {
        let now = Utc::now();
        let day_start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is valid")
            .and_utc();
        let day_end = day_start + chrono::Duration::days(1);

        let todays = RegisterTransactionEntity::find()
            .filter(register_transaction::Column::Direction.eq(direction))
            .filter(register_transaction::Column::CreatedAt.gte(day_start))
            .filter(register_transaction::Column::CreatedAt.lt(day_end))
            .count(conn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let seq = (todays + 1) as i32;
        let code = format!(
            "{}{}{:03}",
            direction.receipt_prefix(),
            now.format("%d%m%y"),
            seq
        );
        Ok((code, seq))
    }

    /// Begins the physical close. Transitioning out of `open` happens first,
    /// so no further append can land between the freeze and the preview; the
    /// reconciliation then reads only the frozen row.
    ///
    /// Re-counting a session that is already `pending_physical_close` (for
    /// instance after a scheduled force-close) just records the new counts.
    #[instrument(skip(self), fields(operator = %operator))]
    pub async fn begin_physical_close(
        &self,
        counted: BucketAmounts,
        operator: String,
        note: Option<String>,
    ) -> Result<ClosePreview, ServiceError> {
        if operator.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Operator is required to begin a close".to_string(),
            ));
        }
        if !counted.is_non_negative() {
            return Err(ServiceError::ValidationError(
                "Counted balances cannot be negative".to_string(),
            ));
        }

        let session = self
            .db
            .transaction::<_, register_session::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let session = self.find_active(txn).await?.ok_or_else(|| {
                        ServiceError::InvalidOperation(
                            "No register session to close".to_string(),
                        )
                    })?;

                    let mut active: register_session::ActiveModel = session.into();
                    active.state = Set(RegisterState::PendingPhysicalClose);
                    active.counted_ves_cash = Set(Some(counted.ves_cash));
                    active.counted_usd_cash = Set(Some(counted.usd_cash));
                    active.counted_transfer = Set(Some(counted.transfer));
                    if let Some(n) = &note {
                        active.closing_note = Set(Some(n.clone()));
                    }
                    active.update(txn).await.map_err(ServiceError::DatabaseError)
                })
            })
            .await
            .map_err(unwrap_transaction_error)?;

        let reconciliation = reconcile_session(&session)?;
        let requires_authorization = reconciliation.requires_authorization();

        info!(
            session_id = %session.id,
            requires_authorization,
            "Register close started"
        );
        self.event_sender
            .send_or_log(Event::RegisterCloseStarted {
                register_session_id: session.id,
                requires_authorization,
            })
            .await;

        Ok(ClosePreview {
            session,
            reconciliation,
            requires_authorization,
        })
    }

    /// Marks the open session as pending a physical count without counted
    /// amounts. This is the scheduled end-of-day path: the drawer stops
    /// taking transactions until someone counts it and finalizes.
    #[instrument(skip(self))]
    pub async fn force_pending_close(
        &self,
        operator: String,
    ) -> Result<register_session::Model, ServiceError> {
        let session = Self::find_open(&*self.db).await?;

        let mut active: register_session::ActiveModel = session.into();
        active.state = Set(RegisterState::PendingPhysicalClose);
        active.closing_note = Set(Some(format!(
            "Scheduled close by {}; physical count pending",
            operator
        )));
        let session = active
            .update(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::RegisterCloseStarted {
                register_session_id: session.id,
                requires_authorization: false,
            })
            .await;

        Ok(session)
    }

    /// Finalizes the close. A non-zero discrepancy in any bucket demands an
    /// authorization that covers exactly the computed differences; the
    /// accepted record is persisted per bucket. Once this returns, the
    /// session and everything under it are immutable.
    #[instrument(skip(self, authorization), fields(operator = %operator))]
    pub async fn finalize_close(
        &self,
        authorization: Option<AuthorizationInput>,
        operator: String,
        note: Option<String>,
    ) -> Result<ClosedRegister, ServiceError> {
        if operator.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Operator is required to finalize a close".to_string(),
            ));
        }

        let authorization = &authorization;
        let operator_name = operator.clone();
        let (session, reconciliation, authorizations) = self
            .db
            .transaction::<_, (register_session::Model, Reconciliation, Vec<discrepancy_authorization::Model>), ServiceError>(
                |txn| {
                    let operator = operator_name.clone();
                    let note = note.clone();
                    Box::pin(async move {
                        let session = self.find_active(txn).await?.ok_or_else(|| {
                            ServiceError::InvalidOperation(
                                "No register session to finalize".to_string(),
                            )
                        })?;

                        if session.state != RegisterState::PendingPhysicalClose {
                            return Err(ServiceError::InvalidStatus(format!(
                                "Register session {} must begin a physical close before finalizing",
                                session.id
                            )));
                        }
                        if session.counted_ves_cash.is_none() {
                            return Err(ServiceError::Conflict(
                                "Record a physical count before finalizing".to_string(),
                            ));
                        }

                        let reconciliation = reconcile_session(&session)?;

                        let mut authorization_rows = Vec::new();
                        if reconciliation.requires_authorization() {
                            let auth = authorization.as_ref().ok_or_else(|| {
                                ServiceError::Conflict(format!(
                                    "Discrepancy requires authorization: {:?}",
                                    reconciliation.discrepancies()
                                ))
                            })?;
                            reconciliation::verify_authorization(&reconciliation, auth)?;

                            for bucket in reconciliation.buckets() {
                                if bucket.discrepancy.is_zero() {
                                    continue;
                                }
                                let row = discrepancy_authorization::ActiveModel {
                                    register_session_id: Set(session.id),
                                    bucket: Set(bucket.bucket),
                                    expected: Set(bucket.expected),
                                    counted: Set(bucket.counted),
                                    difference: Set(bucket.discrepancy),
                                    authorized_by: Set(auth.authorized_by.clone()),
                                    justification: Set(auth.justification.clone()),
                                    ..Default::default()
                                }
                                .insert(txn)
                                .await
                                .map_err(ServiceError::DatabaseError)?;
                                authorization_rows.push(row);
                            }
                        }

                        let mut active: register_session::ActiveModel = session.into();
                        active.state = Set(RegisterState::Closed);
                        active.closed_at = Set(Some(Utc::now()));
                        active.closed_by = Set(Some(operator));
                        if let Some(n) = note {
                            active.closing_note = Set(Some(n));
                        }
                        let session =
                            active.update(txn).await.map_err(ServiceError::DatabaseError)?;

                        Ok((session, reconciliation, authorization_rows))
                    })
                },
            )
            .await
            .map_err(unwrap_transaction_error)?;

        info!(
            session_id = %session.id,
            closed_by = %operator,
            authorized_discrepancies = authorizations.len(),
            "Register closed"
        );
        self.event_sender
            .send_or_log(Event::RegisterClosed {
                register_session_id: session.id,
                closed_by: operator,
                authorized_discrepancies: authorizations.len(),
            })
            .await;

        Ok(ClosedRegister {
            session,
            reconciliation,
            authorizations,
        })
    }

    /// Session history, newest first.
    pub async fn list(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<register_session::Model>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }
        if limit == 0 || limit > 1000 {
            return Err(ServiceError::ValidationError(
                "Limit must be between 1 and 1000".to_string(),
            ));
        }

        let paginator = RegisterSessionEntity::find()
            .order_by_desc(register_session::Column::OpenedAt)
            .paginate(&*self.db, limit);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let sessions = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((sessions, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<register_session::Model, ServiceError> {
        RegisterSessionEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Register session {} not found", id)))
    }

    /// The reconciliation of a session, recomputed from its stored numbers.
    /// For a closed session this reproduces the closing figures exactly: the
    /// inputs are immutable and the stored rate never changes.
    pub async fn reconciliation_for(&self, id: Uuid) -> Result<Reconciliation, ServiceError> {
        let session = self.get(id).await?;
        if session.counted_ves_cash.is_none() {
            return Err(ServiceError::InvalidOperation(format!(
                "Register session {} has no physical count recorded",
                id
            )));
        }
        reconcile_session(&session)
    }

    /// Ledger entries for a session, with their lines and payments.
    pub async fn transactions(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<TransactionRecord>, ServiceError> {
        let transactions = RegisterTransactionEntity::find()
            .filter(register_transaction::Column::RegisterSessionId.eq(session_id))
            .order_by_asc(register_transaction::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut records = Vec::with_capacity(transactions.len());
        for transaction in transactions {
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
            records.push(TransactionRecord {
                transaction,
                lines,
                payments,
            });
        }

        Ok(records)
    }

    /// Finds a prior commit for a checkout session (idempotency lookup).
    pub async fn find_by_checkout_session(
        &self,
        checkout_session_id: Uuid,
    ) -> Result<Option<register_transaction::Model>, ServiceError> {
        RegisterTransactionEntity::find()
            .filter(
                register_transaction::Column::CheckoutSessionId.eq(Some(checkout_session_id)),
            )
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Authorizations recorded for a session.
    pub async fn authorizations(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<discrepancy_authorization::Model>, ServiceError> {
        DiscrepancyAuthorizationEntity::find()
            .filter(discrepancy_authorization::Column::RegisterSessionId.eq(session_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

/// Reconciliation from a session row's frozen numbers.
fn reconcile_session(
    session: &register_session::Model,
) -> Result<Reconciliation, ServiceError> {
    let counted = BucketAmounts::new(
        session.counted_ves_cash.unwrap_or(Decimal::ZERO),
        session.counted_usd_cash.unwrap_or(Decimal::ZERO),
        session.counted_transfer.unwrap_or(Decimal::ZERO),
    );

    Ok(reconciliation::reconcile(
        &BucketAmounts::new(
            session.opening_ves_cash,
            session.opening_usd_cash,
            session.opening_transfer,
        ),
        &BucketAmounts::new(
            session.ingress_ves_cash,
            session.ingress_usd_cash,
            session.ingress_transfer,
        ),
        &BucketAmounts::new(
            session.egress_ves_cash,
            session.egress_usd_cash,
            session.egress_transfer,
        ),
        &counted,
    ))
}

fn unwrap_transaction_error(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}
