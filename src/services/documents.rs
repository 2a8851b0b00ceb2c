//! Document renderer boundary.
//!
//! Receipts and closing reports are rendered from fully materialized,
//! immutable snapshots only — a live session is never handed to a renderer.
//! Rendering happens strictly after the atomic commit, never inside it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::services::registers::{ClosedRegister, TransactionRecord};

/// A rendered document ready for a delivery channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedDocument {
    pub title: String,
    pub body: String,
}

/// Boundary for receipt/closing-report rendering. Implementations must treat
/// their input as read-only snapshots.
pub trait DocumentRenderer: Send + Sync {
    fn render_receipt(&self, record: &TransactionRecord) -> Result<RenderedDocument, ServiceError>;

    fn render_closing_report(
        &self,
        closed: &ClosedRegister,
    ) -> Result<RenderedDocument, ServiceError>;
}

/// Plain-text renderer used by default and in tests.
pub struct TextReceiptRenderer;

impl DocumentRenderer for TextReceiptRenderer {
    fn render_receipt(&self, record: &TransactionRecord) -> Result<RenderedDocument, ServiceError> {
        let tx = &record.transaction;
        let mut body = String::new();

        body.push_str(&format!("Receipt {}\n", tx.receipt_code));
        body.push_str(&format!("Date: {}\n", tx.created_at.format("%Y-%m-%d %H:%M")));
        if let Some(customer) = &tx.customer_name {
            body.push_str(&format!("Customer: {}\n", customer));
        }
        body.push_str(&format!("Rate: {} VES/USD\n", tx.exchange_rate));
        body.push('\n');

        for line in &record.lines {
            body.push_str(&format!(
                "{:>3} x {:<30} {:>10}\n",
                line.quantity, line.description, line.subtotal
            ));
        }

        let total_usd: Decimal = record.lines.iter().map(|l| l.subtotal).sum();
        body.push('\n');
        body.push_str(&format!("Total (USD): {}\n", total_usd));
        body.push_str(&format!("Total (VES): {}\n", total_usd * tx.exchange_rate));

        body.push_str("\nPayments:\n");
        for payment in &record.payments {
            body.push_str(&format!(
                "  {:?} {} {:?}\n",
                payment.method, payment.amount, payment.currency
            ));
        }

        Ok(RenderedDocument {
            title: format!("Receipt {}", tx.receipt_code),
            body,
        })
    }

    fn render_closing_report(
        &self,
        closed: &ClosedRegister,
    ) -> Result<RenderedDocument, ServiceError> {
        let session = &closed.session;
        let mut body = String::new();

        body.push_str(&format!("Register close {}\n", session.id));
        body.push_str(&format!("Business date: {}\n", session.business_date));
        body.push_str(&format!("Opened by: {}\n", session.opened_by));
        if let Some(closed_by) = &session.closed_by {
            body.push_str(&format!("Closed by: {}\n", closed_by));
        }
        // The report prices with the rates stored at open, never a live quote.
        body.push_str(&format!(
            "Rates at open: official {} / parallel {}\n\n",
            session.rate_official, session.rate_parallel
        ));

        for bucket in closed.reconciliation.buckets() {
            body.push_str(&format!(
                "{:?}: opening {} + ingress {} - egress {} = expected {} | counted {} | difference {}\n",
                bucket.bucket,
                bucket.opening,
                bucket.ingress,
                bucket.egress,
                bucket.expected,
                bucket.counted,
                bucket.discrepancy
            ));
        }

        if !closed.authorizations.is_empty() {
            body.push_str("\nAuthorized discrepancies:\n");
            for auth in &closed.authorizations {
                body.push_str(&format!(
                    "  {:?}: {} authorized by {} ({})\n",
                    auth.bucket, auth.difference, auth.authorized_by, auth.justification
                ));
            }
        }

        Ok(RenderedDocument {
            title: format!("Register close {}", session.business_date),
            body,
        })
    }
}
