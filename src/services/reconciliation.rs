//! Reconciliation engine for register close.
//!
//! Pure with respect to its inputs: callers hand it the frozen opening
//! balances, accumulators and counted amounts, and it never re-reads live
//! data mid-computation. Currency conversion always takes the rate as an
//! argument so closed sessions are only ever priced with their stored rate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::discrepancy_authorization::CurrencyBucket;
use crate::errors::ServiceError;

/// One amount per currency bucket. Buckets are disjoint: VES cash, USD cash
/// and the electronic-transfer rail never mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct BucketAmounts {
    #[serde(default)]
    pub ves_cash: Decimal,
    #[serde(default)]
    pub usd_cash: Decimal,
    #[serde(default)]
    pub transfer: Decimal,
}

impl BucketAmounts {
    pub const ZERO: BucketAmounts = BucketAmounts {
        ves_cash: Decimal::ZERO,
        usd_cash: Decimal::ZERO,
        transfer: Decimal::ZERO,
    };

    pub fn new(ves_cash: Decimal, usd_cash: Decimal, transfer: Decimal) -> Self {
        Self {
            ves_cash,
            usd_cash,
            transfer,
        }
    }

    pub fn get(&self, bucket: CurrencyBucket) -> Decimal {
        match bucket {
            CurrencyBucket::VesCash => self.ves_cash,
            CurrencyBucket::UsdCash => self.usd_cash,
            CurrencyBucket::Transfer => self.transfer,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.ves_cash.is_zero() && self.usd_cash.is_zero() && self.transfer.is_zero()
    }

    pub fn is_non_negative(&self) -> bool {
        self.ves_cash >= Decimal::ZERO
            && self.usd_cash >= Decimal::ZERO
            && self.transfer >= Decimal::ZERO
    }

    pub fn add(&self, other: &BucketAmounts) -> BucketAmounts {
        BucketAmounts {
            ves_cash: self.ves_cash + other.ves_cash,
            usd_cash: self.usd_cash + other.usd_cash,
            transfer: self.transfer + other.transfer,
        }
    }

    pub fn sub(&self, other: &BucketAmounts) -> BucketAmounts {
        BucketAmounts {
            ves_cash: self.ves_cash - other.ves_cash,
            usd_cash: self.usd_cash - other.usd_cash,
            transfer: self.transfer - other.transfer,
        }
    }

    /// Collapses the three buckets to a single VES figure using the rate the
    /// caller supplies. Callers pass a session's stored rate; passing a live
    /// quote here for historical data re-prices history and is wrong.
    pub fn total_in_ves(&self, usd_rate: Decimal) -> Decimal {
        self.ves_cash + self.transfer + self.usd_cash * usd_rate
    }
}

/// Reconciliation detail for a single bucket.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BucketReconciliation {
    pub bucket: CurrencyBucket,
    pub opening: Decimal,
    pub ingress: Decimal,
    pub egress: Decimal,
    /// opening + ingress − egress
    pub expected: Decimal,
    pub counted: Decimal,
    /// counted − expected, signed
    pub discrepancy: Decimal,
}

impl BucketReconciliation {
    fn compute(
        bucket: CurrencyBucket,
        opening: Decimal,
        ingress: Decimal,
        egress: Decimal,
        counted: Decimal,
    ) -> Self {
        let expected = opening + ingress - egress;
        Self {
            bucket,
            opening,
            ingress,
            egress,
            expected,
            counted,
            discrepancy: counted - expected,
        }
    }
}

/// The full close computation for a register session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Reconciliation {
    pub ves_cash: BucketReconciliation,
    pub usd_cash: BucketReconciliation,
    pub transfer: BucketReconciliation,
}

impl Reconciliation {
    pub fn buckets(&self) -> [&BucketReconciliation; 3] {
        [&self.ves_cash, &self.usd_cash, &self.transfer]
    }

    /// Any non-zero discrepancy blocks finalize until authorized.
    pub fn requires_authorization(&self) -> bool {
        self.buckets().iter().any(|b| !b.discrepancy.is_zero())
    }

    pub fn expected(&self) -> BucketAmounts {
        BucketAmounts::new(
            self.ves_cash.expected,
            self.usd_cash.expected,
            self.transfer.expected,
        )
    }

    pub fn discrepancies(&self) -> BucketAmounts {
        BucketAmounts::new(
            self.ves_cash.discrepancy,
            self.usd_cash.discrepancy,
            self.transfer.discrepancy,
        )
    }
}

/// Per bucket, independently: `expected = opening + Σingress − Σegress`
/// and `discrepancy = counted − expected`.
pub fn reconcile(
    opening: &BucketAmounts,
    ingress: &BucketAmounts,
    egress: &BucketAmounts,
    counted: &BucketAmounts,
) -> Reconciliation {
    Reconciliation {
        ves_cash: BucketReconciliation::compute(
            CurrencyBucket::VesCash,
            opening.ves_cash,
            ingress.ves_cash,
            egress.ves_cash,
            counted.ves_cash,
        ),
        usd_cash: BucketReconciliation::compute(
            CurrencyBucket::UsdCash,
            opening.usd_cash,
            ingress.usd_cash,
            egress.usd_cash,
            counted.usd_cash,
        ),
        transfer: BucketReconciliation::compute(
            CurrencyBucket::Transfer,
            opening.transfer,
            ingress.transfer,
            egress.transfer,
            counted.transfer,
        ),
    }
}

/// A supervisor's sign-off on a non-zero discrepancy, identity-bound.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthorizationInput {
    pub authorized_by: String,
    pub justification: String,
    /// The signed differences the supervisor is accepting, per bucket
    pub differences: BucketAmounts,
}

/// Checks that an authorization covers the computed reconciliation exactly.
///
/// Every bucket with a non-zero discrepancy must be acknowledged with the
/// exact signed difference; acknowledging an amount the computation did not
/// produce is rejected just the same. Who may authorize is not decided here.
pub fn verify_authorization(
    reconciliation: &Reconciliation,
    authorization: &AuthorizationInput,
) -> Result<(), ServiceError> {
    if authorization.authorized_by.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "Authorization must name the authorizing identity".to_string(),
        ));
    }
    if authorization.justification.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "Authorization must carry a justification".to_string(),
        ));
    }

    for bucket in reconciliation.buckets() {
        let declared = authorization.differences.get(bucket.bucket);
        if declared != bucket.discrepancy {
            return Err(ServiceError::Conflict(format!(
                "Authorization mismatch for {:?}: computed difference {} but authorization covers {}",
                bucket.bucket, bucket.discrepancy, declared
            )));
        }
    }

    Ok(())
}
