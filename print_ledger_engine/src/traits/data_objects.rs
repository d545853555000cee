use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db_types::{Earning, Job, MinorUnits, Payment};

/// The result of an idempotent payment insert. Either the payment was created, or an existing payment for the same
/// job or idempotency key is returned unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertPaymentResult {
    Inserted(Payment),
    AlreadyExists(Payment),
}

impl InsertPaymentResult {
    pub fn payment(&self) -> &Payment {
        match self {
            Self::Inserted(p) | Self::AlreadyExists(p) => p,
        }
    }

    pub fn into_payment(self) -> Payment {
        match self {
            Self::Inserted(p) | Self::AlreadyExists(p) => p,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// A payment before and after a requested transition. `applied` is false when the payment was not in the state the
/// transition starts from, in which case `old` and `new` are the same record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentChange {
    pub old: Payment,
    pub new: Payment,
    pub applied: bool,
}

impl PaymentChange {
    pub fn applied(old: Payment, new: Payment) -> Self {
        Self { old, new, applied: true }
    }

    pub fn unchanged(payment: Payment) -> Self {
        Self { old: payment.clone(), new: payment, applied: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelledJob {
    pub job: Job,
    /// The job's payment as it was before the cancellation
    pub payment_before: Option<Payment>,
    /// The job's payment after the cancellation rule was applied
    pub payment_after: Option<Payment>,
    /// The artifact reference that was cleared from the job, and must now be released from the file store
    pub released_artifact: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPickup {
    pub job: Job,
    pub earning: Earning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickupVerification {
    Completed(CompletedPickup),
    /// The code matched but had expired. It has been deleted.
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementResult {
    pub shop_id: String,
    pub settlement_ref: String,
    pub total_payout: MinorUnits,
    pub count: i64,
    pub settled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UnsettledBalance {
    pub shop_id: String,
    pub total_net: MinorUnits,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct EarningsSummary {
    pub total_gross: MinorUnits,
    pub total_platform_fee: MinorUnits,
    pub total_net: MinorUnits,
    pub total_settled: MinorUnits,
    pub pending_settlement: MinorUnits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasedArtifact {
    pub job_id: i64,
    pub artifact_ref: String,
}
