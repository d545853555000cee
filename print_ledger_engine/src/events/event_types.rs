use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Earning, Job, Payment, PaymentStatus},
    traits::SettlementResult,
};

/// A pickup code was issued. This is the only place the code leaves the ledger; the notification collaborator
/// delivers it to the requester.
#[derive(Clone, PartialEq, Eq)]
pub struct PickupCodeIssuedEvent {
    pub job_id: i64,
    pub requester_id: String,
    pub shop_id: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for PickupCodeIssuedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PickupCodeIssuedEvent(job #{} for {}, expires {})", self.job_id, self.requester_id, self.expires_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCompletedEvent {
    pub job: Job,
    pub earning: Earning,
}

impl JobCompletedEvent {
    pub fn new(job: Job, earning: Earning) -> Self {
        Self { job, earning }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCancelledEvent {
    pub job: Job,
    /// The payment after the cancellation rule was applied
    pub payment: Option<Payment>,
}

impl JobCancelledEvent {
    /// A refund must be issued through the payment gateway.
    pub fn refund_required(&self) -> bool {
        self.payment.as_ref().map(|p| p.status == PaymentStatus::RefundPending).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementEvent {
    pub settlement: SettlementResult,
}
