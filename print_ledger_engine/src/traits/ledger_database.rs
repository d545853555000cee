use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{
        Actor,
        Job,
        JobStatus,
        MinorUnits,
        NewJob,
        NewPayment,
        NewPickupCode,
        NewShop,
        PaymentTransition,
        PickupCode,
        Shop,
    },
    pricing::FeePolicy,
    traits::{
        data_objects::{
            CancelledJob,
            InsertPaymentResult,
            PaymentChange,
            PickupVerification,
            ReleasedArtifact,
            SettlementResult,
        },
        LedgerQueries,
    },
};

/// The `LedgerDatabase` trait defines the behaviour that a storage backend must provide for the print ledger.
///
/// Every method that changes state runs in a single store transaction. The implementation locks the rows it works on
/// before re-checking the business rules against them, writes its changes together with the matching audit log entries
/// and only then commits. A method that returns an error has not changed anything, unless documented otherwise.
#[allow(async_fn_in_trait)]
pub trait LedgerDatabase: Clone + LedgerQueries {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Adds a shop to the directory. Fails with `InvalidState` if a shop with the same id exists.
    async fn insert_shop(&self, shop: NewShop, actor: &Actor, now: DateTime<Utc>) -> Result<Shop, LedgerError>;

    /// Activates or deactivates a shop. Inactive shops accept no new jobs.
    async fn set_shop_active(
        &self,
        shop_id: &str,
        active: bool,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Shop, LedgerError>;

    /// Creates a new `PENDING` job. The shop must exist and be active.
    async fn insert_job(&self, job: NewJob, now: DateTime<Utc>) -> Result<Job, LedgerError>;

    /// Records the shop's quote for a `PENDING`, unpriced job.
    async fn set_job_price(
        &self,
        job_id: i64,
        shop_id: &str,
        price: MinorUnits,
        now: DateTime<Utc>,
    ) -> Result<Job, LedgerError>;

    /// Marks the quote on a `PENDING` job as accepted by its requester.
    async fn accept_job_price(&self, job_id: i64, requester_id: &str, now: DateTime<Utc>) -> Result<Job, LedgerError>;

    /// Moves a job to `status` on behalf of its shop, if the shop transition table allows it.
    async fn update_job_status(
        &self,
        job_id: i64,
        shop_id: &str,
        status: JobStatus,
        now: DateTime<Utc>,
    ) -> Result<Job, LedgerError>;

    /// Cancels a job on behalf of its requester. The job's payment, if any, follows the cancellation rule and the
    /// artifact reference is cleared. The caller is responsible for releasing the artifact returned in the result.
    async fn cancel_job(&self, job_id: i64, requester_id: &str, now: DateTime<Utc>) -> Result<CancelledJob, LedgerError>;

    /// Creates an `INITIATED` payment for an accepted job. If the job already has a payment, or the idempotency key is
    /// already taken by this requester, the existing payment is returned instead.
    async fn insert_payment(&self, payment: NewPayment, now: DateTime<Utc>) -> Result<InsertPaymentResult, LedgerError>;

    /// Applies `transition` to the payment with the given id. If the payment is not in the state the transition
    /// starts from, nothing changes and the current record is returned with `applied` set to false.
    async fn transition_payment(
        &self,
        payment_id: i64,
        transition: PaymentTransition,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<PaymentChange, LedgerError>;

    /// As [`Self::transition_payment`], but locates the payment by the payment gateway's order reference.
    async fn transition_payment_by_gateway_order(
        &self,
        gateway_order_id: &str,
        transition: PaymentTransition,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<PaymentChange, LedgerError>;

    /// Records the gateway order reference of an online payment that has not been paid yet.
    async fn attach_gateway_order(
        &self,
        payment_id: i64,
        gateway_order_id: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<PaymentChange, LedgerError>;

    /// Stores a pickup code for a `READY`, paid job. A stale, expired code for the job is replaced.
    async fn insert_pickup_code(
        &self,
        code: NewPickupCode,
        shop_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PickupCode, LedgerError>;

    /// Checks `code` against the job's live pickup code. On a match the job is completed, the code deleted and the
    /// shop's earning written, all in one transaction.
    ///
    /// An expired code is deleted and [`PickupVerification::Expired`] is returned. That deletion is committed.
    async fn complete_pickup(
        &self,
        job_id: i64,
        shop_id: &str,
        code: &str,
        fees: FeePolicy,
        now: DateTime<Utc>,
    ) -> Result<PickupVerification, LedgerError>;

    /// Deletes every pickup code that expired at or before `now`. Returns the number of codes removed.
    async fn purge_expired_pickup_codes(&self, now: DateTime<Utc>) -> Result<u64, LedgerError>;

    /// Stamps every unsettled earning of the shop with `settlement_ref` and `now`.
    async fn settle_earnings(
        &self,
        shop_id: &str,
        settlement_ref: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<SettlementResult, LedgerError>;

    /// Clears the artifact reference of terminal jobs created before `cutoff` and returns what was cleared.
    async fn clear_stale_artifacts(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReleasedArtifact>, LedgerError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("{0} does not exist")]
    NotFound(String),
    #[error("The request is not allowed in the current state. {0}")]
    InvalidState(String),
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("The price {price} is below the minimum of {minimum} for this job")]
    PriceTooLow { price: MinorUnits, minimum: MinorUnits },
    #[error("The price for job #{0} has not been accepted")]
    PriceNotAccepted(i64),
    #[error("Job #{0} has not been paid for")]
    PaymentIncomplete(i64),
    #[error("Job #{0} is not ready for pickup")]
    NotReady(i64),
    #[error("There is no pickup code for job #{0}")]
    CodeNotFound(i64),
    #[error("The pickup code does not match")]
    CodeMismatch,
    #[error("The pickup code has expired")]
    CodeExpired,
    #[error("A pickup code for job #{0} has already been issued")]
    CodeAlreadyIssued(i64),
    #[error("Job #{0} is already completed or cancelled")]
    AlreadyTerminal(i64),
    #[error("A pickup is in progress for job #{0}")]
    PickupInProgress(i64),
    #[error("Shop {0} has no unsettled earnings")]
    NothingToSettle(String),
    #[error("The request could not be authenticated")]
    Unauthenticated,
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

impl LedgerError {
    pub fn job_not_found(job_id: i64) -> Self {
        LedgerError::NotFound(format!("Job #{job_id}"))
    }

    pub fn payment_not_found<S: std::fmt::Display>(reference: S) -> Self {
        LedgerError::NotFound(format!("Payment {reference}"))
    }

    pub fn shop_not_found(shop_id: &str) -> Self {
        LedgerError::NotFound(format!("Shop {shop_id}"))
    }
}
