use crate::{
    db_types::{AuditEntry, Earning, EntityType, Job, Payment, PickupCode, Shop},
    job_objects::JobQueryFilter,
    traits::{
        data_objects::{EarningsSummary, UnsettledBalance},
        LedgerError,
    },
};

/// Read-only access to the ledger. None of these methods check ownership; that is the job of the APIs.
#[allow(async_fn_in_trait)]
pub trait LedgerQueries {
    async fn fetch_shop(&self, shop_id: &str) -> Result<Option<Shop>, LedgerError>;

    async fn fetch_job(&self, job_id: i64) -> Result<Option<Job>, LedgerError>;

    /// Fetches jobs matching the filter, oldest first.
    async fn search_jobs(&self, query: JobQueryFilter) -> Result<Vec<Job>, LedgerError>;

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, LedgerError>;

    async fn fetch_payment_for_job(&self, job_id: i64) -> Result<Option<Payment>, LedgerError>;

    async fn fetch_payment_by_idempotency_key(&self, key: &str) -> Result<Option<Payment>, LedgerError>;

    async fn fetch_payment_by_gateway_order(&self, gateway_order_id: &str) -> Result<Option<Payment>, LedgerError>;

    /// Fetches the pickup code for the job, whether or not it has expired.
    async fn fetch_pickup_code(&self, job_id: i64) -> Result<Option<PickupCode>, LedgerError>;

    async fn fetch_earning_for_job(&self, job_id: i64) -> Result<Option<Earning>, LedgerError>;

    /// All earnings of the shop, newest first.
    async fn fetch_earnings_for_shop(&self, shop_id: &str) -> Result<Vec<Earning>, LedgerError>;

    /// Sums the net amount of unsettled earnings, grouped by shop. If `shop_id` is given, only that shop is included.
    /// Shops with nothing outstanding are omitted.
    async fn fetch_unsettled_balances(&self, shop_id: Option<&str>) -> Result<Vec<UnsettledBalance>, LedgerError>;

    async fn fetch_earnings_summary(&self, shop_id: &str) -> Result<EarningsSummary, LedgerError>;

    /// The audit trail of a single entity, oldest first.
    async fn fetch_audit_log(&self, entity_type: EntityType, entity_id: &str) -> Result<Vec<AuditEntry>, LedgerError>;
}
