//! `SqliteDatabase` is a concrete implementation of a print ledger backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
//!
//! Every mutating method opens a transaction whose first statement is a write (usually one of the `lock_*`
//! functions). SQLite then hands out the write lock at the start of the transaction, and competing writers queue on
//! the busy timeout instead of failing when they try to upgrade a read lock. The business rules in
//! [`crate::guards`] are checked against the locked rows.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{audit, earnings, jobs, new_pool, payments, pickup_codes, shops};
use crate::{
    db_types::{
        Actor,
        AuditEntry,
        Earning,
        EntityType,
        Job,
        JobStatus,
        MinorUnits,
        NewAuditEntry,
        NewJob,
        NewPayment,
        NewPickupCode,
        NewShop,
        Payment,
        PaymentMethod,
        PaymentStatus,
        PaymentTransition,
        PickupCode,
        Shop,
    },
    guards,
    helpers::codes_match,
    job_objects::JobQueryFilter,
    pricing::FeePolicy,
    traits::{
        CancelledJob,
        CompletedPickup,
        EarningsSummary,
        InsertPaymentResult,
        LedgerDatabase,
        LedgerError,
        LedgerQueries,
        PaymentChange,
        PickupVerification,
        ReleasedArtifact,
        SettlementResult,
        UnsettledBalance,
    },
};

const MAINTENANCE_ACTOR: &str = "maintenance";

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the given URL. The database file is created if it does not exist.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::DatabaseError(format!("Migration failed. {e}")))?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }
}

/// Locks the job and checks it against `is_owner`. Jobs owned by someone else are reported as missing.
async fn lock_owned_job<F>(job_id: i64, is_owner: F, conn: &mut SqliteConnection) -> Result<Job, LedgerError>
where F: FnOnce(&Job) -> bool {
    jobs::lock_job(job_id, conn).await?.filter(is_owner).ok_or_else(|| LedgerError::job_not_found(job_id))
}

/// Checks permissions and applies the transition to a payment that is already locked.
async fn transition_locked_payment(
    payment: Payment,
    transition: PaymentTransition,
    actor: &Actor,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PaymentChange, LedgerError> {
    let job = jobs::fetch_job(payment.job_id, conn).await?.ok_or_else(|| LedgerError::job_not_found(payment.job_id))?;
    guards::ensure_may_transition(&job, actor, &transition)?;
    if !transition.applies_to(&payment) {
        debug!(
            "🗃️ Payment #{} is {} ({}). {} does not apply, so nothing changes.",
            payment.id,
            payment.status,
            payment.method,
            transition.action()
        );
        return Ok(PaymentChange::unchanged(payment));
    }
    let updated = payments::apply_transition(payment.id, &transition, now, conn).await?;
    let mut metadata = json!({
        "job_id": payment.job_id,
        "from": payment.status,
        "to": updated.status,
    });
    match &transition {
        PaymentTransition::GatewayPaid { gateway_payment_id } => {
            metadata["gateway_payment_id"] = json!(gateway_payment_id);
        },
        PaymentTransition::GatewayFailed { reason } | PaymentTransition::RefundFailed { reason } => {
            metadata["reason"] = json!(reason);
        },
        _ => {},
    }
    let entry = NewAuditEntry::new(EntityType::Payment, updated.id, transition.action(), actor).with_metadata(metadata);
    audit::insert_entry(entry, now, conn).await?;
    debug!("🗃️ Payment #{} moved from {} to {}", updated.id, payment.status, updated.status);
    Ok(PaymentChange::applied(payment, updated))
}

impl LedgerDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_shop(&self, shop: NewShop, actor: &Actor, now: DateTime<Utc>) -> Result<Shop, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let shop_id = shop.id.clone();
        let shop = match shops::insert_shop(shop, now, &mut tx).await {
            Ok(shop) => shop,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(LedgerError::InvalidState(format!("Shop {shop_id} is already registered")));
            },
            Err(e) => return Err(e.into()),
        };
        let entry = NewAuditEntry::new(EntityType::Shop, &shop.id, "REGISTERED", actor)
            .with_metadata(json!({ "name": shop.name }));
        audit::insert_entry(entry, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Shop {} has been registered", shop.id);
        Ok(shop)
    }

    async fn set_shop_active(
        &self,
        shop_id: &str,
        active: bool,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Shop, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let shop =
            shops::set_active(shop_id, active, now, &mut tx).await?.ok_or_else(|| LedgerError::shop_not_found(shop_id))?;
        let action = if active { "ACTIVATED" } else { "DEACTIVATED" };
        audit::insert_entry(NewAuditEntry::new(EntityType::Shop, shop_id, action, actor), now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Shop {shop_id} is now {}", if active { "active" } else { "inactive" });
        Ok(shop)
    }

    async fn insert_job(&self, job: NewJob, now: DateTime<Utc>) -> Result<Job, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let shop_id = job.shop_id.clone();
        let actor = Actor::Requester(job.requester_id.clone());
        let job = jobs::insert_job(job, now, &mut tx).await?.ok_or_else(|| LedgerError::shop_not_found(&shop_id))?;
        let entry = NewAuditEntry::new(EntityType::Job, job.id, "SUBMITTED", &actor).with_metadata(json!({
            "shop_id": job.shop_id,
            "copies": job.copies,
            "color_mode": job.color_mode,
            "paper_size": job.paper_size,
        }));
        audit::insert_entry(entry, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Job #{} saved for shop {}", job.id, job.shop_id);
        Ok(job)
    }

    async fn set_job_price(
        &self,
        job_id: i64,
        shop_id: &str,
        price: MinorUnits,
        now: DateTime<Utc>,
    ) -> Result<Job, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let job = lock_owned_job(job_id, |j| j.is_owned_by_shop(shop_id), &mut tx).await?;
        guards::ensure_can_set_price(&job)?;
        let job = jobs::set_price(job_id, price, now, &mut tx).await?;
        let actor = Actor::Shop(shop_id.to_string());
        let entry = NewAuditEntry::new(EntityType::Job, job_id, "PRICED", &actor).with_metadata(json!({ "price": price }));
        audit::insert_entry(entry, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Job #{job_id} priced at {price}");
        Ok(job)
    }

    async fn accept_job_price(&self, job_id: i64, requester_id: &str, now: DateTime<Utc>) -> Result<Job, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let job = lock_owned_job(job_id, |j| j.is_owned_by_requester(requester_id), &mut tx).await?;
        guards::ensure_can_accept_price(&job)?;
        let job = jobs::accept_price(job_id, now, &mut tx).await?;
        let actor = Actor::Requester(requester_id.to_string());
        let entry = NewAuditEntry::new(EntityType::Job, job_id, "PRICE_ACCEPTED", &actor)
            .with_metadata(json!({ "price": job.price }));
        audit::insert_entry(entry, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Price for job #{job_id} accepted");
        Ok(job)
    }

    async fn update_job_status(
        &self,
        job_id: i64,
        shop_id: &str,
        status: JobStatus,
        now: DateTime<Utc>,
    ) -> Result<Job, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let old = lock_owned_job(job_id, |j| j.is_owned_by_shop(shop_id), &mut tx).await?;
        guards::ensure_can_move_to(&old, status)?;
        let job = jobs::set_status(job_id, status, now, &mut tx).await?;
        let actor = Actor::Shop(shop_id.to_string());
        let entry = NewAuditEntry::new(EntityType::Job, job_id, status.as_str(), &actor)
            .with_metadata(json!({ "from": old.status, "to": status }));
        audit::insert_entry(entry, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Job #{job_id} moved from {} to {status}", old.status);
        Ok(job)
    }

    async fn cancel_job(&self, job_id: i64, requester_id: &str, now: DateTime<Utc>) -> Result<CancelledJob, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let old = lock_owned_job(job_id, |j| j.is_owned_by_requester(requester_id), &mut tx).await?;
        let code = pickup_codes::fetch_for_job(job_id, &mut tx).await?;
        if guards::ensure_cancellable(&old, code.as_ref(), now)? {
            pickup_codes::delete_for_job(job_id, &mut tx).await?;
            trace!("🗃️ Purged the expired pickup code of job #{job_id} before cancelling it");
        }
        let actor = Actor::Requester(requester_id.to_string());
        let payment_before = payments::fetch_for_job(job_id, &mut tx).await?;
        let payment_after = match &payment_before {
            Some(payment) => match PaymentStatus::on_job_cancelled(payment.method, payment.status) {
                Some(next) => {
                    let updated = payments::set_status(payment.id, next, now, &mut tx).await?;
                    let entry = NewAuditEntry::new(EntityType::Payment, payment.id, next.as_str(), &actor)
                        .with_metadata(json!({ "job_id": job_id, "from": payment.status, "to": next }));
                    audit::insert_entry(entry, now, &mut tx).await?;
                    Some(updated)
                },
                None => Some(payment.clone()),
            },
            None => None,
        };
        let job = jobs::cancel(job_id, now, &mut tx).await?;
        let entry = NewAuditEntry::new(EntityType::Job, job_id, "CANCELLED", &actor).with_metadata(json!({
            "from": old.status,
            "payment_method": payment_before.as_ref().map(|p| p.method),
            "payment_status_before": payment_before.as_ref().map(|p| p.status),
            "payment_status_after": payment_after.as_ref().map(|p| p.status),
        }));
        audit::insert_entry(entry, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Job #{job_id} cancelled");
        Ok(CancelledJob { job, payment_before, payment_after, released_artifact: old.artifact_ref })
    }

    async fn insert_payment(&self, payment: NewPayment, now: DateTime<Utc>) -> Result<InsertPaymentResult, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let job_id = payment.job_id;
        let job = lock_owned_job(job_id, |j| j.is_owned_by_requester(&payment.requester_id), &mut tx).await?;
        guards::ensure_price_accepted(&job)?;
        if let Some(existing) = payments::fetch_for_job(job_id, &mut tx).await? {
            trace!("🗃️ Job #{job_id} already has payment #{}", existing.id);
            return Ok(InsertPaymentResult::AlreadyExists(existing));
        }
        guards::ensure_payable(&job)?;
        let amount = job.price.ok_or(LedgerError::PriceNotAccepted(job_id))?;
        let inserted = match payments::insert_payment(&payment, amount, now, &mut tx).await {
            Ok(p) => p,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                // The idempotency key is in use by another of this requester's jobs, or by someone else entirely.
                let existing = payments::fetch_by_idempotency_key(&payment.idempotency_key, &mut tx).await?;
                let owner = match &existing {
                    Some(p) => jobs::fetch_job(p.job_id, &mut tx).await?,
                    None => None,
                };
                return match (existing, owner) {
                    (Some(p), Some(j)) if j.is_owned_by_requester(&payment.requester_id) => {
                        Ok(InsertPaymentResult::AlreadyExists(p))
                    },
                    _ => Err(LedgerError::payment_not_found(&payment.idempotency_key)),
                };
            },
            Err(e) => return Err(e.into()),
        };
        let actor = Actor::Requester(payment.requester_id.clone());
        let entry = NewAuditEntry::new(EntityType::Payment, inserted.id, "CREATED", &actor).with_metadata(json!({
            "job_id": job_id,
            "amount": inserted.amount,
            "method": inserted.method,
        }));
        audit::insert_entry(entry, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment #{} for {} created for job #{job_id}", inserted.id, inserted.amount);
        Ok(InsertPaymentResult::Inserted(inserted))
    }

    async fn transition_payment(
        &self,
        payment_id: i64,
        transition: PaymentTransition,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<PaymentChange, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let payment =
            payments::lock_payment(payment_id, &mut tx).await?.ok_or_else(|| LedgerError::payment_not_found(payment_id))?;
        let change = transition_locked_payment(payment, transition, actor, now, &mut tx).await?;
        tx.commit().await?;
        Ok(change)
    }

    async fn transition_payment_by_gateway_order(
        &self,
        gateway_order_id: &str,
        transition: PaymentTransition,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<PaymentChange, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::lock_by_gateway_order(gateway_order_id, &mut tx)
            .await?
            .ok_or_else(|| LedgerError::payment_not_found(format!("for gateway order {gateway_order_id}")))?;
        let change = transition_locked_payment(payment, transition, actor, now, &mut tx).await?;
        tx.commit().await?;
        Ok(change)
    }

    async fn attach_gateway_order(
        &self,
        payment_id: i64,
        gateway_order_id: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<PaymentChange, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let payment =
            payments::lock_payment(payment_id, &mut tx).await?.ok_or_else(|| LedgerError::payment_not_found(payment_id))?;
        let job = jobs::fetch_job(payment.job_id, &mut tx).await?;
        let permitted = match actor {
            Actor::Requester(id) => job.as_ref().map(|j| j.is_owned_by_requester(id)).unwrap_or(false),
            Actor::Shop(_) => false,
            Actor::Admin(_) | Actor::System(_) => true,
        };
        if !permitted {
            return Err(LedgerError::payment_not_found(payment_id));
        }
        match payment.gateway_order_id.as_deref() {
            Some(existing) if existing == gateway_order_id => return Ok(PaymentChange::unchanged(payment)),
            Some(existing) => {
                return Err(LedgerError::InvalidState(format!(
                    "Payment #{payment_id} is already linked to gateway order {existing}"
                )));
            },
            None => {},
        }
        if payment.method != PaymentMethod::Online || payment.status != PaymentStatus::Initiated {
            return Err(LedgerError::InvalidState(format!(
                "Payment #{payment_id} is a {} payment in state {}. Only initiated online payments take a gateway \
                 order.",
                payment.method, payment.status
            )));
        }
        let updated = match payments::set_gateway_order(payment_id, gateway_order_id, now, &mut tx).await {
            Ok(p) => p,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(LedgerError::InvalidState(format!(
                    "Gateway order {gateway_order_id} belongs to another payment"
                )));
            },
            Err(e) => return Err(e.into()),
        };
        let entry = NewAuditEntry::new(EntityType::Payment, payment_id, "GATEWAY_ORDER_ATTACHED", actor)
            .with_metadata(json!({ "gateway_order_id": gateway_order_id }));
        audit::insert_entry(entry, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment #{payment_id} linked to gateway order {gateway_order_id}");
        Ok(PaymentChange::applied(payment, updated))
    }

    async fn insert_pickup_code(
        &self,
        code: NewPickupCode,
        shop_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PickupCode, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let job_id = code.job_id;
        let job = lock_owned_job(job_id, |j| j.is_owned_by_shop(shop_id), &mut tx).await?;
        let payment = payments::fetch_for_job(job_id, &mut tx).await?;
        guards::ensure_ready_for_pickup(&job, payment.as_ref())?;
        let actor = Actor::Shop(shop_id.to_string());
        if let Some(existing) = pickup_codes::fetch_for_job(job_id, &mut tx).await? {
            if !existing.is_expired(now) {
                return Err(LedgerError::CodeAlreadyIssued(job_id));
            }
            pickup_codes::delete_for_job(job_id, &mut tx).await?;
            audit::insert_entry(NewAuditEntry::new(EntityType::PickupCode, job_id, "EXPIRED", &actor), now, &mut tx)
                .await?;
            trace!("🗃️ Replacing the expired pickup code of job #{job_id}");
        }
        let code = pickup_codes::insert_code(code, &job.requester_id, now, &mut tx).await?;
        let entry = NewAuditEntry::new(EntityType::PickupCode, job_id, "ISSUED", &actor)
            .with_metadata(json!({ "expires_at": code.expires_at }));
        audit::insert_entry(entry, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Pickup code issued for job #{job_id}, valid until {}", code.expires_at);
        Ok(code)
    }

    async fn complete_pickup(
        &self,
        job_id: i64,
        shop_id: &str,
        code: &str,
        fees: FeePolicy,
        now: DateTime<Utc>,
    ) -> Result<PickupVerification, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let job = lock_owned_job(job_id, |j| j.is_owned_by_shop(shop_id), &mut tx).await?;
        let payment = payments::fetch_for_job(job_id, &mut tx).await?;
        guards::ensure_ready_for_pickup(&job, payment.as_ref())?;
        let payment = payment.ok_or(LedgerError::PaymentIncomplete(job_id))?;
        let stored = pickup_codes::fetch_for_job(job_id, &mut tx).await?.ok_or(LedgerError::CodeNotFound(job_id))?;
        if !codes_match(&stored.code, code) {
            return Err(LedgerError::CodeMismatch);
        }
        let actor = Actor::Shop(shop_id.to_string());
        if stored.is_expired(now) {
            pickup_codes::delete_for_job(job_id, &mut tx).await?;
            audit::insert_entry(NewAuditEntry::new(EntityType::PickupCode, job_id, "EXPIRED", &actor), now, &mut tx)
                .await?;
            tx.commit().await?;
            debug!("🗃️ The pickup code for job #{job_id} had expired and has been deleted");
            return Ok(PickupVerification::Expired);
        }
        let job = jobs::complete(job_id, now, &mut tx).await?;
        if !pickup_codes::delete_for_job(job_id, &mut tx).await? {
            return Err(LedgerError::CodeNotFound(job_id));
        }
        let earning = earnings::insert_earning(fees.earning_for(&job.shop_id, job_id, payment.amount), now, &mut tx).await?;
        audit::insert_entry(NewAuditEntry::new(EntityType::PickupCode, job_id, "VERIFIED", &actor), now, &mut tx).await?;
        let entry = NewAuditEntry::new(EntityType::Job, job_id, "COMPLETED", &actor)
            .with_metadata(json!({ "payment_id": payment.id, "earning_id": earning.id }));
        audit::insert_entry(entry, now, &mut tx).await?;
        let entry = NewAuditEntry::new(EntityType::Earning, earning.id, "CREATED", &actor).with_metadata(json!({
            "job_id": job_id,
            "gross_amount": earning.gross_amount,
            "platform_fee": earning.platform_fee,
            "net_amount": earning.net_amount,
        }));
        audit::insert_entry(entry, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Job #{job_id} completed. Earning #{} of {} recorded for {}", earning.id, earning.net_amount, shop_id);
        Ok(PickupVerification::Completed(CompletedPickup { job, earning }))
    }

    async fn purge_expired_pickup_codes(&self, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let job_ids = pickup_codes::delete_expired(now, &mut tx).await?;
        let actor = Actor::System(MAINTENANCE_ACTOR.to_string());
        for job_id in &job_ids {
            audit::insert_entry(NewAuditEntry::new(EntityType::PickupCode, job_id, "EXPIRED", &actor), now, &mut tx)
                .await?;
        }
        tx.commit().await?;
        if !job_ids.is_empty() {
            debug!("🗃️ Purged {} expired pickup codes", job_ids.len());
        }
        Ok(job_ids.len() as u64)
    }

    async fn settle_earnings(
        &self,
        shop_id: &str,
        settlement_ref: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<SettlementResult, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let pending = earnings::lock_unsettled(shop_id, &mut tx).await?;
        if pending.is_empty() {
            return Err(LedgerError::NothingToSettle(shop_id.to_string()));
        }
        for earning in &pending {
            guards::ensure_unsettled(earning)?;
            if earnings::mark_settled(earning.id, settlement_ref, now, &mut tx).await? != 1 {
                return Err(LedgerError::InvalidState(format!("Earning #{} was settled concurrently", earning.id)));
            }
        }
        let total_payout = pending.iter().map(|e| e.net_amount).sum::<MinorUnits>();
        let count = pending.len() as i64;
        let earning_ids = pending.iter().map(|e| e.id).collect::<Vec<i64>>();
        let entry = NewAuditEntry::new(EntityType::Earning, shop_id, "SETTLED", actor).with_metadata(json!({
            "settlement_ref": settlement_ref,
            "total_payout": total_payout,
            "count": count,
            "earning_ids": earning_ids,
        }));
        audit::insert_entry(entry, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Settled {count} earnings for shop {shop_id} under {settlement_ref}. Total payout {total_payout}");
        Ok(SettlementResult {
            shop_id: shop_id.to_string(),
            settlement_ref: settlement_ref.to_string(),
            total_payout,
            count,
            settled_at: now,
        })
    }

    async fn clear_stale_artifacts(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReleasedArtifact>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let stale = jobs::lock_stale_artifacts(cutoff, &mut tx).await?;
        let actor = Actor::System(MAINTENANCE_ACTOR.to_string());
        let mut released = Vec::with_capacity(stale.len());
        for job in stale {
            let Some(artifact_ref) = job.artifact_ref else { continue };
            jobs::clear_artifact(job.id, now, &mut tx).await?;
            let entry = NewAuditEntry::new(EntityType::Job, job.id, "ARTIFACT_RELEASED", &actor)
                .with_metadata(json!({ "status": job.status }));
            audit::insert_entry(entry, now, &mut tx).await?;
            released.push(ReleasedArtifact { job_id: job.id, artifact_ref });
        }
        tx.commit().await?;
        Ok(released)
    }

    async fn close(&mut self) -> Result<(), LedgerError> {
        self.pool.close().await;
        Ok(())
    }
}

impl LedgerQueries for SqliteDatabase {
    async fn fetch_shop(&self, shop_id: &str) -> Result<Option<Shop>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(shops::fetch_shop(shop_id, &mut conn).await?)
    }

    async fn fetch_job(&self, job_id: i64) -> Result<Option<Job>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(jobs::fetch_job(job_id, &mut conn).await?)
    }

    async fn search_jobs(&self, query: JobQueryFilter) -> Result<Vec<Job>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(jobs::search_jobs(query, &mut conn).await?)
    }

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment(payment_id, &mut conn).await?)
    }

    async fn fetch_payment_for_job(&self, job_id: i64) -> Result<Option<Payment>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_for_job(job_id, &mut conn).await?)
    }

    async fn fetch_payment_by_idempotency_key(&self, key: &str) -> Result<Option<Payment>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_by_idempotency_key(key, &mut conn).await?)
    }

    async fn fetch_payment_by_gateway_order(&self, gateway_order_id: &str) -> Result<Option<Payment>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_by_gateway_order(gateway_order_id, &mut conn).await?)
    }

    async fn fetch_pickup_code(&self, job_id: i64) -> Result<Option<PickupCode>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(pickup_codes::fetch_for_job(job_id, &mut conn).await?)
    }

    async fn fetch_earning_for_job(&self, job_id: i64) -> Result<Option<Earning>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(earnings::fetch_for_job(job_id, &mut conn).await?)
    }

    async fn fetch_earnings_for_shop(&self, shop_id: &str) -> Result<Vec<Earning>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(earnings::fetch_for_shop(shop_id, &mut conn).await?)
    }

    async fn fetch_unsettled_balances(&self, shop_id: Option<&str>) -> Result<Vec<UnsettledBalance>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(earnings::unsettled_balances(shop_id, &mut conn).await?)
    }

    async fn fetch_earnings_summary(&self, shop_id: &str) -> Result<EarningsSummary, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(earnings::summary(shop_id, &mut conn).await?)
    }

    async fn fetch_audit_log(&self, entity_type: EntityType, entity_id: &str) -> Result<Vec<AuditEntry>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(audit::fetch_entries(entity_type, entity_id, &mut conn).await?)
    }
}
