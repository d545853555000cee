use std::{fmt::Debug, sync::Arc};

use log::*;
use pl_common::Secret;

use crate::{
    db_types::{Actor, NewPayment, Payment, PaymentMethod, PaymentStatus, PaymentTransition},
    helpers::{Clock, SystemClock},
    ledger_api::job_objects::{CreatePaymentRequest, GatewayOutcome, RefundOutcome},
    traits::{InsertPaymentResult, LedgerDatabase, LedgerError, PaymentChange},
};

/// The actor recorded in the audit log for changes reported by the payment gateway.
pub const PAYMENT_GATEWAY_ACTOR: &str = "payment-gateway";

/// `PaymentApi` creates payments for accepted jobs and moves them through their life cycle: confirmation by the shop
/// or the test gateway, the payment gateway's webhooks and refunds of cancelled jobs.
///
/// Every change is idempotent. Repeating a request that has already been applied returns the current record.
pub struct PaymentApi<B> {
    db: B,
    webhook_secret: Secret<String>,
    clock: Arc<dyn Clock>,
}

impl<B> Debug for PaymentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi (webhook secret: {:?})", self.webhook_secret)
    }
}

impl<B> PaymentApi<B> {
    pub fn new(db: B, webhook_secret: Secret<String>) -> Self {
        Self { db, webhook_secret, clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    fn authenticate(&self, presented: &str) -> Result<(), LedgerError> {
        if self.webhook_secret.is_empty() || !self.webhook_secret.matches(presented) {
            warn!("🔄️🔐️ Rejected a webhook call with an invalid secret");
            return Err(LedgerError::Unauthenticated);
        }
        Ok(())
    }
}

impl<B> PaymentApi<B>
where B: LedgerDatabase
{
    /// Creates the payment for an accepted job.
    ///
    /// This is safe to retry. If the idempotency key has been seen before, or the job already has a payment, the
    /// existing payment is returned unchanged. A key that belongs to another requester's payment is reported as not
    /// found.
    pub async fn create_payment(
        &self,
        requester_id: &str,
        request: CreatePaymentRequest,
    ) -> Result<InsertPaymentResult, LedgerError> {
        request.validate()?;
        if let Some(existing) = self.db.fetch_payment_by_idempotency_key(&request.idempotency_key).await? {
            let owner = self.db.fetch_job(existing.job_id).await?;
            return match owner {
                Some(job) if job.is_owned_by_requester(requester_id) => {
                    debug!("🔄️💳️ Payment #{} already exists for this idempotency key", existing.id);
                    Ok(InsertPaymentResult::AlreadyExists(existing))
                },
                _ => {
                    warn!("🔄️💳️ {requester_id} presented an idempotency key that belongs to someone else");
                    Err(LedgerError::payment_not_found(&request.idempotency_key))
                },
            };
        }
        let payment = NewPayment {
            job_id: request.job_id,
            requester_id: requester_id.to_string(),
            method: request.method,
            idempotency_key: request.idempotency_key,
        };
        let result = self.db.insert_payment(payment, self.clock.now()).await?;
        if result.is_new() {
            let p = result.payment();
            info!("🔄️💳️ {} payment #{} of {} created for job #{}", p.method, p.id, p.amount, p.job_id);
        }
        Ok(result)
    }

    /// The shop confirms that it received cash for an offline payment.
    pub async fn confirm_offline_payment(&self, shop_id: &str, job_id: i64) -> Result<Payment, LedgerError> {
        let actor = Actor::Shop(shop_id.to_string());
        let payment = self.payment_for_visible_job(&actor, job_id).await?;
        self.confirm(payment, PaymentMethod::Offline, PaymentTransition::ConfirmOffline, &actor).await
    }

    /// The test gateway reports success on behalf of the requester.
    pub async fn confirm_mock_payment(&self, requester_id: &str, job_id: i64) -> Result<Payment, LedgerError> {
        let actor = Actor::Requester(requester_id.to_string());
        let payment = self.payment_for_visible_job(&actor, job_id).await?;
        self.confirm(payment, PaymentMethod::Online, PaymentTransition::ConfirmMock, &actor).await
    }

    async fn confirm(
        &self,
        payment: Payment,
        method: PaymentMethod,
        transition: PaymentTransition,
        actor: &Actor,
    ) -> Result<Payment, LedgerError> {
        if payment.method != method {
            return Err(LedgerError::InvalidState(format!(
                "Payment #{} is an {} payment and cannot be confirmed this way",
                payment.id, payment.method
            )));
        }
        let change = self.db.transition_payment(payment.id, transition, actor, self.clock.now()).await?;
        match change {
            PaymentChange { new, applied: true, .. } => {
                info!("🔄️💳️ Payment #{} for job #{} confirmed by {actor}", new.id, new.job_id);
                Ok(new)
            },
            PaymentChange { new, .. } if new.status == PaymentStatus::Paid => {
                debug!("🔄️💳️ Payment #{} was already paid", new.id);
                Ok(new)
            },
            PaymentChange { new, .. } => Err(LedgerError::InvalidState(format!(
                "Payment #{} is {} and cannot be confirmed",
                new.id, new.status
            ))),
        }
    }

    /// Links an initiated online payment to the order the payment gateway created for it.
    pub async fn attach_gateway_order(
        &self,
        actor: &Actor,
        payment_id: i64,
        gateway_order_id: &str,
    ) -> Result<Payment, LedgerError> {
        if gateway_order_id.trim().is_empty() {
            return Err(LedgerError::ValidationError("The gateway order reference cannot be blank".into()));
        }
        let change = self.db.attach_gateway_order(payment_id, gateway_order_id, actor, self.clock.now()).await?;
        Ok(change.new)
    }

    /// Handles the payment gateway's report on an order.
    ///
    /// The shared secret is checked before anything else. A report for a payment that has already left `INITIATED`
    /// is a re-delivery and succeeds without changing anything.
    pub async fn on_payment_webhook(
        &self,
        secret: &str,
        gateway_order_id: &str,
        outcome: GatewayOutcome,
    ) -> Result<Payment, LedgerError> {
        self.authenticate(secret)?;
        let transition = match outcome {
            GatewayOutcome::Success { gateway_payment_id } => PaymentTransition::GatewayPaid { gateway_payment_id },
            GatewayOutcome::Failure { reason } => PaymentTransition::GatewayFailed { reason },
        };
        let actor = Actor::System(PAYMENT_GATEWAY_ACTOR.to_string());
        let change = self
            .db
            .transition_payment_by_gateway_order(gateway_order_id, transition, &actor, self.clock.now())
            .await?;
        if change.applied {
            info!("🔄️🌐️ Gateway order {gateway_order_id}: payment #{} is now {}", change.new.id, change.new.status);
        } else {
            debug!(
                "🔄️🌐️ Gateway order {gateway_order_id} was already processed. Payment #{} stays {}",
                change.new.id, change.new.status
            );
        }
        Ok(change.new)
    }

    /// Handles the payment gateway's report on a refund.
    ///
    /// Refunds are only expected for `REFUND_PENDING` payments. A failed refund records the reason and leaves the
    /// payment pending; nothing is retried automatically.
    pub async fn on_refund_webhook(
        &self,
        secret: &str,
        payment_id: i64,
        outcome: RefundOutcome,
    ) -> Result<Payment, LedgerError> {
        self.authenticate(secret)?;
        let payment =
            self.db.fetch_payment(payment_id).await?.ok_or_else(|| LedgerError::payment_not_found(payment_id))?;
        match payment.status {
            PaymentStatus::Refunded => {
                debug!("🔄️🌐️ Payment #{payment_id} was already refunded");
                return Ok(payment);
            },
            PaymentStatus::RefundPending => {},
            status => {
                warn!("🔄️🌐️ Refund reported for payment #{payment_id}, which is {status}");
                return Err(LedgerError::InvalidState(format!("Payment #{payment_id} is {status}, not awaiting a refund")));
            },
        }
        let transition = match outcome {
            RefundOutcome::Success => PaymentTransition::Refunded,
            RefundOutcome::Failure { reason } => PaymentTransition::RefundFailed { reason },
        };
        let actor = Actor::System(PAYMENT_GATEWAY_ACTOR.to_string());
        let change = self.db.transition_payment(payment_id, transition, &actor, self.clock.now()).await?;
        match (change.applied, change.new.status) {
            (true, PaymentStatus::Refunded) => info!("🔄️🌐️ Payment #{payment_id} has been refunded"),
            (true, _) => warn!(
                "🔄️🌐️ The refund of payment #{payment_id} failed: {}",
                change.new.failure_reason.as_deref().unwrap_or("no reason given")
            ),
            (false, status) => debug!("🔄️🌐️ Payment #{payment_id} is {status}. The refund report changes nothing."),
        }
        Ok(change.new)
    }

    /// The payment of a job, for the job's requester or shop.
    pub async fn payment_for_job(&self, actor: &Actor, job_id: i64) -> Result<Payment, LedgerError> {
        self.payment_for_visible_job(actor, job_id).await
    }

    async fn payment_for_visible_job(&self, actor: &Actor, job_id: i64) -> Result<Payment, LedgerError> {
        let visible = self.db.fetch_job(job_id).await?.map(|j| j.is_visible_to(actor)).unwrap_or(false);
        if !visible {
            return Err(LedgerError::job_not_found(job_id));
        }
        self.db
            .fetch_payment_for_job(job_id)
            .await?
            .ok_or_else(|| LedgerError::payment_not_found(format!("for job #{job_id}")))
    }
}
