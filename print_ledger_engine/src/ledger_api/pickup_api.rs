use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::NewPickupCode,
    events::{publish, EventProducers, JobCompletedEvent, PickupCodeIssuedEvent},
    helpers::{generate_pickup_code, Clock, SystemClock},
    ledger_api::job_objects::VerifyPickupRequest,
    pricing::FeePolicy,
    traits::{CompletedPickup, LedgerDatabase, LedgerError, PickupVerification},
};

/// What the shop learns when a pickup code is issued. The code itself only goes to the requester, through the
/// `on_pickup_code_issued` hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedPickupCode {
    pub job_id: i64,
    pub expires_at: DateTime<Utc>,
}

/// `PickupApi` runs the hand-over protocol. The shop asks for a code once the job is ready and paid, the requester
/// presents it at the counter, and a successful verification completes the job and books the shop's earning.
pub struct PickupApi<B> {
    db: B,
    fees: FeePolicy,
    code_ttl: Duration,
    producers: EventProducers,
    clock: Arc<dyn Clock>,
}

impl<B> Debug for PickupApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PickupApi (fee: {}bps, code ttl: {}s)", self.fees.fee_bps(), self.code_ttl.num_seconds())
    }
}

impl<B> PickupApi<B> {
    pub fn new(db: B, fees: FeePolicy, code_ttl: Duration, producers: EventProducers) -> Self {
        Self { db, fees, code_ttl, producers, clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> PickupApi<B>
where B: LedgerDatabase
{
    /// Issues a pickup code for a `READY`, paid job owned by the shop.
    ///
    /// A job has at most one live code. An expired code is replaced; a live one yields
    /// [`LedgerError::CodeAlreadyIssued`].
    pub async fn issue_pickup_code(&self, shop_id: &str, job_id: i64) -> Result<IssuedPickupCode, LedgerError> {
        let now = self.clock.now();
        let code = generate_pickup_code(&mut rand::thread_rng());
        let stored = self.db.insert_pickup_code(NewPickupCode::new(job_id, code, now, self.code_ttl), shop_id, now).await?;
        let event = PickupCodeIssuedEvent {
            job_id,
            requester_id: stored.requester_id.clone(),
            shop_id: shop_id.to_string(),
            code: stored.code.clone(),
            expires_at: stored.expires_at,
        };
        if self.producers.pickup_code_issued_producer.is_empty() {
            warn!("🔄️🎟️ A pickup code was issued for job #{job_id}, but nobody is listening to deliver it");
        }
        publish(&self.producers.pickup_code_issued_producer, event).await;
        info!("🔄️🎟️ Pickup code issued for job #{job_id}. It expires at {}", stored.expires_at);
        Ok(IssuedPickupCode { job_id, expires_at: stored.expires_at })
    }

    /// Checks the code the requester presented. On success the job is completed and the shop's earning recorded in the
    /// same transaction.
    ///
    /// An expired code is deleted and [`LedgerError::CodeExpired`] is returned; a fresh code must be issued.
    pub async fn verify_pickup_code(
        &self,
        shop_id: &str,
        request: VerifyPickupRequest,
    ) -> Result<CompletedPickup, LedgerError> {
        request.validate()?;
        let job_id = request.job_id;
        let result = self.db.complete_pickup(job_id, shop_id, &request.code, self.fees, self.clock.now()).await;
        match result {
            Ok(PickupVerification::Completed(completed)) => {
                info!(
                    "🔄️✅️ Job #{job_id} collected. Shop {shop_id} earns {} after a fee of {}",
                    completed.earning.net_amount, completed.earning.platform_fee
                );
                let event = JobCompletedEvent::new(completed.job.clone(), completed.earning.clone());
                publish(&self.producers.job_completed_producer, event).await;
                Ok(completed)
            },
            Ok(PickupVerification::Expired) => {
                info!("🔄️🎟️ The pickup code for job #{job_id} had expired and has been discarded");
                Err(LedgerError::CodeExpired)
            },
            Err(LedgerError::CodeMismatch) => {
                warn!("🔄️🎟️ Shop {shop_id} presented a wrong pickup code for job #{job_id}");
                Err(LedgerError::CodeMismatch)
            },
            Err(e) => Err(e),
        }
    }

    /// Deletes every expired pickup code.
    pub async fn purge_expired_codes(&self) -> Result<u64, LedgerError> {
        let count = self.db.purge_expired_pickup_codes(self.clock.now()).await?;
        if count > 0 {
            info!("🔄️🧹️ Purged {count} expired pickup codes");
        }
        Ok(count)
    }
}
