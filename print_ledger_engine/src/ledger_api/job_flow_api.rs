use std::{fmt::Debug, sync::Arc};

use chrono::Duration;
use log::*;

use crate::{
    db_types::{Actor, AuditEntry, EntityType, Job, JobStatus},
    events::{publish, EventProducers, JobCancelledEvent},
    guards,
    helpers::{Clock, SystemClock},
    ledger_api::job_objects::{JobQueryFilter, SetPriceRequest, SubmitJobRequest},
    pricing::PricingPolicy,
    traits::{ArtifactStore, CancelledJob, LedgerDatabase, LedgerError, ReleasedArtifact},
};

/// `JobFlowApi` takes a job from submission to `READY`, and handles cancellation.
///
/// The artifact store is only used to release uploaded documents once a job no longer needs them. Releases happen
/// after the ledger transaction commits; a failed release is logged and does not undo the ledger change.
pub struct JobFlowApi<B, A> {
    db: B,
    artifacts: A,
    pricing: PricingPolicy,
    producers: EventProducers,
    clock: Arc<dyn Clock>,
}

impl<B, A> Debug for JobFlowApi<B, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JobFlowApi ({:?})", self.pricing)
    }
}

impl<B, A> JobFlowApi<B, A> {
    pub fn new(db: B, artifacts: A, pricing: PricingPolicy, producers: EventProducers) -> Self {
        Self { db, artifacts, pricing, producers, clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }
}

impl<B, A> JobFlowApi<B, A>
where
    B: LedgerDatabase,
    A: ArtifactStore,
{
    /// Submits a new job to an active shop. The job starts out `PENDING` and unpriced.
    pub async fn submit_job(&self, requester_id: &str, request: SubmitJobRequest) -> Result<Job, LedgerError> {
        request.validate()?;
        let job = self.db.insert_job(request.into_new_job(requester_id), self.clock.now()).await?;
        info!("🔄️🖨️ Job #{} submitted by {requester_id} to shop {}", job.id, job.shop_id);
        Ok(job)
    }

    /// The shop quotes a price for the job.
    ///
    /// A quote below the pricing policy's minimum is rejected with [`LedgerError::PriceTooLow`] and leaves the job
    /// unpriced, so the shop can simply try again.
    pub async fn set_price(&self, shop_id: &str, request: SetPriceRequest) -> Result<Job, LedgerError> {
        request.validate()?;
        let job_id = request.job_id;
        let job = self
            .db
            .fetch_job(job_id)
            .await?
            .filter(|j| j.is_owned_by_shop(shop_id))
            .ok_or_else(|| LedgerError::job_not_found(job_id))?;
        guards::ensure_can_set_price(&job)?;
        let minimum = self.pricing.minimum_price(job.copies, job.color_mode, job.paper_size).ok_or_else(|| {
            LedgerError::ValidationError(format!("The minimum price for job #{job_id} is too large to represent"))
        })?;
        if request.price < minimum {
            warn!("🔄️💲️ Shop {shop_id} quoted {} for job #{job_id}, below the minimum of {minimum}", request.price);
            return Err(LedgerError::PriceTooLow { price: request.price, minimum });
        }
        let job = self.db.set_job_price(job_id, shop_id, request.price, self.clock.now()).await?;
        debug!("🔄️💲️ Job #{job_id} priced at {}", request.price);
        Ok(job)
    }

    /// The requester agrees to the quoted price.
    pub async fn accept_price(&self, requester_id: &str, job_id: i64) -> Result<Job, LedgerError> {
        let job = self.db.accept_job_price(job_id, requester_id, self.clock.now()).await?;
        debug!("🔄️💲️ {requester_id} accepted the price of job #{job_id}");
        Ok(job)
    }

    /// The shop has printed the job and it is waiting to be collected.
    pub async fn mark_ready(&self, shop_id: &str, job_id: i64) -> Result<Job, LedgerError> {
        self.update_status(shop_id, job_id, JobStatus::Ready).await
    }

    /// Moves the job to `status` on behalf of the shop. Only the transitions in the shop transition table are allowed;
    /// completion and cancellation have their own flows.
    pub async fn update_status(&self, shop_id: &str, job_id: i64, status: JobStatus) -> Result<Job, LedgerError> {
        let job = self.db.update_job_status(job_id, shop_id, status, self.clock.now()).await?;
        info!("🔄️🖨️ Job #{job_id} is now {status}");
        Ok(job)
    }

    /// The requester cancels the job.
    ///
    /// The payment follows the cancellation rule: a paid online payment becomes `REFUND_PENDING`, everything else that
    /// is still open is cancelled. Once the change is committed, the uploaded document is released and subscribers
    /// are notified.
    pub async fn cancel_job(&self, requester_id: &str, job_id: i64) -> Result<CancelledJob, LedgerError> {
        let cancelled = self.db.cancel_job(job_id, requester_id, self.clock.now()).await?;
        if let Some(artifact_ref) = &cancelled.released_artifact {
            self.release_artifact(job_id, artifact_ref).await;
        }
        let event = JobCancelledEvent { job: cancelled.job.clone(), payment: cancelled.payment_after.clone() };
        if event.refund_required() {
            info!("🔄️❌️ Job #{job_id} cancelled. Its online payment must be refunded.");
        } else {
            info!("🔄️❌️ Job #{job_id} cancelled");
        }
        publish(&self.producers.job_cancelled_producer, event).await;
        Ok(cancelled)
    }

    /// Fetches a job the actor is allowed to see.
    pub async fn job(&self, actor: &Actor, job_id: i64) -> Result<Job, LedgerError> {
        self.db
            .fetch_job(job_id)
            .await?
            .filter(|j| j.is_visible_to(actor))
            .ok_or_else(|| LedgerError::job_not_found(job_id))
    }

    pub async fn jobs_for_requester(&self, requester_id: &str) -> Result<Vec<Job>, LedgerError> {
        self.db.search_jobs(JobQueryFilter::default().with_requester_id(requester_id)).await
    }

    /// The shop's jobs, optionally limited to the given statuses.
    pub async fn jobs_for_shop(&self, shop_id: &str, statuses: &[JobStatus]) -> Result<Vec<Job>, LedgerError> {
        let query = statuses.iter().fold(JobQueryFilter::default().with_shop_id(shop_id), |q, s| q.with_status(*s));
        self.db.search_jobs(query).await
    }

    /// The audit trail of a job the actor is allowed to see.
    pub async fn job_history(&self, actor: &Actor, job_id: i64) -> Result<Vec<AuditEntry>, LedgerError> {
        let job = self.job(actor, job_id).await?;
        self.db.fetch_audit_log(EntityType::Job, &job.id.to_string()).await
    }

    /// Clears and releases the documents of completed or cancelled jobs that were created more than `retention` ago.
    pub async fn sweep_stale_artifacts(&self, retention: Duration) -> Result<Vec<ReleasedArtifact>, LedgerError> {
        let now = self.clock.now();
        let released = self.db.clear_stale_artifacts(now - retention, now).await?;
        for artifact in &released {
            self.release_artifact(artifact.job_id, &artifact.artifact_ref).await;
        }
        if !released.is_empty() {
            info!("🔄️🧹️ Released {} stale artifacts", released.len());
        }
        Ok(released)
    }

    async fn release_artifact(&self, job_id: i64, artifact_ref: &str) {
        match self.artifacts.release(artifact_ref).await {
            Ok(()) => trace!("🔄️🧹️ Released the artifact of job #{job_id}"),
            Err(e) => error!("🔄️🧹️ Job #{job_id} no longer references its artifact, but releasing it failed. {e}"),
        }
    }
}
