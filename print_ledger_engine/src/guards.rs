//! Business rules that decide whether a mutation may go ahead.
//!
//! The storage backend calls these against rows it has already locked, so the answer cannot go stale before the
//! change is written. They do no I/O and are tested on their own.
use chrono::{DateTime, Utc};

use crate::{
    db_types::{Actor, Earning, Job, JobStatus, Payment, PaymentTransition, PickupCode},
    traits::LedgerError,
};

pub fn ensure_can_set_price(job: &Job) -> Result<(), LedgerError> {
    if job.status != JobStatus::Pending {
        return Err(LedgerError::InvalidState(format!("Job #{} is {} and can no longer be priced", job.id, job.status)));
    }
    if job.price.is_some() {
        return Err(LedgerError::InvalidState(format!("Job #{} has already been priced", job.id)));
    }
    Ok(())
}

pub fn ensure_can_accept_price(job: &Job) -> Result<(), LedgerError> {
    if job.status != JobStatus::Pending {
        return Err(LedgerError::InvalidState(format!("Job #{} is {}", job.id, job.status)));
    }
    if job.price.is_none() {
        return Err(LedgerError::InvalidState(format!("Job #{} has not been priced yet", job.id)));
    }
    if job.price_accepted {
        return Err(LedgerError::InvalidState(format!("The price for job #{} was already accepted", job.id)));
    }
    Ok(())
}

/// Shop-requested status changes must have an agreed price and be allowed by the transition table.
pub fn ensure_can_move_to(job: &Job, status: JobStatus) -> Result<(), LedgerError> {
    if !job.has_agreed_price() {
        return Err(LedgerError::InvalidState(format!(
            "Job #{} cannot move to {status} until a price is set and accepted",
            job.id
        )));
    }
    if !job.status.can_transition_to(status) {
        return Err(LedgerError::InvalidState(format!("Job #{} cannot move from {} to {status}", job.id, job.status)));
    }
    Ok(())
}

/// Checks that the requester may cancel the job. Returns `true` if the job has an expired pickup code that must be
/// purged as part of the cancellation.
pub fn ensure_cancellable(job: &Job, code: Option<&PickupCode>, now: DateTime<Utc>) -> Result<bool, LedgerError> {
    if job.status.is_terminal() {
        return Err(LedgerError::AlreadyTerminal(job.id));
    }
    match code {
        Some(code) if !code.is_expired(now) => Err(LedgerError::PickupInProgress(job.id)),
        Some(_) => Ok(true),
        None => Ok(false),
    }
}

/// A payment may be created once the price is accepted. This runs after the existing-payment check, so a retry for a
/// job that has since completed still returns its payment.
pub fn ensure_price_accepted(job: &Job) -> Result<(), LedgerError> {
    if job.has_agreed_price() {
        Ok(())
    } else {
        Err(LedgerError::PriceNotAccepted(job.id))
    }
}

pub fn ensure_payable(job: &Job) -> Result<(), LedgerError> {
    ensure_price_accepted(job)?;
    if job.status.is_terminal() {
        return Err(LedgerError::InvalidState(format!("Job #{} is {} and cannot be paid for", job.id, job.status)));
    }
    Ok(())
}

/// Pickup codes are only issued and verified for jobs that are `READY` and fully paid.
pub fn ensure_ready_for_pickup(job: &Job, payment: Option<&Payment>) -> Result<(), LedgerError> {
    if job.status != JobStatus::Ready {
        return Err(LedgerError::NotReady(job.id));
    }
    match payment {
        Some(p) if p.is_paid() => Ok(()),
        _ => Err(LedgerError::PaymentIncomplete(job.id)),
    }
}

/// Who may request each kind of payment transition. Anyone else is told the payment does not exist.
pub fn ensure_may_transition(job: &Job, actor: &Actor, transition: &PaymentTransition) -> Result<(), LedgerError> {
    let allowed = match (transition, actor) {
        (_, Actor::Admin(_) | Actor::System(_)) => true,
        (PaymentTransition::ConfirmOffline, Actor::Shop(id)) => job.is_owned_by_shop(id),
        (PaymentTransition::ConfirmMock, Actor::Requester(id)) => job.is_owned_by_requester(id),
        _ => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(LedgerError::payment_not_found(format!("for job #{}", job.id)))
    }
}

pub fn ensure_unsettled(earning: &Earning) -> Result<(), LedgerError> {
    if earning.is_settled() {
        return Err(LedgerError::InvalidState(format!("Earning #{} is already settled", earning.id)));
    }
    Ok(())
}
