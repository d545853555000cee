use chrono::Duration;
use cucumber::{given, then, when};
use print_ledger_engine::{
    db_types::{ColorMode, JobStatus, MinorUnits, PaperSize, PaymentMethod, PaymentStatus},
    job_objects::{SetPriceRequest, SubmitJobRequest, VerifyPickupRequest},
    LedgerQueries,
};

use crate::cucumber::{ledger_world::error_name, LedgerWorld};

#[given(expr = "{word} submits a job of {int} {word} {word} copies to {word}")]
async fn submit_job(world: &mut LedgerWorld, requester: String, copies: i64, color: String, size: String, shop: String) {
    let color = color.parse::<ColorMode>().expect("Not a colour mode");
    let size = size.parse::<PaperSize>().expect("Not a paper size");
    let request = SubmitJobRequest::new(shop, copies, color, size).with_artifact("uploads/feature.pdf");
    let job = world.ledger().jobs.submit_job(&requester, request).await.expect("Error submitting job");
    world.job_id = Some(job.id);
}

#[given(expr = "{int} jobs collected at {word}")]
async fn collected_jobs(world: &mut LedgerWorld, count: u32, shop: String) {
    for _ in 0..count {
        let job = world.ledger().ready_paid_job(PaymentMethod::Offline).await;
        world.ledger().pickup.issue_pickup_code(&shop, job.id).await.expect("Error issuing code");
        let code = world.ledger().db.fetch_pickup_code(job.id).await.unwrap().expect("No code").code;
        let request = VerifyPickupRequest::new(job.id, code);
        world.ledger().pickup.verify_pickup_code(&shop, request).await.expect("Error verifying code");
    }
}

#[when(expr = "{word} quotes {int} for the job")]
async fn quote(world: &mut LedgerWorld, shop: String, price: i64) {
    let request = SetPriceRequest::new(world.job_id(), price);
    let result = world.ledger().jobs.set_price(&shop, request).await;
    world.record(result);
}

#[given(expr = "{word} pays {word} for the job")]
async fn pay(world: &mut LedgerWorld, _requester: String, method: String) {
    let method = method.parse::<PaymentMethod>().expect("Not a payment method");
    world.ledger().pay(world.job_id(), method).await;
}

#[when(expr = "{word} cancels the job")]
async fn cancel(world: &mut LedgerWorld, requester: String) {
    let result = world.ledger().jobs.cancel_job(&requester, world.job_id()).await;
    world.record(result);
}

#[when(expr = "{word} issues a pickup code")]
async fn issue_code(world: &mut LedgerWorld, shop: String) {
    let result = world.ledger().pickup.issue_pickup_code(&shop, world.job_id()).await;
    world.record(result);
}

#[when(expr = "the requester presents the pickup code to {word}")]
async fn present_code(world: &mut LedgerWorld, shop: String) {
    let job_id = world.job_id();
    // Once the code is gone any well-formed code will do
    let code = match world.ledger().db.fetch_pickup_code(job_id).await.unwrap() {
        Some(code) => code.code,
        None => "999999".to_string(),
    };
    let result = world.ledger().pickup.verify_pickup_code(&shop, VerifyPickupRequest::new(job_id, code)).await;
    world.record(result);
}

#[when(expr = "{int} minutes pass")]
async fn time_passes(world: &mut LedgerWorld, minutes: i64) {
    world.ledger().clock.advance(Duration::minutes(minutes));
}

#[when(expr = "{word} settles its earnings")]
async fn settle(world: &mut LedgerWorld, shop: String) {
    let actor = print_ledger_engine::db_types::Actor::Shop(shop.clone());
    let result = world.ledger().settlement.settle(&actor, &shop).await;
    world.settlement = world.record(result);
}

#[then(expr = "the request fails with {word}")]
async fn request_fails(world: &mut LedgerWorld, expected: String) {
    let err = world.last_error.as_ref().expect("The last request succeeded");
    assert_eq!(error_name(err), expected, "Unexpected error: {err}");
}

#[then("the job has no price")]
async fn unpriced(world: &mut LedgerWorld) {
    let job = world.ledger().db.fetch_job(world.job_id()).await.unwrap().expect("Job not found");
    assert_eq!(job.price, None);
}

#[then(expr = "the job is priced at {int}")]
async fn priced(world: &mut LedgerWorld, price: i64) {
    let job = world.ledger().db.fetch_job(world.job_id()).await.unwrap().expect("Job not found");
    assert_eq!(job.price, Some(MinorUnits::from(price)));
}

#[then(expr = "the job is {word}")]
async fn job_status(world: &mut LedgerWorld, status: String) {
    let status = status.parse::<JobStatus>().expect("Not a job status");
    let job = world.ledger().db.fetch_job(world.job_id()).await.unwrap().expect("Job not found");
    assert_eq!(job.status, status);
}

#[then(expr = "the payment is {word}")]
async fn payment_status(world: &mut LedgerWorld, status: String) {
    let status = status.parse::<PaymentStatus>().expect("Not a payment status");
    let payment = world.ledger().db.fetch_payment_for_job(world.job_id()).await.unwrap().expect("No payment");
    assert_eq!(payment.status, status);
}

#[then(expr = "{word} has no earnings")]
async fn no_earnings(world: &mut LedgerWorld, shop: String) {
    assert!(world.ledger().db.fetch_earnings_for_shop(&shop).await.unwrap().is_empty());
}

#[then(expr = "{word} has an unsettled balance of {int}")]
async fn unsettled_balance(world: &mut LedgerWorld, shop: String, amount: i64) {
    let balances = world.ledger().db.fetch_unsettled_balances(Some(&shop)).await.unwrap();
    let total = balances.first().map(|b| b.total_net).unwrap_or_default();
    assert_eq!(total, MinorUnits::from(amount));
}

#[then(expr = "the settlement pays out {int} for {int} earnings")]
async fn settlement_totals(world: &mut LedgerWorld, amount: i64, count: i64) {
    let settlement = world.settlement.as_ref().expect("No settlement was made");
    assert_eq!(settlement.total_payout, MinorUnits::from(amount));
    assert_eq!(settlement.count, count);
}
