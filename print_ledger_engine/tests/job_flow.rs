use chrono::Duration;
use print_ledger_engine::{
    db_types::{Actor, ColorMode, EntityType, JobStatus, MinorUnits, NewShop, PaperSize, PaymentMethod, PaymentStatus},
    job_objects::{SetPriceRequest, SubmitJobRequest},
    LedgerError,
    LedgerQueries,
};

mod support;

use support::{TestLedger, ALICE, BOB, OTHER_SHOP, SHOP};

#[tokio::test]
async fn submit_requires_an_active_shop() {
    let ledger = TestLedger::new().await;
    let request = SubmitJobRequest::new("nowhere", 1, ColorMode::Monochrome, PaperSize::Standard);
    let err = ledger.jobs.submit_job(ALICE, request).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)), "{err:?}");

    let admin = Actor::Admin("root".into());
    ledger.shops.set_shop_active(&admin, OTHER_SHOP, false).await.unwrap();
    let request = SubmitJobRequest::new(OTHER_SHOP, 1, ColorMode::Monochrome, PaperSize::Standard);
    let err = ledger.jobs.submit_job(ALICE, request).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)), "{err:?}");

    let request = SubmitJobRequest::new(SHOP, 0, ColorMode::Monochrome, PaperSize::Standard);
    let err = ledger.jobs.submit_job(ALICE, request).await.unwrap_err();
    assert!(matches!(err, LedgerError::ValidationError(_)), "{err:?}");

    let job = ledger.submit().await;
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.price, None);
    assert!(!job.price_accepted);
    assert_eq!(job.artifact_ref.as_deref(), Some("uploads/doc.pdf"));
    ledger.tear_down().await;
}

#[tokio::test]
async fn only_admins_change_the_shop_directory() {
    let ledger = TestLedger::new().await;
    for actor in [Actor::Shop(SHOP.into()), Actor::Requester(ALICE.into())] {
        let err = ledger.shops.register_shop(&actor, NewShop::new("shop-new", "New shop")).await.unwrap_err();
        assert_eq!(err, LedgerError::shop_not_found("shop-new"));
        let err = ledger.shops.set_shop_active(&actor, SHOP, false).await.unwrap_err();
        assert_eq!(err, LedgerError::shop_not_found(SHOP));
    }
    assert!(ledger.shops.shop(SHOP).await.unwrap().is_active);
    assert!(matches!(ledger.shops.shop("shop-new").await, Err(LedgerError::NotFound(_))));
    ledger.tear_down().await;
}

#[tokio::test]
async fn price_below_minimum_is_rejected_and_can_be_retried() {
    let ledger = TestLedger::new().await;
    let job = ledger.submit().await;
    let err = ledger.jobs.set_price(SHOP, SetPriceRequest::new(job.id, 15)).await.unwrap_err();
    assert_eq!(err, LedgerError::PriceTooLow { price: MinorUnits::from(15), minimum: MinorUnits::from(20) });
    let unchanged = ledger.db.fetch_job(job.id).await.unwrap().unwrap();
    assert_eq!(unchanged.price, None);
    assert_eq!(unchanged.priced_at, None);

    let priced = ledger.jobs.set_price(SHOP, SetPriceRequest::new(job.id, 25)).await.unwrap();
    assert_eq!(priced.price, Some(MinorUnits::from(25)));
    assert!(priced.priced_at.is_some());

    let err = ledger.jobs.set_price(SHOP, SetPriceRequest::new(job.id, 30)).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)), "{err:?}");
    ledger.tear_down().await;
}

#[tokio::test]
async fn only_the_owners_may_price_and_accept() {
    let ledger = TestLedger::new().await;
    let job = ledger.submit().await;
    let err = ledger.jobs.set_price(OTHER_SHOP, SetPriceRequest::new(job.id, 25)).await.unwrap_err();
    assert_eq!(err, LedgerError::job_not_found(job.id));
    let err = ledger.jobs.accept_price(ALICE, job.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)), "{err:?}");

    ledger.jobs.set_price(SHOP, SetPriceRequest::new(job.id, 25)).await.unwrap();
    let err = ledger.jobs.accept_price(BOB, job.id).await.unwrap_err();
    assert_eq!(err, LedgerError::job_not_found(job.id));
    let accepted = ledger.jobs.accept_price(ALICE, job.id).await.unwrap();
    assert!(accepted.price_accepted);
    assert!(accepted.price_accepted_at.is_some());
    let err = ledger.jobs.accept_price(ALICE, job.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)), "{err:?}");
    ledger.tear_down().await;
}

#[tokio::test]
async fn status_changes_follow_the_transition_table() {
    let ledger = TestLedger::new().await;
    let job = ledger.submit().await;
    ledger.jobs.set_price(SHOP, SetPriceRequest::new(job.id, 25)).await.unwrap();
    let err = ledger.jobs.mark_ready(SHOP, job.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)), "{err:?}");

    ledger.jobs.accept_price(ALICE, job.id).await.unwrap();
    let err = ledger.jobs.update_status(SHOP, job.id, JobStatus::Completed).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)), "{err:?}");
    let ready = ledger.jobs.mark_ready(SHOP, job.id).await.unwrap();
    assert_eq!(ready.status, JobStatus::Ready);

    let err = ledger.jobs.update_status(SHOP, job.id, JobStatus::Pending).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)), "{err:?}");
    let err = ledger.jobs.mark_ready(SHOP, job.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)), "{err:?}");

    ledger.jobs.cancel_job(ALICE, job.id).await.unwrap();
    for status in [JobStatus::Pending, JobStatus::Ready, JobStatus::Completed] {
        let err = ledger.jobs.update_status(SHOP, job.id, status).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)), "{status}: {err:?}");
    }
    let err = ledger.jobs.cancel_job(ALICE, job.id).await.unwrap_err();
    assert_eq!(err, LedgerError::AlreadyTerminal(job.id));
    ledger.tear_down().await;
}

#[tokio::test]
async fn cancelling_a_pending_job_releases_its_artifact() {
    let ledger = TestLedger::new().await;
    let job = ledger.submit().await;
    let err = ledger.jobs.cancel_job(BOB, job.id).await.unwrap_err();
    assert_eq!(err, LedgerError::job_not_found(job.id));

    let cancelled = ledger.jobs.cancel_job(ALICE, job.id).await.unwrap();
    assert_eq!(cancelled.job.status, JobStatus::Cancelled);
    assert_eq!(cancelled.job.artifact_ref, None);
    assert_eq!(cancelled.payment_before, None);
    assert_eq!(cancelled.released_artifact.as_deref(), Some("uploads/doc.pdf"));
    assert_eq!(ledger.artifacts.released(), vec!["uploads/doc.pdf".to_string()]);

    let history = ledger.jobs.job_history(&Actor::Requester(ALICE.into()), job.id).await.unwrap();
    let actions = history.iter().map(|e| e.action.as_str()).collect::<Vec<_>>();
    assert_eq!(actions, vec!["SUBMITTED", "CANCELLED"]);
    ledger.tear_down().await;
}

#[tokio::test]
async fn cancelling_a_paid_online_job_requests_a_refund() {
    let ledger = TestLedger::new().await;
    let job = ledger.accepted_job().await;
    let payment = ledger.pay(job.id, PaymentMethod::Online).await;
    assert_eq!(payment.status, PaymentStatus::Paid);

    let cancelled = ledger.jobs.cancel_job(ALICE, job.id).await.unwrap();
    assert_eq!(cancelled.job.status, JobStatus::Cancelled);
    assert_eq!(cancelled.payment_before.map(|p| p.status), Some(PaymentStatus::Paid));
    assert_eq!(cancelled.payment_after.map(|p| p.status), Some(PaymentStatus::RefundPending));
    let payment = ledger.db.fetch_payment_for_job(job.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::RefundPending);
    assert!(ledger.db.fetch_earning_for_job(job.id).await.unwrap().is_none());

    let entries = ledger.db.fetch_audit_log(EntityType::Job, &job.id.to_string()).await.unwrap();
    let cancel = entries.iter().find(|e| e.action == "CANCELLED").unwrap();
    let metadata = cancel.metadata_json();
    assert_eq!(metadata["payment_status_before"], "PAID");
    assert_eq!(metadata["payment_method"], "ONLINE");
    ledger.tear_down().await;
}

#[tokio::test]
async fn cancelling_other_payments() {
    let ledger = TestLedger::new().await;
    let offline = ledger.accepted_job().await;
    ledger.pay(offline.id, PaymentMethod::Offline).await;
    let cancelled = ledger.jobs.cancel_job(ALICE, offline.id).await.unwrap();
    assert_eq!(cancelled.payment_after.map(|p| p.status), Some(PaymentStatus::Cancelled));

    let initiated = ledger.accepted_job().await;
    let request = print_ledger_engine::job_objects::CreatePaymentRequest::new(initiated.id, PaymentMethod::Online, "k");
    ledger.payments.create_payment(ALICE, request).await.unwrap();
    let cancelled = ledger.jobs.cancel_job(ALICE, initiated.id).await.unwrap();
    assert_eq!(cancelled.payment_after.map(|p| p.status), Some(PaymentStatus::Cancelled));
    ledger.tear_down().await;
}

#[tokio::test]
async fn a_live_pickup_code_blocks_cancellation() {
    let ledger = TestLedger::new().await;
    let job = ledger.ready_paid_job(PaymentMethod::Offline).await;
    ledger.pickup.issue_pickup_code(SHOP, job.id).await.unwrap();
    let err = ledger.jobs.cancel_job(ALICE, job.id).await.unwrap_err();
    assert_eq!(err, LedgerError::PickupInProgress(job.id));

    ledger.clock.advance(Duration::minutes(6));
    let cancelled = ledger.jobs.cancel_job(ALICE, job.id).await.unwrap();
    assert_eq!(cancelled.job.status, JobStatus::Cancelled);
    assert!(ledger.db.fetch_pickup_code(job.id).await.unwrap().is_none());
    ledger.tear_down().await;
}

#[tokio::test]
async fn jobs_are_only_visible_to_their_parties() {
    let ledger = TestLedger::new().await;
    let job = ledger.submit().await;
    for actor in [Actor::Requester(ALICE.into()), Actor::Shop(SHOP.into()), Actor::Admin("root".into())] {
        assert_eq!(ledger.jobs.job(&actor, job.id).await.unwrap().id, job.id);
    }
    for actor in [Actor::Requester(BOB.into()), Actor::Shop(OTHER_SHOP.into())] {
        assert_eq!(ledger.jobs.job(&actor, job.id).await.unwrap_err(), LedgerError::job_not_found(job.id));
    }
    let err = ledger.jobs.job_history(&Actor::Requester(BOB.into()), job.id).await.unwrap_err();
    assert_eq!(err, LedgerError::job_not_found(job.id));

    let second = ledger.accepted_job().await;
    ledger.jobs.mark_ready(SHOP, second.id).await.unwrap();
    assert_eq!(ledger.jobs.jobs_for_requester(ALICE).await.unwrap().len(), 2);
    assert!(ledger.jobs.jobs_for_requester(BOB).await.unwrap().is_empty());
    assert_eq!(ledger.jobs.jobs_for_shop(SHOP, &[]).await.unwrap().len(), 2);
    let ready = ledger.jobs.jobs_for_shop(SHOP, &[JobStatus::Ready]).await.unwrap();
    assert_eq!(ready.iter().map(|j| j.id).collect::<Vec<_>>(), vec![second.id]);
    assert!(ledger.jobs.jobs_for_shop(OTHER_SHOP, &[]).await.unwrap().is_empty());
    ledger.tear_down().await;
}

#[tokio::test]
async fn stale_artifacts_are_swept_after_the_retention_window() {
    let ledger = TestLedger::new().await;
    let job = ledger.ready_paid_job(PaymentMethod::Offline).await;
    ledger.pickup.issue_pickup_code(SHOP, job.id).await.unwrap();
    let code = ledger.db.fetch_pickup_code(job.id).await.unwrap().unwrap();
    let request = print_ledger_engine::job_objects::VerifyPickupRequest::new(job.id, code.code.clone());
    ledger.pickup.verify_pickup_code(SHOP, request).await.unwrap();
    let open = ledger.submit().await;

    ledger.clock.advance(Duration::days(30));
    assert!(ledger.jobs.sweep_stale_artifacts(Duration::days(90)).await.unwrap().is_empty());

    ledger.clock.advance(Duration::days(61));
    let released = ledger.jobs.sweep_stale_artifacts(Duration::days(90)).await.unwrap();
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].job_id, job.id);
    assert_eq!(ledger.artifacts.released(), vec!["uploads/doc.pdf".to_string()]);
    assert_eq!(ledger.db.fetch_job(job.id).await.unwrap().unwrap().artifact_ref, None);
    // Open jobs keep their documents no matter how old they are
    assert!(ledger.db.fetch_job(open.id).await.unwrap().unwrap().artifact_ref.is_some());
    assert!(ledger.jobs.sweep_stale_artifacts(Duration::days(90)).await.unwrap().is_empty());
    ledger.tear_down().await;
}
