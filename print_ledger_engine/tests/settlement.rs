use print_ledger_engine::{
    db_types::{Actor, EntityType, Earning, MinorUnits, PaymentMethod},
    job_objects::VerifyPickupRequest,
    traits::EarningsSummary,
    LedgerError,
    LedgerQueries,
};

mod support;

use support::{TestLedger, ALICE, OTHER_SHOP, SHOP};

async fn completed_job(ledger: &TestLedger) -> Earning {
    let job = ledger.ready_paid_job(PaymentMethod::Offline).await;
    ledger.pickup.issue_pickup_code(SHOP, job.id).await.unwrap();
    let code = ledger.db.fetch_pickup_code(job.id).await.unwrap().unwrap().code;
    ledger.pickup.verify_pickup_code(SHOP, VerifyPickupRequest::new(job.id, code)).await.unwrap().earning
}

#[tokio::test]
async fn settling_twice_finds_nothing_the_second_time() {
    let ledger = TestLedger::new().await;
    let shop = Actor::Shop(SHOP.into());
    assert_eq!(ledger.settlement.settle(&shop, SHOP).await.unwrap_err(), LedgerError::NothingToSettle(SHOP.into()));

    completed_job(&ledger).await;
    completed_job(&ledger).await;
    let settlement = ledger.settlement.settle(&shop, SHOP).await.unwrap();
    assert_eq!(settlement.count, 2);
    assert_eq!(settlement.total_payout, MinorUnits::from(46));
    assert!(settlement.settlement_ref.starts_with("SETTLE_"));
    assert_eq!(settlement.settled_at, ledger.clock_now());

    for earning in ledger.db.fetch_earnings_for_shop(SHOP).await.unwrap() {
        assert_eq!(earning.settlement_ref.as_deref(), Some(settlement.settlement_ref.as_str()));
        assert_eq!(earning.settled_at, Some(settlement.settled_at));
    }
    assert_eq!(ledger.settlement.settle(&shop, SHOP).await.unwrap_err(), LedgerError::NothingToSettle(SHOP.into()));

    let entries = ledger.db.fetch_audit_log(EntityType::Earning, SHOP).await.unwrap();
    assert_eq!(entries.len(), 1);
    let metadata = entries[0].metadata_json();
    assert_eq!(metadata["settlement_ref"], settlement.settlement_ref.as_str());
    assert_eq!(metadata["count"], 2);
    ledger.tear_down().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_settlements_pay_out_once() {
    let ledger = TestLedger::new().await;
    let admin = Actor::Admin("root".into());
    completed_job(&ledger).await;
    completed_job(&ledger).await;

    let (a, b) = tokio::join!(ledger.settlement.settle(&admin, SHOP), ledger.settlement.settle(&admin, SHOP));
    let (settlement, err) = match (a, b) {
        (Ok(s), Err(e)) | (Err(e), Ok(s)) => (s, e),
        other => panic!("Expected exactly one settlement, got {other:?}"),
    };
    assert_eq!(err, LedgerError::NothingToSettle(SHOP.into()));
    assert_eq!(settlement.count, 2);
    assert_eq!(settlement.total_payout, MinorUnits::from(46));

    for earning in ledger.db.fetch_earnings_for_shop(SHOP).await.unwrap() {
        assert_eq!(earning.settlement_ref.as_deref(), Some(settlement.settlement_ref.as_str()));
    }
    assert_eq!(ledger.db.fetch_audit_log(EntityType::Earning, SHOP).await.unwrap().len(), 1);
    ledger.tear_down().await;
}

#[tokio::test]
async fn each_settlement_gets_its_own_reference() {
    let ledger = TestLedger::new().await;
    let admin = Actor::Admin("root".into());
    let first = completed_job(&ledger).await;
    let a = ledger.settlement.settle(&admin, SHOP).await.unwrap();
    let second = completed_job(&ledger).await;
    let b = ledger.settlement.settle(&admin, SHOP).await.unwrap();
    assert_ne!(a.settlement_ref, b.settlement_ref);
    assert_eq!(b.count, 1);
    let first = ledger.db.fetch_earning_for_job(first.job_id).await.unwrap().unwrap();
    let second = ledger.db.fetch_earning_for_job(second.job_id).await.unwrap().unwrap();
    assert_eq!(first.settlement_ref, Some(a.settlement_ref));
    assert_eq!(second.settlement_ref, Some(b.settlement_ref));
    ledger.tear_down().await;
}

#[tokio::test]
async fn settlement_permissions() {
    let ledger = TestLedger::new().await;
    completed_job(&ledger).await;
    let err = ledger.settlement.settle(&Actor::Shop(OTHER_SHOP.into()), SHOP).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)), "{err:?}");
    let err = ledger.settlement.settle(&Actor::Requester(ALICE.into()), SHOP).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)), "{err:?}");
    let err = ledger.settlement.unsettled_balances(&Actor::Requester(ALICE.into())).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)), "{err:?}");
    let err = ledger.settlement.earnings_for_shop(&Actor::Shop(OTHER_SHOP.into()), SHOP).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)), "{err:?}");
    assert_eq!(ledger.db.fetch_unsettled_balances(Some(SHOP)).await.unwrap()[0].count, 1);
    ledger.tear_down().await;
}

#[tokio::test]
async fn unsettled_balances_per_shop() {
    let ledger = TestLedger::new().await;
    let shop = Actor::Shop(SHOP.into());
    let other = Actor::Shop(OTHER_SHOP.into());
    let admin = Actor::Admin("root".into());
    assert!(ledger.settlement.unsettled_balances(&admin).await.unwrap().is_empty());

    completed_job(&ledger).await;
    completed_job(&ledger).await;
    let own = ledger.settlement.unsettled_balances(&shop).await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].shop_id, SHOP);
    assert_eq!(own[0].total_net, MinorUnits::from(46));
    assert_eq!(own[0].count, 2);
    assert!(ledger.settlement.unsettled_balances(&other).await.unwrap().is_empty());
    assert_eq!(ledger.settlement.unsettled_balances(&admin).await.unwrap(), own);

    ledger.settlement.settle(&shop, SHOP).await.unwrap();
    assert!(ledger.settlement.unsettled_balances(&admin).await.unwrap().is_empty());
    ledger.tear_down().await;
}

#[tokio::test]
async fn earnings_summary_tracks_settled_and_pending() {
    let ledger = TestLedger::new().await;
    let shop = Actor::Shop(SHOP.into());
    let empty = ledger.settlement.earnings_summary(&shop, SHOP).await.unwrap();
    assert_eq!(empty, EarningsSummary::default());

    completed_job(&ledger).await;
    ledger.settlement.settle(&shop, SHOP).await.unwrap();
    completed_job(&ledger).await;
    let summary = ledger.settlement.earnings_summary(&shop, SHOP).await.unwrap();
    assert_eq!(summary.total_gross, MinorUnits::from(50));
    assert_eq!(summary.total_platform_fee, MinorUnits::from(4));
    assert_eq!(summary.total_net, MinorUnits::from(46));
    assert_eq!(summary.total_settled, MinorUnits::from(23));
    assert_eq!(summary.pending_settlement, MinorUnits::from(23));
    assert_eq!(ledger.settlement.earnings_for_shop(&shop, SHOP).await.unwrap().len(), 2);
    ledger.tear_down().await;
}

#[tokio::test]
async fn settled_earnings_cannot_change() {
    let ledger = TestLedger::new().await;
    let earning = completed_job(&ledger).await;
    ledger.settlement.settle(&Actor::Shop(SHOP.into()), SHOP).await.unwrap();
    let result = sqlx::query("UPDATE earnings SET settlement_ref = 'tampered' WHERE id = $1")
        .bind(earning.id)
        .execute(ledger.db.pool())
        .await;
    assert!(result.is_err());
    let result = sqlx::query("DELETE FROM earnings WHERE id = $1").bind(earning.id).execute(ledger.db.pool()).await;
    assert!(result.is_err());
    let stored = ledger.db.fetch_earning_for_job(earning.job_id).await.unwrap().unwrap();
    assert!(stored.settlement_ref.unwrap().starts_with("SETTLE_"));
    ledger.tear_down().await;
}
