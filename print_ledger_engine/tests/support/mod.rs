#![allow(dead_code)]
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use log::*;
use print_ledger_engine::{
    db_types::{Actor, ColorMode, Job, MinorUnits, NewShop, PaperSize, Payment, PaymentMethod},
    events::EventProducers,
    helpers::{Clock, ManualClock},
    job_objects::{CreatePaymentRequest, SetPriceRequest, SubmitJobRequest},
    pricing::{FeePolicy, PricingPolicy},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{ArtifactStore, ArtifactStoreError},
    JobFlowApi,
    LedgerDatabase,
    PaymentApi,
    PickupApi,
    SettlementApi,
    ShopApi,
    SqliteDatabase,
};
use pl_common::Secret;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const SHOP: &str = "shop-1";
pub const OTHER_SHOP: &str = "shop-2";
pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";

/// Remembers every artifact it was asked to release.
#[derive(Debug, Clone, Default)]
pub struct RecordingArtifactStore {
    released: Arc<Mutex<Vec<String>>>,
}

impl RecordingArtifactStore {
    pub fn released(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }
}

impl ArtifactStore for RecordingArtifactStore {
    async fn release(&self, artifact_ref: &str) -> Result<(), ArtifactStoreError> {
        self.released.lock().unwrap().push(artifact_ref.to_string());
        Ok(())
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
}

/// Two copies, colour, large: the minimum price is 2 × 5 × 2 = 20 with the test rates.
pub fn test_pricing() -> PricingPolicy {
    PricingPolicy::new(MinorUnits::from(2), MinorUnits::from(5), 2)
}

#[derive(Debug)]
pub struct TestLedger {
    pub url: String,
    pub db: SqliteDatabase,
    pub clock: ManualClock,
    pub artifacts: RecordingArtifactStore,
    pub jobs: JobFlowApi<SqliteDatabase, RecordingArtifactStore>,
    pub payments: PaymentApi<SqliteDatabase>,
    pub pickup: PickupApi<SqliteDatabase>,
    pub settlement: SettlementApi<SqliteDatabase>,
    pub shops: ShopApi<SqliteDatabase>,
}

impl TestLedger {
    pub async fn new() -> Self {
        Self::with_producers(EventProducers::default()).await
    }

    pub async fn with_producers(producers: EventProducers) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let clock = ManualClock::new(start_time());
        let artifacts = RecordingArtifactStore::default();
        let jobs = JobFlowApi::new(db.clone(), artifacts.clone(), test_pricing(), producers.clone())
            .with_clock(Arc::new(clock.clone()));
        let payments =
            PaymentApi::new(db.clone(), Secret::new(WEBHOOK_SECRET.to_string())).with_clock(Arc::new(clock.clone()));
        let pickup = PickupApi::new(db.clone(), FeePolicy::default(), Duration::minutes(5), producers.clone())
            .with_clock(Arc::new(clock.clone()));
        let settlement = SettlementApi::new(db.clone(), producers).with_clock(Arc::new(clock.clone()));
        let shops = ShopApi::new(db.clone()).with_clock(Arc::new(clock.clone()));
        let ledger = Self { url, db, clock, artifacts, jobs, payments, pickup, settlement, shops };
        ledger.register_shop(SHOP).await;
        ledger.register_shop(OTHER_SHOP).await;
        ledger
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn register_shop(&self, shop_id: &str) {
        let admin = Actor::Admin("root".into());
        self.shops.register_shop(&admin, NewShop::new(shop_id, format!("Print shop {shop_id}"))).await.unwrap();
    }

    /// A `PENDING`, unpriced job from alice to the test shop.
    pub async fn submit(&self) -> Job {
        let request = SubmitJobRequest::new(SHOP, 2, ColorMode::Color, PaperSize::Large).with_artifact("uploads/doc.pdf");
        self.jobs.submit_job(ALICE, request).await.unwrap()
    }

    /// A `PENDING` job priced at 25 with the price accepted.
    pub async fn accepted_job(&self) -> Job {
        let job = self.submit().await;
        self.jobs.set_price(SHOP, SetPriceRequest::new(job.id, 25)).await.unwrap();
        self.jobs.accept_price(ALICE, job.id).await.unwrap()
    }

    pub async fn pay(&self, job_id: i64, method: PaymentMethod) -> Payment {
        let request = CreatePaymentRequest::new(job_id, method, format!("pay-{job_id}"));
        let payment = self.payments.create_payment(ALICE, request).await.unwrap().into_payment();
        match method {
            PaymentMethod::Offline => self.payments.confirm_offline_payment(SHOP, job_id).await.unwrap(),
            PaymentMethod::Online => self.payments.confirm_mock_payment(ALICE, payment.job_id).await.unwrap(),
        }
    }

    /// A `READY` job whose payment is `PAID`.
    pub async fn ready_paid_job(&self, method: PaymentMethod) -> Job {
        let job = self.accepted_job().await;
        self.pay(job.id, method).await;
        self.jobs.mark_ready(SHOP, job.id).await.unwrap()
    }

    pub async fn tear_down(mut self) {
        if let Err(e) = self.db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        if let Err(e) = Sqlite::drop_database(&self.url).await {
            warn!("🚀️ Could not remove test database {}: {e}", self.url);
        }
    }
}
