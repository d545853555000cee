use cucumber::given;
use print_ledger_engine::db_types::PaymentMethod;

use crate::{cucumber::LedgerWorld, support::TestLedger};

#[given("a fresh ledger")]
async fn fresh_database(world: &mut LedgerWorld) {
    world.system = Some(TestLedger::new().await);
}

#[given(expr = "a READY job paid {word}")]
async fn ready_paid_job(world: &mut LedgerWorld, method: String) {
    let method = method.parse::<PaymentMethod>().expect("Not a payment method");
    let job = world.ledger().ready_paid_job(method).await;
    world.job_id = Some(job.id);
}

#[given("alice has a job priced at 25 with an accepted price")]
async fn accepted_job(world: &mut LedgerWorld) {
    let job = world.ledger().accepted_job().await;
    world.job_id = Some(job.id);
}
