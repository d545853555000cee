use std::{fmt::Debug, sync::Arc};

use log::*;

use crate::{
    db_types::{Actor, Earning},
    events::{publish, EventProducers, SettlementEvent},
    helpers::{new_settlement_ref, Clock, SystemClock},
    traits::{EarningsSummary, LedgerDatabase, LedgerError, SettlementResult, UnsettledBalance},
};

/// `SettlementApi` reports what the platform owes each shop and pays it out in batches.
///
/// Shops may only look at and settle their own earnings. Administrators and system processes act on any shop.
pub struct SettlementApi<B> {
    db: B,
    producers: EventProducers,
    clock: Arc<dyn Clock>,
}

impl<B> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi")
    }
}

impl<B> SettlementApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

/// Requesters have no earnings, and shops only see their own.
fn ensure_may_view(actor: &Actor, shop_id: &str) -> Result<(), LedgerError> {
    match actor {
        Actor::Shop(id) if id == shop_id => Ok(()),
        Actor::Admin(_) | Actor::System(_) => Ok(()),
        _ => Err(LedgerError::shop_not_found(shop_id)),
    }
}

impl<B> SettlementApi<B>
where B: LedgerDatabase
{
    /// Net unsettled earnings per shop. A shop sees its own balance; administrators see every shop with something
    /// outstanding.
    pub async fn unsettled_balances(&self, actor: &Actor) -> Result<Vec<UnsettledBalance>, LedgerError> {
        match actor {
            Actor::Shop(id) => self.db.fetch_unsettled_balances(Some(id)).await,
            Actor::Admin(_) | Actor::System(_) => self.db.fetch_unsettled_balances(None).await,
            Actor::Requester(_) => Err(LedgerError::NotFound("Unsettled balances".into())),
        }
    }

    /// Settles every unsettled earning of the shop under a fresh settlement reference.
    pub async fn settle(&self, actor: &Actor, shop_id: &str) -> Result<SettlementResult, LedgerError> {
        ensure_may_view(actor, shop_id)?;
        let now = self.clock.now();
        let settlement_ref = new_settlement_ref(now, &mut rand::thread_rng());
        let settlement = match self.db.settle_earnings(shop_id, &settlement_ref, actor, now).await {
            Ok(s) => s,
            Err(LedgerError::NothingToSettle(id)) => {
                debug!("🔄️🏦️ Shop {id} has nothing to settle");
                return Err(LedgerError::NothingToSettle(id));
            },
            Err(e) => return Err(e),
        };
        info!(
            "🔄️🏦️ Settled {} earnings of shop {shop_id} under {}. Payout {}",
            settlement.count, settlement.settlement_ref, settlement.total_payout
        );
        publish(&self.producers.settlement_producer, SettlementEvent { settlement: settlement.clone() }).await;
        Ok(settlement)
    }

    /// The shop's earnings ledger, newest first.
    pub async fn earnings_for_shop(&self, actor: &Actor, shop_id: &str) -> Result<Vec<Earning>, LedgerError> {
        ensure_may_view(actor, shop_id)?;
        self.db.fetch_earnings_for_shop(shop_id).await
    }

    pub async fn earnings_summary(&self, actor: &Actor, shop_id: &str) -> Result<EarningsSummary, LedgerError> {
        ensure_may_view(actor, shop_id)?;
        self.db.fetch_earnings_summary(shop_id).await
    }
}
