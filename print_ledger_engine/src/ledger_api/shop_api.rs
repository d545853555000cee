use std::{fmt::Debug, sync::Arc};

use log::*;

use crate::{
    db_types::{Actor, NewShop, Shop},
    helpers::{Clock, SystemClock},
    traits::{LedgerDatabase, LedgerError},
};

/// `ShopApi` maintains the directory of shops that jobs can be submitted to. Only administrators change it.
pub struct ShopApi<B> {
    db: B,
    clock: Arc<dyn Clock>,
}

impl<B> Debug for ShopApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ShopApi")
    }
}

impl<B> ShopApi<B> {
    pub fn new(db: B) -> Self {
        Self { db, clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Non-administrators get the same `NotFound` as for any other record they may not touch.
fn ensure_admin(actor: &Actor, shop_id: &str) -> Result<(), LedgerError> {
    if actor.is_privileged() {
        Ok(())
    } else {
        debug!("🔄️🏪️ {actor} may not change shop {shop_id}");
        Err(LedgerError::shop_not_found(shop_id))
    }
}

impl<B> ShopApi<B>
where B: LedgerDatabase
{
    pub async fn register_shop(&self, actor: &Actor, shop: NewShop) -> Result<Shop, LedgerError> {
        ensure_admin(actor, &shop.id)?;
        if shop.id.trim().is_empty() || shop.name.trim().is_empty() {
            return Err(LedgerError::ValidationError("A shop needs an id and a name".into()));
        }
        let shop = self.db.insert_shop(shop, actor, self.clock.now()).await?;
        info!("🔄️🏪️ Shop {} ({}) registered by {actor}", shop.id, shop.name);
        Ok(shop)
    }

    /// Opens or closes a shop for new jobs. Jobs already submitted are unaffected.
    pub async fn set_shop_active(&self, actor: &Actor, shop_id: &str, active: bool) -> Result<Shop, LedgerError> {
        ensure_admin(actor, shop_id)?;
        let shop = self.db.set_shop_active(shop_id, active, actor, self.clock.now()).await?;
        info!("🔄️🏪️ Shop {shop_id} {} by {actor}", if active { "activated" } else { "deactivated" });
        Ok(shop)
    }

    pub async fn shop(&self, shop_id: &str) -> Result<Shop, LedgerError> {
        self.db.fetch_shop(shop_id).await?.ok_or_else(|| LedgerError::shop_not_found(shop_id))
    }
}
