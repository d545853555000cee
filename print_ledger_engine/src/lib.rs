//! Print Ledger Engine
//!
//! The print ledger brokers print jobs between requesters and print shops. A requester submits a document, the shop
//! quotes a price, the requester accepts and pays, the shop prints the job and the requester collects it with a
//! one-time pickup code. The platform keeps a fee and periodically settles the remaining earnings to each shop.
//!
//! The library is divided into the following sections:
//! 1. Storage ([`mod@traits`] and [`mod@sqlite`]). The traits define the atomic operations a backend must provide,
//!    and `SqliteDatabase` implements them. You should never need to call the backend directly. The exception is the
//!    data types in [`mod@db_types`], which are public.
//! 2. The public API ([`mod@ledger_api`]). `JobFlowApi`, `PaymentApi`, `PickupApi`, `SettlementApi` and `ShopApi`
//!    check ownership, apply pricing and fee policies, and publish events.
//! 3. Policies and rules: [`mod@pricing`] for minimum prices and platform fees, [`mod@guards`] for the business rules
//!    that every mutation is checked against.
//!
//! The engine publishes events when a pickup code is issued, a job is completed or cancelled, and when a shop is
//! settled. See [`mod@events`] for how to subscribe to them.
pub mod config;
pub mod db_types;
pub mod events;
pub mod guards;
pub mod helpers;
pub mod ledger_api;
pub mod pricing;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use config::{ConfigError, LedgerConfig};
pub use ledger_api::{
    job_flow_api::JobFlowApi,
    job_objects,
    payment_api::PaymentApi,
    pickup_api::{IssuedPickupCode, PickupApi},
    settlement_api::SettlementApi,
    shop_api::ShopApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{ArtifactStore, LedgerDatabase, LedgerError, LedgerQueries, NoopArtifactStore};
