//! # Print ledger public API
//!
//! The `ledger_api` module exposes the programmatic API of the print ledger. It is split by concern, so clients can
//! pick the parts they need.
//!
//! * [`job_flow_api`] drives a job from submission through pricing to `READY`, handles cancellation and releases
//!   uploaded documents.
//! * [`payment_api`] creates payments idempotently, confirms them and handles the payment gateway's webhooks.
//! * [`pickup_api`] issues and verifies the one-time pickup codes that complete a job and book the shop's earning.
//! * [`settlement_api`] reports unsettled balances and settles a shop's earnings in one batch.
//! * [`shop_api`] maintains the shop directory that job submission validates against.
//!
//! [`job_objects`] holds the request types. Each is validated once, when the API receives it.
//!
//! # API usage
//!
//! Every API is created from a storage backend and the event producers it should publish to. Timestamps come from
//! the system clock unless another [`Clock`](crate::helpers::Clock) is supplied with `with_clock`.
//!
//! ```rust,ignore
//! use print_ledger_engine::{events::EventProducers, PickupApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/print_ledger.db", 5).await?;
//! let api = PickupApi::new(db, config.fees, config.pickup_code_ttl, EventProducers::default());
//! let completed = api.verify_pickup_code("shop-1", VerifyPickupRequest::new(job_id, "482913")).await?;
//! ```
pub mod job_flow_api;
pub mod job_objects;
pub mod payment_api;
pub mod pickup_api;
pub mod settlement_api;
pub mod shop_api;
