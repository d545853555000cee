//! # Ledger storage contracts
//!
//! This module defines the interfaces that a storage *backend* must provide to host the print ledger, as well as the
//! other external collaborators the engine talks to.
//!
//! * [`LedgerDatabase`] defines every state-changing operation. Each method is one atomic transaction that also writes
//!   the corresponding audit log entries.
//! * [`LedgerQueries`] provides read-only access to jobs, payments, pickup codes, earnings and the audit log.
//! * [`ArtifactStore`] releases uploaded documents from the file store once a job no longer needs them.
mod artifact_store;
mod data_objects;
mod ledger_database;
mod ledger_queries;

pub use artifact_store::{ArtifactStore, ArtifactStoreError, NoopArtifactStore};
pub use data_objects::{
    CancelledJob,
    CompletedPickup,
    EarningsSummary,
    InsertPaymentResult,
    PaymentChange,
    PickupVerification,
    ReleasedArtifact,
    SettlementResult,
    UnsettledBalance,
};
pub use ledger_database::{LedgerDatabase, LedgerError};
pub use ledger_queries::LedgerQueries;
