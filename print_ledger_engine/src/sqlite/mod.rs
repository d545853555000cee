//! SQLite backend for the print ledger.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
