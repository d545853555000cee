//! Value types shared by the print ledger crates.
//!
//! * [`MinorUnits`] is the money type. All amounts are integers in the smallest unit of the currency; there is no
//!   floating point money anywhere in the ledger.
//! * [`Secret`] wraps configuration values that must never end up in a log line.
pub mod helpers;
mod minor_units;
pub mod op;
mod secret;

pub use minor_units::{MinorUnits, MinorUnitsConversionError, CURRENCY_CODE};
pub use secret::Secret;
