use cucumber::World;
use print_ledger_engine::{traits::SettlementResult, LedgerError};

use crate::support::TestLedger;

#[derive(Default, Debug, World)]
pub struct LedgerWorld {
    pub system: Option<TestLedger>,
    pub job_id: Option<i64>,
    pub last_error: Option<LedgerError>,
    pub settlement: Option<SettlementResult>,
}

impl LedgerWorld {
    pub fn ledger(&self) -> &TestLedger {
        self.system.as_ref().expect("Ledger not initialised")
    }

    pub fn job_id(&self) -> i64 {
        self.job_id.expect("No job has been created in this scenario")
    }

    /// Remembers the error of a failed request, so that a later step can check it.
    pub fn record<T>(&mut self, result: Result<T, LedgerError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Some(value)
            },
            Err(e) => {
                self.last_error = Some(e);
                None
            },
        }
    }
}

pub fn error_name(err: &LedgerError) -> &'static str {
    match err {
        LedgerError::DatabaseError(_) => "DatabaseError",
        LedgerError::NotFound(_) => "NotFound",
        LedgerError::InvalidState(_) => "InvalidState",
        LedgerError::ValidationError(_) => "ValidationError",
        LedgerError::PriceTooLow { .. } => "PriceTooLow",
        LedgerError::PriceNotAccepted(_) => "PriceNotAccepted",
        LedgerError::PaymentIncomplete(_) => "PaymentIncomplete",
        LedgerError::NotReady(_) => "NotReady",
        LedgerError::CodeNotFound(_) => "CodeNotFound",
        LedgerError::CodeMismatch => "CodeMismatch",
        LedgerError::CodeExpired => "CodeExpired",
        LedgerError::CodeAlreadyIssued(_) => "CodeAlreadyIssued",
        LedgerError::AlreadyTerminal(_) => "AlreadyTerminal",
        LedgerError::PickupInProgress(_) => "PickupInProgress",
        LedgerError::NothingToSettle(_) => "NothingToSettle",
        LedgerError::Unauthenticated => "Unauthenticated",
    }
}
