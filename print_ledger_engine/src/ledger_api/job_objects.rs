//! Request types for the ledger APIs. Each request is validated once, at the API boundary, before anything touches
//! the store.
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{ColorMode, JobStatus, MinorUnits, NewJob, PaperSize, PaymentMethod},
    helpers::is_valid_pickup_code,
    traits::LedgerError,
};

/// Longest idempotency key we store.
pub const MAX_IDEMPOTENCY_KEY_LENGTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitJobRequest {
    pub shop_id: String,
    pub copies: i64,
    pub color_mode: ColorMode,
    pub paper_size: PaperSize,
    /// Reference to the uploaded document in the file store
    pub artifact_ref: Option<String>,
}

impl SubmitJobRequest {
    pub fn new<S: Into<String>>(shop_id: S, copies: i64, color_mode: ColorMode, paper_size: PaperSize) -> Self {
        Self { shop_id: shop_id.into(), copies, color_mode, paper_size, artifact_ref: None }
    }

    pub fn with_artifact<S: Into<String>>(mut self, artifact_ref: S) -> Self {
        self.artifact_ref = Some(artifact_ref.into());
        self
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.copies <= 0 {
            return Err(LedgerError::ValidationError(format!("Copy count must be positive, not {}", self.copies)));
        }
        if self.shop_id.trim().is_empty() {
            return Err(LedgerError::ValidationError("A shop id is required".into()));
        }
        if matches!(&self.artifact_ref, Some(r) if r.trim().is_empty()) {
            return Err(LedgerError::ValidationError("The artifact reference cannot be blank".into()));
        }
        Ok(())
    }

    pub fn into_new_job(self, requester_id: &str) -> NewJob {
        NewJob {
            requester_id: requester_id.to_string(),
            shop_id: self.shop_id,
            copies: self.copies,
            color_mode: self.color_mode,
            paper_size: self.paper_size,
            artifact_ref: self.artifact_ref,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPriceRequest {
    pub job_id: i64,
    pub price: MinorUnits,
}

impl SetPriceRequest {
    pub fn new(job_id: i64, price: i64) -> Self {
        Self { job_id, price: MinorUnits::from(price) }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.price.is_negative() {
            return Err(LedgerError::ValidationError(format!("Price cannot be negative ({})", self.price)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub job_id: i64,
    pub method: PaymentMethod,
    /// Caller-supplied key that makes retries safe. The same key always yields the same payment.
    pub idempotency_key: String,
}

impl CreatePaymentRequest {
    pub fn new<S: Into<String>>(job_id: i64, method: PaymentMethod, idempotency_key: S) -> Self {
        Self { job_id, method, idempotency_key: idempotency_key.into() }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        let key = self.idempotency_key.trim();
        if key.is_empty() {
            return Err(LedgerError::ValidationError("An idempotency key is required".into()));
        }
        if key.len() != self.idempotency_key.len() {
            return Err(LedgerError::ValidationError("The idempotency key has leading or trailing whitespace".into()));
        }
        if key.len() > MAX_IDEMPOTENCY_KEY_LENGTH {
            return Err(LedgerError::ValidationError(format!(
                "The idempotency key is longer than {MAX_IDEMPOTENCY_KEY_LENGTH} bytes"
            )));
        }
        Ok(())
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyPickupRequest {
    pub job_id: i64,
    pub code: String,
}

impl std::fmt::Debug for VerifyPickupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VerifyPickupRequest(job #{})", self.job_id)
    }
}

impl VerifyPickupRequest {
    pub fn new<S: Into<String>>(job_id: i64, code: S) -> Self {
        Self { job_id, code: code.into() }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if is_valid_pickup_code(&self.code) {
            Ok(())
        } else {
            Err(LedgerError::ValidationError("Pickup codes are exactly six digits".into()))
        }
    }
}

/// The outcome the payment gateway reports for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayOutcome {
    Success { gateway_payment_id: String },
    Failure { reason: String },
}

/// The outcome the payment gateway reports for a refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundOutcome {
    Success,
    Failure { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobQueryFilter {
    pub requester_id: Option<String>,
    pub shop_id: Option<String>,
    pub statuses: Vec<JobStatus>,
}

impl JobQueryFilter {
    pub fn with_requester_id<S: Into<String>>(mut self, requester_id: S) -> Self {
        self.requester_id = Some(requester_id.into());
        self
    }

    pub fn with_shop_id<S: Into<String>>(mut self, shop_id: S) -> Self {
        self.shop_id = Some(shop_id.into());
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.requester_id.is_none() && self.shop_id.is_none() && self.statuses.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn submit_validation() {
        let ok = SubmitJobRequest::new("shop-1", 2, ColorMode::Color, PaperSize::Large).with_artifact("uploads/a.pdf");
        assert!(ok.validate().is_ok());
        let zero = SubmitJobRequest::new("shop-1", 0, ColorMode::Color, PaperSize::Large);
        assert!(matches!(zero.validate(), Err(LedgerError::ValidationError(_))));
        let no_shop = SubmitJobRequest::new(" ", 1, ColorMode::Monochrome, PaperSize::Standard);
        assert!(matches!(no_shop.validate(), Err(LedgerError::ValidationError(_))));
        let job = ok.into_new_job("alice");
        assert_eq!(job.requester_id, "alice");
        assert_eq!(job.artifact_ref.as_deref(), Some("uploads/a.pdf"));
    }

    #[test]
    fn idempotency_keys() {
        assert!(CreatePaymentRequest::new(1, PaymentMethod::Online, "abc-123").validate().is_ok());
        assert!(CreatePaymentRequest::new(1, PaymentMethod::Online, "").validate().is_err());
        assert!(CreatePaymentRequest::new(1, PaymentMethod::Online, "   ").validate().is_err());
        assert!(CreatePaymentRequest::new(1, PaymentMethod::Online, " abc").validate().is_err());
        assert!(CreatePaymentRequest::new(1, PaymentMethod::Online, "k".repeat(129)).validate().is_err());
    }

    #[test]
    fn prices_and_codes() {
        assert!(SetPriceRequest::new(1, 0).validate().is_ok());
        assert!(SetPriceRequest::new(1, -1).validate().is_err());
        assert!(VerifyPickupRequest::new(1, "123456").validate().is_ok());
        assert!(VerifyPickupRequest::new(1, "12 456").validate().is_err());
        assert!(!format!("{:?}", VerifyPickupRequest::new(1, "123456")).contains("123456"));
    }

    #[test]
    fn query_filter() {
        assert!(JobQueryFilter::default().is_empty());
        let filter = JobQueryFilter::default().with_shop_id("shop-1").with_status(JobStatus::Ready);
        assert!(!filter.is_empty());
        assert_eq!(filter.statuses, vec![JobStatus::Ready]);
    }
}
