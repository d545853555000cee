//! Data types shared by the ledger store, the public APIs and the event hooks.
//!
//! Jobs, payments, pickup codes and earnings each carry their own status enum. The transitions between states are
//! described by static tables in this module so that the rules can be checked without touching the database.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
pub use pl_common::MinorUnits;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

/// Declares a unit enum that is stored as `TEXT` in the database and serialized with the same upper case names.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
        #[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    s => Err(ConversionError(format!("Invalid {}: {s}", stringify!($name)))),
                }
            }
        }
    };
}

//--------------------------------------      JobStatus        ---------------------------------------------------------
text_enum! {
    JobStatus {
        /// Submitted, possibly priced and accepted, but not yet printed.
        Pending => "PENDING",
        /// Printed and waiting for the requester to collect it.
        Ready => "READY",
        /// Collected by the requester against a valid pickup code.
        Completed => "COMPLETED",
        /// Cancelled by the requester before pickup.
        Cancelled => "CANCELLED",
    }
}

/// Status changes a shop may request. This is the only source of truth for `mark_ready` and `update_status`.
/// Completion is only reachable through pickup verification and cancellation only through the requester.
const SHOP_TRANSITIONS: [(JobStatus, Option<JobStatus>); 4] = [
    (JobStatus::Pending, Some(JobStatus::Ready)),
    (JobStatus::Ready, None),
    (JobStatus::Completed, None),
    (JobStatus::Cancelled, None),
];

impl JobStatus {
    /// The single status a shop may move a job to from `self`, if any.
    pub fn allowed_next(self) -> Option<JobStatus> {
        SHOP_TRANSITIONS.iter().find(|(from, _)| *from == self).and_then(|(_, to)| *to)
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        self.allowed_next() == Some(next)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }
}

//--------------------------------------      ColorMode        ---------------------------------------------------------
text_enum! {
    ColorMode {
        Monochrome => "MONOCHROME",
        Color => "COLOR",
    }
}

//--------------------------------------      PaperSize        ---------------------------------------------------------
text_enum! {
    PaperSize {
        /// A4 or equivalent
        Standard => "STANDARD",
        /// A3 or equivalent
        Large => "LARGE",
    }
}

//--------------------------------------    PaymentMethod      ---------------------------------------------------------
text_enum! {
    PaymentMethod {
        /// Paid through the payment gateway.
        Online => "ONLINE",
        /// Paid at the counter and confirmed by the shop.
        Offline => "OFFLINE",
    }
}

//--------------------------------------    PaymentStatus      ---------------------------------------------------------
text_enum! {
    PaymentStatus {
        Initiated => "INITIATED",
        Paid => "PAID",
        Failed => "FAILED",
        Cancelled => "CANCELLED",
        RefundPending => "REFUND_PENDING",
        Refunded => "REFUNDED",
    }
}

/// Every legal payment status change, as `(method, from, to)`. A `None` method applies to both methods.
const PAYMENT_TRANSITIONS: [(Option<PaymentMethod>, PaymentStatus, PaymentStatus); 6] = [
    (None, PaymentStatus::Initiated, PaymentStatus::Paid),
    (None, PaymentStatus::Initiated, PaymentStatus::Cancelled),
    (Some(PaymentMethod::Online), PaymentStatus::Initiated, PaymentStatus::Failed),
    (Some(PaymentMethod::Online), PaymentStatus::Paid, PaymentStatus::RefundPending),
    (Some(PaymentMethod::Online), PaymentStatus::RefundPending, PaymentStatus::Refunded),
    (Some(PaymentMethod::Offline), PaymentStatus::Paid, PaymentStatus::Cancelled),
];

/// What happens to a job's payment when the job is cancelled, as `(method, current, next)`.
/// Combinations that are not listed leave the payment untouched.
const CANCELLATION_RULES: [(PaymentMethod, PaymentStatus, PaymentStatus); 4] = [
    (PaymentMethod::Online, PaymentStatus::Paid, PaymentStatus::RefundPending),
    (PaymentMethod::Online, PaymentStatus::Initiated, PaymentStatus::Cancelled),
    (PaymentMethod::Offline, PaymentStatus::Initiated, PaymentStatus::Cancelled),
    (PaymentMethod::Offline, PaymentStatus::Paid, PaymentStatus::Cancelled),
];

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Cancelled | PaymentStatus::Refunded)
    }

    pub fn can_transition(method: PaymentMethod, from: PaymentStatus, to: PaymentStatus) -> bool {
        PAYMENT_TRANSITIONS.iter().any(|(m, f, t)| m.map_or(true, |m| m == method) && *f == from && *t == to)
    }

    /// The status a payment moves to when its job is cancelled, or `None` if it stays as it is.
    pub fn on_job_cancelled(method: PaymentMethod, current: PaymentStatus) -> Option<PaymentStatus> {
        CANCELLATION_RULES.iter().find(|(m, c, _)| *m == method && *c == current).map(|(_, _, next)| *next)
    }
}

//--------------------------------------      EntityType       ---------------------------------------------------------
text_enum! {
    EntityType {
        Job => "JOB",
        Payment => "PAYMENT",
        PickupCode => "PICKUP_CODE",
        Earning => "EARNING",
        Shop => "SHOP",
    }
}

//--------------------------------------      ActorType        ---------------------------------------------------------
text_enum! {
    ActorType {
        Requester => "REQUESTER",
        Shop => "SHOP",
        Admin => "ADMIN",
        System => "SYSTEM",
    }
}

//--------------------------------------        Actor          ---------------------------------------------------------
/// The authenticated party on whose behalf an operation runs. Identity verification happens upstream; the engine
/// only uses the actor for ownership checks and the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    Requester(String),
    Shop(String),
    Admin(String),
    System(String),
}

impl Actor {
    pub fn actor_type(&self) -> ActorType {
        match self {
            Actor::Requester(_) => ActorType::Requester,
            Actor::Shop(_) => ActorType::Shop,
            Actor::Admin(_) => ActorType::Admin,
            Actor::System(_) => ActorType::System,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Actor::Requester(id) | Actor::Shop(id) | Actor::Admin(id) | Actor::System(id) => id,
        }
    }

    /// Administrators and internal processes act on any record.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Actor::Admin(_) | Actor::System(_))
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.actor_type(), self.id())
    }
}

//--------------------------------------         Shop          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Shop {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShop {
    pub id: String,
    pub name: String,
}

impl NewShop {
    pub fn new<S1: Into<String>, S2: Into<String>>(id: S1, name: S2) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

//--------------------------------------         Job           ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub requester_id: String,
    pub shop_id: String,
    pub copies: i64,
    pub color_mode: ColorMode,
    pub paper_size: PaperSize,
    pub status: JobStatus,
    pub price: Option<MinorUnits>,
    pub priced_at: Option<DateTime<Utc>>,
    pub price_accepted: bool,
    pub price_accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub artifact_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn is_owned_by_requester(&self, requester_id: &str) -> bool {
        self.requester_id == requester_id
    }

    pub fn is_owned_by_shop(&self, shop_id: &str) -> bool {
        self.shop_id == shop_id
    }

    /// Requesters see their own jobs, shops see the jobs sent to them and privileged actors see everything.
    pub fn is_visible_to(&self, actor: &Actor) -> bool {
        match actor {
            Actor::Requester(id) => self.is_owned_by_requester(id),
            Actor::Shop(id) => self.is_owned_by_shop(id),
            Actor::Admin(_) | Actor::System(_) => true,
        }
    }

    /// The price has been quoted and the requester has agreed to it.
    pub fn has_agreed_price(&self) -> bool {
        self.price.is_some() && self.price_accepted
    }
}

//--------------------------------------        NewJob         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub requester_id: String,
    pub shop_id: String,
    pub copies: i64,
    pub color_mode: ColorMode,
    pub paper_size: PaperSize,
    pub artifact_ref: Option<String>,
}

//--------------------------------------       Payment         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub job_id: i64,
    pub amount: MinorUnits,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub idempotency_key: String,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub vendor_confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }
}

//--------------------------------------      NewPayment       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub job_id: i64,
    pub requester_id: String,
    pub method: PaymentMethod,
    pub idempotency_key: String,
}

//--------------------------------------  PaymentTransition    ---------------------------------------------------------
/// A requested change to a payment record. Each variant maps to exactly one row of the payment transition table,
/// apart from `RefundFailed`, which only records a reason and leaves the status where it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentTransition {
    /// A shop confirms that cash was received for an offline payment.
    ConfirmOffline,
    /// The test gateway reports success on behalf of the requester.
    ConfirmMock,
    /// The payment gateway reports a captured payment.
    GatewayPaid { gateway_payment_id: String },
    /// The payment gateway reports a failed payment.
    GatewayFailed { reason: String },
    /// The refund of a cancelled job's payment went through.
    Refunded,
    /// The refund attempt failed. Nothing is retried automatically.
    RefundFailed { reason: String },
}

impl PaymentTransition {
    pub fn from_status(&self) -> PaymentStatus {
        match self {
            Self::ConfirmOffline | Self::ConfirmMock | Self::GatewayPaid { .. } | Self::GatewayFailed { .. } => {
                PaymentStatus::Initiated
            },
            Self::Refunded | Self::RefundFailed { .. } => PaymentStatus::RefundPending,
        }
    }

    pub fn to_status(&self) -> PaymentStatus {
        match self {
            Self::ConfirmOffline | Self::ConfirmMock | Self::GatewayPaid { .. } => PaymentStatus::Paid,
            Self::GatewayFailed { .. } => PaymentStatus::Failed,
            Self::Refunded => PaymentStatus::Refunded,
            Self::RefundFailed { .. } => PaymentStatus::RefundPending,
        }
    }

    /// The payment method this transition applies to.
    pub fn method(&self) -> PaymentMethod {
        match self {
            Self::ConfirmOffline => PaymentMethod::Offline,
            _ => PaymentMethod::Online,
        }
    }

    /// Whether a payment in its current state can take this transition.
    pub fn applies_to(&self, payment: &Payment) -> bool {
        if payment.method != self.method() || payment.status != self.from_status() {
            return false;
        }
        match self {
            Self::RefundFailed { .. } => true,
            _ => PaymentStatus::can_transition(payment.method, payment.status, self.to_status()),
        }
    }

    /// The audit action recorded when this transition is applied.
    pub fn action(&self) -> &'static str {
        match self {
            Self::ConfirmOffline => "OFFLINE_CONFIRMED",
            Self::ConfirmMock => "MOCK_CONFIRMED",
            Self::GatewayPaid { .. } => "PAID",
            Self::GatewayFailed { .. } => "FAILED",
            Self::Refunded => "REFUNDED",
            Self::RefundFailed { .. } => "REFUND_FAILED",
        }
    }
}

//--------------------------------------      PickupCode       ---------------------------------------------------------
#[derive(Clone, PartialEq, Eq, FromRow)]
pub struct PickupCode {
    pub id: i64,
    pub job_id: i64,
    pub requester_id: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for PickupCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickupCode")
            .field("id", &self.id)
            .field("job_id", &self.job_id)
            .field("requester_id", &self.requester_id)
            .field("code", &"******")
            .field("expires_at", &self.expires_at)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl PickupCode {
    /// A code is expired from the instant `now` reaches its expiry timestamp.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct NewPickupCode {
    pub job_id: i64,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl NewPickupCode {
    pub fn new(job_id: i64, code: String, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self { job_id, code, expires_at: issued_at + ttl }
    }
}

impl std::fmt::Debug for NewPickupCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NewPickupCode(job #{}, expires {})", self.job_id, self.expires_at)
    }
}

//--------------------------------------       Earning         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Earning {
    pub id: i64,
    pub shop_id: String,
    pub job_id: i64,
    pub gross_amount: MinorUnits,
    pub platform_fee: MinorUnits,
    pub net_amount: MinorUnits,
    pub settled_at: Option<DateTime<Utc>>,
    pub settlement_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Earning {
    pub fn is_settled(&self) -> bool {
        self.settled_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEarning {
    pub shop_id: String,
    pub job_id: i64,
    pub gross_amount: MinorUnits,
    pub platform_fee: MinorUnits,
    pub net_amount: MinorUnits,
}

//--------------------------------------      AuditEntry       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub action: String,
    pub actor_type: ActorType,
    pub actor_id: String,
    /// JSON object text
    pub metadata: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn metadata_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.metadata).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub action: &'static str,
    pub actor: Actor,
    pub metadata: serde_json::Value,
}

impl NewAuditEntry {
    pub fn new<S: ToString>(entity_type: EntityType, entity_id: S, action: &'static str, actor: &Actor) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.to_string(),
            action,
            actor: actor.clone(),
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
