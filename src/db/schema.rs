//! Database schema and record types

pub use crate::workflow::token::SessionToken;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS profiles (
    telegram_id INTEGER PRIMARY KEY,
    username TEXT,
    full_name TEXT,
    company_name TEXT,
    role TEXT NOT NULL DEFAULT 'user',
    is_approved BOOLEAN NOT NULL DEFAULT 0,
    state TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_profiles_approved ON profiles(is_approved);

CREATE TABLE IF NOT EXISTS shipments (
    id TEXT PRIMARY KEY,
    created_by INTEGER NOT NULL,
    airline TEXT,
    origin TEXT,
    destination TEXT,
    awb_number TEXT,
    pieces INTEGER,
    gross_weight REAL,
    chargeable_weight REAL,
    chargeable_manual BOOLEAN NOT NULL DEFAULT 0,
    length_cm REAL,
    width_cm REAL,
    height_cm REAL,
    approved_rate_usd REAL,
    sale_rate_usd REAL,
    exchange_rate_etb REAL,
    shipper_info TEXT,
    consignee_info TEXT,
    notify_party TEXT,
    files TEXT NOT NULL DEFAULT '[]',
    shipment_status TEXT NOT NULL DEFAULT 'quotation_created',
    payment_status TEXT NOT NULL DEFAULT 'unpaid',
    admin_message_id INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_shipments_owner ON shipments(created_by, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_shipments_created ON shipments(created_at DESC);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS pending_uploads (
    shipment_id TEXT PRIMARY KEY,
    owner_id INTEGER NOT NULL,
    proofs TEXT NOT NULL DEFAULT '[]',
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS processed_events (
    event_id TEXT PRIMARY KEY,
    received_at TEXT NOT NULL
);
";

/// Settings key holding the USD to ETB exchange rate
pub const EXCHANGE_RATE_KEY: &str = "exchange_rate";

/// Value returned for a setting that was never written
pub const DEFAULT_SETTING_VALUE: f64 = 1.0;

/// External (transport) user identifier
pub type UserId = i64;

/// Chat identifier on the transport (private chats share the user id)
pub type ChatId = i64;

/// A stored enum column held a value outside its vocabulary
#[derive(Debug, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// ============================================================
// Identifiers and enums
// ============================================================

/// Generated shipment identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShipmentId(Uuid);

impl ShipmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ShipmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ShipmentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Access role of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }

    /// Staff and admins may act on the approval workflow
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}

/// Shipment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    #[default]
    QuotationCreated,
    /// Submitted by the owner, waiting for the staff rate decision
    PendingRateApproval,
    RateApproved,
    PaymentReceived,
    Booked,
    Uplifted,
    Completed,
}

impl ShipmentStatus {
    pub const ALL: [ShipmentStatus; 7] = [
        ShipmentStatus::QuotationCreated,
        ShipmentStatus::PendingRateApproval,
        ShipmentStatus::RateApproved,
        ShipmentStatus::PaymentReceived,
        ShipmentStatus::Booked,
        ShipmentStatus::Uplifted,
        ShipmentStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ShipmentStatus::QuotationCreated => "quotation_created",
            ShipmentStatus::PendingRateApproval => "pending_rate_approval",
            ShipmentStatus::RateApproved => "rate_approved",
            ShipmentStatus::PaymentReceived => "payment_received",
            ShipmentStatus::Booked => "booked",
            ShipmentStatus::Uplifted => "uplifted",
            ShipmentStatus::Completed => "completed",
        }
    }

    /// Human readable status line
    pub fn describe(self) -> &'static str {
        match self {
            ShipmentStatus::QuotationCreated => "Quotation created. Not yet submitted.",
            ShipmentStatus::PendingRateApproval => "Awaiting Admin Rate Approval.",
            ShipmentStatus::RateApproved => "Rate approved. Awaiting payment proof.",
            ShipmentStatus::PaymentReceived => {
                "Payment proof submitted. Awaiting verification."
            }
            ShipmentStatus::Booked => "Shipment booked and confirmed.",
            ShipmentStatus::Uplifted => "Shipment has been uplifted.",
            ShipmentStatus::Completed => "Shipment delivered.",
        }
    }

    /// Owners may change fields until payment proof is under review
    pub fn is_editable(self) -> bool {
        matches!(
            self,
            ShipmentStatus::QuotationCreated
                | ShipmentStatus::PendingRateApproval
                | ShipmentStatus::RateApproved
        )
    }

    /// Next status in the staff-driven lifecycle (booked → uplifted → completed)
    pub fn next_lifecycle(self) -> Option<ShipmentStatus> {
        match self {
            ShipmentStatus::Booked => Some(ShipmentStatus::Uplifted),
            ShipmentStatus::Uplifted => Some(ShipmentStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShipmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("shipment status", s))
    }
}

/// Payment status of a shipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(ParseEnumError::new("payment status", other)),
        }
    }
}

/// How an uploaded proof arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofKind {
    Photo,
    Document,
}

/// Proof files a payment submission consists of
pub const REQUIRED_PROOFS: usize = 2;

/// A stored proof-of-payment file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofFile {
    pub url: String,
    pub kind: ProofKind,
}

/// Box dimensions in centimetres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

// ============================================================
// Profiles
// ============================================================

/// User profile record
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub company_name: Option<String>,
    pub role: Role,
    pub is_approved: bool,
    /// Current workflow position; `None` means idle at the main menu
    pub state: Option<SessionToken>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or("Unknown")
    }
}

/// Fields for a first-contact profile
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub id: UserId,
    pub username: Option<String>,
    pub role: Role,
    pub is_approved: bool,
    pub state: Option<SessionToken>,
}

/// Partial profile update; `None` leaves a column untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub full_name: Option<String>,
    pub company_name: Option<String>,
    pub role: Option<Role>,
    pub is_approved: Option<bool>,
    pub state: Option<Option<SessionToken>>,
}

impl UserPatch {
    pub fn token(state: Option<SessionToken>) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(name) = &self.full_name {
            user.full_name = Some(name.clone());
        }
        if let Some(company) = &self.company_name {
            user.company_name = Some(company.clone());
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(approved) = self.is_approved {
            user.is_approved = approved;
        }
        if let Some(state) = &self.state {
            user.state.clone_from(state);
        }
    }
}

// ============================================================
// Shipments
// ============================================================

/// Shipment record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub owner_id: UserId,
    pub airline: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub awb_number: Option<String>,
    pub pieces: Option<u32>,
    pub gross_weight: Option<f64>,
    pub chargeable_weight: Option<f64>,
    /// Chargeable weight was typed in rather than derived
    pub chargeable_manual: bool,
    pub dimensions: Option<Dimensions>,
    pub approved_rate_usd: Option<f64>,
    pub sale_rate_usd: Option<f64>,
    pub exchange_rate: Option<f64>,
    pub shipper_info: Option<String>,
    pub consignee_info: Option<String>,
    pub notify_party: Option<String>,
    /// Proof-of-payment files in upload order
    pub files: Vec<ProofFile>,
    pub status: ShipmentStatus,
    pub payment_status: PaymentStatus,
    /// Last staff-channel message referencing this shipment
    pub admin_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    /// An empty draft as created at the first wizard step
    pub fn draft(new: &NewShipment, now: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            owner_id: new.owner_id,
            airline: None,
            origin: None,
            destination: None,
            awb_number: None,
            pieces: None,
            gross_weight: None,
            chargeable_weight: None,
            chargeable_manual: false,
            dimensions: None,
            approved_rate_usd: None,
            sale_rate_usd: None,
            exchange_rate: Some(new.exchange_rate),
            shipper_info: None,
            consignee_info: None,
            notify_party: None,
            files: Vec::new(),
            status: ShipmentStatus::QuotationCreated,
            payment_status: PaymentStatus::Unpaid,
            admin_message_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn proof_links(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.url.as_str()).collect()
    }

    /// Apply a patch and return the result, leaving `self` untouched
    #[must_use]
    pub fn patched(&self, patch: &ShipmentPatch) -> Self {
        let mut next = self.clone();
        patch.apply(&mut next);
        next
    }
}

/// Fields for a new draft shipment
#[derive(Debug, Clone, PartialEq)]
pub struct NewShipment {
    pub id: ShipmentId,
    pub owner_id: UserId,
    /// Exchange rate snapshot taken when the draft is opened
    pub exchange_rate: f64,
}

/// Partial shipment update; `None` leaves a column untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShipmentPatch {
    pub airline: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub awb_number: Option<String>,
    pub pieces: Option<u32>,
    pub gross_weight: Option<f64>,
    pub chargeable_weight: Option<Option<f64>>,
    pub chargeable_manual: Option<bool>,
    pub dimensions: Option<Dimensions>,
    pub approved_rate_usd: Option<f64>,
    pub sale_rate_usd: Option<f64>,
    pub shipper_info: Option<String>,
    pub consignee_info: Option<String>,
    pub notify_party: Option<String>,
    pub files: Option<Vec<ProofFile>>,
    pub status: Option<ShipmentStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub admin_message_id: Option<i64>,
}

impl ShipmentPatch {
    pub fn status(status: ShipmentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, s: &mut Shipment) {
        fn set<T: Clone>(slot: &mut Option<T>, value: Option<&T>) {
            if let Some(v) = value {
                *slot = Some(v.clone());
            }
        }

        set(&mut s.airline, self.airline.as_ref());
        set(&mut s.origin, self.origin.as_ref());
        set(&mut s.destination, self.destination.as_ref());
        set(&mut s.awb_number, self.awb_number.as_ref());
        set(&mut s.pieces, self.pieces.as_ref());
        set(&mut s.gross_weight, self.gross_weight.as_ref());
        if let Some(chargeable) = self.chargeable_weight {
            s.chargeable_weight = chargeable;
        }
        if let Some(manual) = self.chargeable_manual {
            s.chargeable_manual = manual;
        }
        set(&mut s.dimensions, self.dimensions.as_ref());
        set(&mut s.approved_rate_usd, self.approved_rate_usd.as_ref());
        set(&mut s.sale_rate_usd, self.sale_rate_usd.as_ref());
        set(&mut s.shipper_info, self.shipper_info.as_ref());
        set(&mut s.consignee_info, self.consignee_info.as_ref());
        set(&mut s.notify_party, self.notify_party.as_ref());
        if let Some(files) = &self.files {
            s.files.clone_from(files);
        }
        if let Some(status) = self.status {
            s.status = status;
        }
        if let Some(payment) = self.payment_status {
            s.payment_status = payment;
        }
        set(&mut s.admin_message_id, self.admin_message_id.as_ref());
    }
}

/// Record counts for the admin panel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub users: u64,
    pub shipments: u64,
}
