//! Domain types parsed from store records.
//!
//! Records come from a schemaless backend, so every struct here is a
//! tolerant view: each field is read through an alias list and absence is
//! an `Option`, never an error.

use chrono::{DateTime, Utc};
use record_store::{Fields, Record};
use serde_json::Value;

/// Table names in the record store.
pub const SITTERS_TABLE: &str = "Sitters";
pub const CLIENTS_TABLE: &str = "Clients";
pub const MESSAGES_TABLE: &str = "Messages";
pub const INVENTORY_TABLE: &str = "Number Inventory";
pub const AUDIT_TABLE: &str = "Audit Log";

/// Accepted spellings per logical column. The first entry is the canonical
/// name used for writes.
pub const PHONE_FIELDS: &[&str] = &["Phone Number", "PhoneNumber", "phone-number"];
pub const ENTRY_POINT_FIELDS: &[&str] = &["Twilio Number", "twilio-number", "TwilioNumber"];
pub const SITTER_NAME_FIELDS: &[&str] = &["Full Name", "Name"];
pub const CLIENT_NAME_FIELDS: &[&str] = &["Name", "Full Name"];
pub const MASKING_NUMBER_FIELDS: &[&str] = &["twilio-number", "Twilio Number", "Masking Number"];
pub const LAST_ACTIVE_FIELDS: &[&str] = &["Last Active", "LastActive"];
pub const ERROR_COUNT_FIELDS: &[&str] = &["Error Count", "ErrorCount"];
pub const SITTER_LINK_FIELDS: &[&str] = &["Sitter", "Linked Sitter"];
pub const STATUS_FIELDS: &[&str] = &["Status"];
pub const NUMBER_TYPE_FIELDS: &[&str] = &["Type", "Lifecycle"];
pub const ASSIGNED_TO_FIELDS: &[&str] = &["Assigned To", "AssignedTo"];
pub const CORRELATION_FIELDS: &[&str] = &["Correlation ID", "CorrelationId"];
pub const MSG_FROM_FIELDS: &[&str] = &["From"];
pub const MSG_TO_FIELDS: &[&str] = &["To"];
pub const MSG_BODY_FIELDS: &[&str] = &["Body"];
pub const TIMESTAMP_FIELDS: &[&str] = &["Timestamp"];

/// Lifecycle tag of numbers drawn for client masking.
pub const POOL_TAG: &str = "Pool";

pub(crate) fn record_fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap_or_default()
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// A service provider with a real number and a public entry point.
#[derive(Debug, Clone)]
pub struct Sitter {
    pub id: String,
    pub display_name: String,
    /// Real phone number messages are forwarded to.
    pub real_number: Option<String>,
    /// Public number clients text.
    pub entry_point: Option<String>,
}

impl Sitter {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            display_name: record
                .str_field(SITTER_NAME_FIELDS)
                .unwrap_or("Unknown")
                .to_string(),
            real_number: record.str_field(PHONE_FIELDS).map(String::from),
            entry_point: record.str_field(ENTRY_POINT_FIELDS).map(String::from),
        }
    }
}

/// A customer, keyed by real phone number.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub real_number: Option<String>,
    /// Masking number currently held, if any.
    pub masking_number: Option<String>,
    pub linked_sitter: Option<String>,
    pub last_active: Option<DateTime<Utc>>,
    pub error_count: i64,
}

impl Client {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            name: record
                .str_field(CLIENT_NAME_FIELDS)
                .unwrap_or("Unknown")
                .to_string(),
            real_number: record.str_field(PHONE_FIELDS).map(String::from),
            masking_number: record.str_field(MASKING_NUMBER_FIELDS).map(String::from),
            linked_sitter: record.str_field(SITTER_LINK_FIELDS).map(String::from),
            last_active: record.str_field(LAST_ACTIVE_FIELDS).and_then(parse_timestamp),
            error_count: record.int_field(ERROR_COUNT_FIELDS).unwrap_or(0),
        }
    }
}

/// Lifecycle status of an inventory number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberStatus {
    Ready,
    Assigned,
}

impl NumberStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            v if v.eq_ignore_ascii_case("ready") => Some(Self::Ready),
            v if v.eq_ignore_ascii_case("assigned") => Some(Self::Assigned),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "Ready",
            Self::Assigned => "Assigned",
        }
    }
}

/// An inventory number record.
#[derive(Debug, Clone)]
pub struct MaskingNumber {
    pub id: String,
    pub value: String,
    pub tag: Option<String>,
    /// `None` when the stored status string is unrecognized.
    pub status: Option<NumberStatus>,
    pub assigned_to: Option<String>,
}

impl MaskingNumber {
    /// `None` when the record has no phone value at all.
    pub fn from_record(record: &Record) -> Option<Self> {
        let value = record.str_field(PHONE_FIELDS)?.to_string();
        Some(Self {
            id: record.id.clone(),
            value,
            tag: record.str_field(NUMBER_TYPE_FIELDS).map(String::from),
            status: record.str_field(STATUS_FIELDS).and_then(NumberStatus::parse),
            assigned_to: record.str_field(ASSIGNED_TO_FIELDS).map(String::from),
        })
    }
}

/// Delivery status of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Pending,
    Sent,
    SentViaFallback,
    RetryError,
    RetryAborted,
}

impl DeliveryStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Pending" => Some(Self::Pending),
            "Sent" => Some(Self::Sent),
            "Sent (via Fallback)" => Some(Self::SentViaFallback),
            "Retry Error" => Some(Self::RetryError),
            "Retry Aborted" => Some(Self::RetryAborted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Sent => "Sent",
            Self::SentViaFallback => "Sent (via Fallback)",
            Self::RetryError => "Retry Error",
            Self::RetryAborted => "Retry Aborted",
        }
    }
}

/// A logged forwarding attempt.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: String,
    pub correlation_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub body: Option<String>,
    pub status: Option<DeliveryStatus>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl MessageRecord {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            correlation_id: record.str_field(CORRELATION_FIELDS).map(String::from),
            from: record.str_field(MSG_FROM_FIELDS).map(String::from),
            to: record.str_field(MSG_TO_FIELDS).map(String::from),
            body: record.str_field(MSG_BODY_FIELDS).map(String::from),
            status: record.str_field(STATUS_FIELDS).and_then(DeliveryStatus::parse),
            timestamp: record.str_field(TIMESTAMP_FIELDS).and_then(parse_timestamp),
        }
    }
}

/// One inbound SMS event, already normalized at the webhook boundary.
#[derive(Debug, Clone)]
pub struct InboundSms {
    pub from: String,
    pub to: String,
    pub body: String,
}

/// Why an inbound event produced no forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Masking number no client currently holds.
    OrphanedMaskingNumber,
    /// Sitter's entry point is their own real number.
    SelfAddressedSitter,
    /// Neither side matched the sitter directory.
    UnknownParties,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrphanedMaskingNumber => "orphaned masking number",
            Self::SelfAddressedSitter => "self-addressed sitter",
            Self::UnknownParties => "unknown parties",
        }
    }
}

/// Result of routing one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Sitter reply relayed to the client's real number.
    ForwardedToClient { correlation_id: String },
    /// Client message relayed to the sitter's real number.
    ForwardedToSitter {
        correlation_id: String,
        new_assignment: bool,
    },
    /// No forward attempted.
    Ignored(IgnoreReason),
}
