use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/* -------------------------
   Directory / schedule DTOs
--------------------------*/

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub user_id: Uuid,
    pub display_name: String,
    pub specialization: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_available: bool,
}

impl AvailabilitySlot {
    /// A slot can be picked only while it is still open and in the future.
    pub fn is_selectable(&self, now: DateTime<Utc>) -> bool {
        self.is_available && self.end > now
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorScheduleResponse {
    pub availability: Vec<AvailabilitySlot>,
}

/* -------------------------
   Booking / reservation DTOs
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Paymaya,
    Gcash,
}

/// Sent exactly once per submission attempt.
#[derive(Debug, Clone, Serialize)]
pub struct BookingRequest {
    pub doctor_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub payment_method: PaymentMethod,
}

/// Returned by a successful booking POST. Authoritative state lives
/// server-side; this is the client's cache of it for one attempt.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReservationState {
    pub appointment_request_id: Uuid,
    pub payment_id: Option<String>,
    pub checkout_url: Option<String>,
    pub reservation_expires_at: DateTime<Utc>,
}

/* -------------------------
   Payment status
--------------------------*/

/// The status endpoint has answered with both `payment_status` and `status`
/// over time; accept either spelling.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentStatusResponse {
    pub payment_status: Option<String>,
    pub status: Option<String>,
}

impl PaymentStatusResponse {
    pub fn raw_status(&self) -> Option<&str> {
        self.payment_status
            .as_deref()
            .or(self.status.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    Pending,
    Processing,
    Failed,
    Expired,
    Cancelled,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    TerminalSuccess,
    TerminalFailure,
    InFlight,
}

impl PaymentStatus {
    /// Normalize the backend's status vocabulary.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "paid" | "success" | "completed" => PaymentStatus::Paid,
            "pending" => PaymentStatus::Pending,
            "processing" => PaymentStatus::Processing,
            "failed" => PaymentStatus::Failed,
            "expired" => PaymentStatus::Expired,
            "cancelled" | "canceled" => PaymentStatus::Cancelled,
            _ => PaymentStatus::Unknown,
        }
    }

    /// Unknown statuses stay in flight: the poller keeps going within its
    /// attempt ceiling rather than failing on backend vocabulary drift.
    pub fn class(&self) -> StatusClass {
        match self {
            PaymentStatus::Paid => StatusClass::TerminalSuccess,
            PaymentStatus::Failed | PaymentStatus::Expired | PaymentStatus::Cancelled => {
                StatusClass::TerminalFailure
            }
            PaymentStatus::Pending | PaymentStatus::Processing | PaymentStatus::Unknown => {
                StatusClass::InFlight
            }
        }
    }
}
