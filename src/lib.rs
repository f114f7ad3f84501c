//! Client-side booking and payment orchestration for the clinic API.
//!
//! The [`orchestrator::BookingOrchestrator`] drives one appointment booking
//! attempt end to end: schedule lookup, slot validation, reservation with an
//! expiry countdown, settlement by hosted checkout (polled) or manual proof
//! upload, and cancellation. The backend stays remote; this crate only
//! consumes its HTTP contracts.

pub mod api;
pub mod config;
pub mod countdown;
pub mod error;
pub mod flow;
pub mod models;
pub mod orchestrator;
pub mod poll;
pub mod schedule;

pub use api::{BookingApi, HttpApi};
pub use config::Config;
pub use error::{BookingError, GatewayErrorKind};
pub use flow::{FailureKind, FlowState};
pub use models::{
    AvailabilitySlot, BookingRequest, Doctor, PaymentMethod, PaymentStatus, ReservationState,
};
pub use orchestrator::{BookingForm, BookingOrchestrator};
pub use schedule::ScheduleBook;
