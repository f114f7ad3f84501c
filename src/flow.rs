use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::{PaymentMethod, PaymentStatus, ReservationState, StatusClass};

/* ============================================================
   States
   ============================================================ */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Booking submission itself failed (transport, backend rejection,
    /// or a response unusable for the chosen settlement path).
    Submission,
    /// The payment reached a terminal failure status.
    Payment,
    /// The poller exhausted its attempt ceiling; outcome uncertain.
    PollTimeout,
}

/// The booking flow as one exhaustive tagged union. Every UI branch maps to
/// exactly one variant; there is no step string or boolean flag to fall out
/// of sync with.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    /// Nothing in flight; the form is ready for a fresh attempt.
    Form,
    /// Booking POST in flight.
    Processing,
    /// Reservation created; waiting for the user to open hosted checkout.
    AwaitingRedirect {
        reservation: ReservationState,
        checkout_url: String,
        payment_id: String,
    },
    /// User went to the external checkout; watching the status endpoint.
    Polling {
        reservation: ReservationState,
        payment_id: String,
    },
    /// Reservation created; waiting for a payment proof upload.
    AwaitingProof { reservation: ReservationState },
    Succeeded { appointment_request_id: Uuid },
    Failed {
        kind: FailureKind,
        message: String,
        /// Retained so a later retry can release the server-side hold.
        /// Deliberately absent for `PollTimeout`: the payment may have gone
        /// through, and cancelling it blind would clobber a real booking.
        reservation: Option<ReservationState>,
    },
    /// The reservation countdown reached zero before a terminal outcome.
    Expired,
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            FlowState::Form => "form",
            FlowState::Processing => "processing",
            FlowState::AwaitingRedirect { .. } => "awaiting_redirect",
            FlowState::Polling { .. } => "polling",
            FlowState::AwaitingProof { .. } => "awaiting_proof",
            FlowState::Succeeded { .. } => "succeeded",
            FlowState::Failed { .. } => "failed",
            FlowState::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowState::Succeeded { .. } | FlowState::Failed { .. } | FlowState::Expired
        )
    }

    pub fn reservation(&self) -> Option<&ReservationState> {
        match self {
            FlowState::AwaitingRedirect { reservation, .. }
            | FlowState::Polling { reservation, .. }
            | FlowState::AwaitingProof { reservation } => Some(reservation),
            FlowState::Failed { reservation, .. } => reservation.as_ref(),
            _ => None,
        }
    }
}

/* ============================================================
   Transition results
   ============================================================ */

/// What the orchestrator should do after feeding a booking response in.
#[derive(Debug, PartialEq)]
pub enum BookedDisposition {
    /// Reservation accepted; start the countdown from its expiry.
    Accepted,
    /// The response was unusable; flow is now `Failed`, reservation retained.
    Rejected,
    /// The user cancelled while the POST was in flight; the fresh
    /// reservation must be released server-side and the flow stays put.
    Orphaned(ReservationState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDirective {
    Continue,
    Stop,
}

/* ============================================================
   The machine
   ============================================================ */

/// Pure transition core: no I/O, no clocks, no tasks. The orchestrator owns
/// the timers and the network and drives this through its methods.
#[derive(Debug)]
pub struct BookingFlow {
    state: FlowState,
}

impl Default for BookingFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingFlow {
    pub fn new() -> Self {
        Self {
            state: FlowState::Form,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    fn goto(&mut self, next: FlowState) {
        debug!(from = self.state.name(), to = next.name(), "flow transition");
        self.state = next;
    }

    /// `Form → Processing`. Exactly one submission may be in flight; a live
    /// reservation must be cancelled before another attempt starts.
    pub fn begin_submission(&mut self) -> Result<(), BookingError> {
        match &self.state {
            FlowState::Form => {
                self.goto(FlowState::Processing);
                Ok(())
            }
            FlowState::Processing
            | FlowState::AwaitingRedirect { .. }
            | FlowState::Polling { .. }
            | FlowState::AwaitingProof { .. } => Err(BookingError::BookingInProgress),
            s @ (FlowState::Succeeded { .. } | FlowState::Failed { .. } | FlowState::Expired) => {
                Err(BookingError::IllegalTransition { state: s.name() })
            }
        }
    }

    /// Feed in a successful booking response. Branches on the settlement
    /// path: hosted checkout needs both a redirect URL and a payment id to
    /// poll; manual proof needs neither.
    pub fn on_booked(
        &mut self,
        reservation: ReservationState,
        method: PaymentMethod,
    ) -> BookedDisposition {
        if self.state != FlowState::Processing {
            // Cancel won the race against the booking response.
            warn!(
                state = self.state.name(),
                appointment_request_id = %reservation.appointment_request_id,
                "booking response arrived outside processing; releasing reservation"
            );
            return BookedDisposition::Orphaned(reservation);
        }

        match method {
            PaymentMethod::Paymaya => {
                let checkout_url = match reservation.checkout_url.clone() {
                    Some(url) if !url.is_empty() => url,
                    _ => {
                        self.goto(FlowState::Failed {
                            kind: FailureKind::Submission,
                            message: "payment provider returned no checkout link".into(),
                            reservation: Some(reservation),
                        });
                        return BookedDisposition::Rejected;
                    }
                };
                let payment_id = match reservation.payment_id.clone() {
                    Some(id) if !id.is_empty() => id,
                    _ => {
                        self.goto(FlowState::Failed {
                            kind: FailureKind::Submission,
                            message: "payment provider returned no payment reference".into(),
                            reservation: Some(reservation),
                        });
                        return BookedDisposition::Rejected;
                    }
                };
                info!(
                    appointment_request_id = %reservation.appointment_request_id,
                    expires_at = %reservation.reservation_expires_at,
                    "reservation created; awaiting checkout redirect"
                );
                self.goto(FlowState::AwaitingRedirect {
                    reservation,
                    checkout_url,
                    payment_id,
                });
                BookedDisposition::Accepted
            }
            PaymentMethod::Gcash => {
                info!(
                    appointment_request_id = %reservation.appointment_request_id,
                    expires_at = %reservation.reservation_expires_at,
                    "reservation created; awaiting payment proof"
                );
                self.goto(FlowState::AwaitingProof { reservation });
                BookedDisposition::Accepted
            }
        }
    }

    /// `Processing → Failed`. No-ops if the user already cancelled.
    pub fn on_submit_failed(&mut self, message: String) {
        if self.state == FlowState::Processing {
            self.goto(FlowState::Failed {
                kind: FailureKind::Submission,
                message,
                reservation: None,
            });
        }
    }

    /// `AwaitingRedirect → Polling`, user-initiated: the system never infers
    /// that the redirect happened. Returns the URL for the UI to open and
    /// the payment id the poller should watch.
    pub fn open_checkout(&mut self) -> Result<(String, String), BookingError> {
        match self.state.clone() {
            FlowState::AwaitingRedirect {
                reservation,
                checkout_url,
                payment_id,
            } => {
                self.goto(FlowState::Polling {
                    reservation,
                    payment_id: payment_id.clone(),
                });
                Ok((checkout_url, payment_id))
            }
            s => Err(BookingError::IllegalTransition { state: s.name() }),
        }
    }

    pub fn polling_payment_id(&self) -> Option<&str> {
        match &self.state {
            FlowState::Polling { payment_id, .. } => Some(payment_id),
            _ => None,
        }
    }

    /// Apply one poll answer. The first terminal status decides the outcome;
    /// anything in flight keeps the loop going. A result that lands after
    /// the flow already left `Polling` (cancel, expiry) is dropped.
    pub fn on_poll_status(&mut self, status: PaymentStatus) -> PollDirective {
        let FlowState::Polling { reservation, .. } = self.state.clone() else {
            return PollDirective::Stop;
        };

        match status.class() {
            StatusClass::TerminalSuccess => {
                info!(
                    appointment_request_id = %reservation.appointment_request_id,
                    "payment confirmed"
                );
                self.goto(FlowState::Succeeded {
                    appointment_request_id: reservation.appointment_request_id,
                });
                PollDirective::Stop
            }
            StatusClass::TerminalFailure => {
                let message = match status {
                    PaymentStatus::Expired => "payment session expired".to_string(),
                    PaymentStatus::Cancelled => "payment was cancelled".to_string(),
                    _ => "payment failed".to_string(),
                };
                self.goto(FlowState::Failed {
                    kind: FailureKind::Payment,
                    message,
                    reservation: Some(reservation),
                });
                PollDirective::Stop
            }
            StatusClass::InFlight => PollDirective::Continue,
        }
    }

    /// The poller gave up without a terminal answer.
    pub fn on_poll_exhausted(&mut self, attempts: u32) {
        if let FlowState::Polling { .. } = self.state {
            self.goto(FlowState::Failed {
                kind: FailureKind::PollTimeout,
                message: BookingError::PollTimeout { attempts }.to_string(),
                reservation: None,
            });
        }
    }

    /// The id to attach the proof to, validated against the current state.
    pub fn proof_target(&self) -> Result<Uuid, BookingError> {
        match &self.state {
            FlowState::AwaitingProof { reservation } => Ok(reservation.appointment_request_id),
            s => Err(BookingError::IllegalTransition { state: s.name() }),
        }
    }

    /// `AwaitingProof → Succeeded` once the upload has been accepted.
    pub fn on_proof_uploaded(&mut self) {
        if let FlowState::AwaitingProof { reservation } = self.state.clone() {
            info!(
                appointment_request_id = %reservation.appointment_request_id,
                "payment proof uploaded; awaiting staff verification"
            );
            self.goto(FlowState::Succeeded {
                appointment_request_id: reservation.appointment_request_id,
            });
        }
    }

    /// Countdown reached zero. Fires at most once, and never clobbers a
    /// terminal outcome: if the payment already succeeded (or failed) in the
    /// same tick, expiry is a no-op. Returns whether the transition happened.
    pub fn on_expired(&mut self) -> bool {
        if self.state.is_terminal() || self.state == FlowState::Form {
            debug!(state = self.state.name(), "expiry ignored; outcome already recorded");
            return false;
        }
        warn!(state = self.state.name(), "reservation expired");
        self.goto(FlowState::Expired);
        true
    }

    /// Dialog close / explicit cancel: return to `Form` from anywhere,
    /// handing back any reservation that still needs a best-effort
    /// server-side release. A completed booking is never handed back.
    pub fn cancel(&mut self) -> Option<ReservationState> {
        let leftover = match &self.state {
            FlowState::Succeeded { .. } | FlowState::Expired | FlowState::Form => None,
            other => other.reservation().cloned(),
        };
        self.goto(FlowState::Form);
        leftover
    }
}
