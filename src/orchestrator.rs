use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{BookingApi, HttpApi};
use crate::config::Config;
use crate::countdown::{Clock, Countdown, SystemClock};
use crate::error::BookingError;
use crate::flow::{BookedDisposition, BookingFlow, FlowState};
use crate::models::{
    AvailabilitySlot, BookingRequest, Doctor, PaymentMethod, PaymentStatus, StatusClass,
};
use crate::poll::{PollConfig, PollOutcome, poll_until};
use crate::schedule::ScheduleBook;

/// The user's side of one booking attempt, as collected by the dialog.
#[derive(Debug, Clone)]
pub struct BookingForm {
    pub doctor_id: Uuid,
    /// Start time of the chosen slot; resolved against the cached schedule.
    pub slot_start: DateTime<Utc>,
    pub notes: Option<String>,
    pub payment_method: PaymentMethod,
}

struct Inner {
    flow: BookingFlow,
    schedule: Option<ScheduleBook>,
    countdown: Option<Countdown>,
    poller: Option<JoinHandle<()>>,
}

impl Inner {
    /// Both timers go down together on any terminal or expired state.
    /// Idempotent: aborting an already-finished task is a no-op.
    fn stop_timers(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            countdown.stop();
        }
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.stop_timers();
    }
}

/// Owns one booking attempt end to end: the cached schedule, the flow state
/// machine, the reservation countdown, and the payment status poller.
///
/// The mutex guards synchronous state transitions only and is never held
/// across an await; the spawned countdown/poller tasks hold a weak reference
/// so they die with the orchestrator.
pub struct BookingOrchestrator {
    api: Arc<dyn BookingApi>,
    clock: Arc<dyn Clock>,
    poll_config: PollConfig,
    proof_max_bytes: usize,
    inner: Arc<Mutex<Inner>>,
}

impl BookingOrchestrator {
    pub fn new(api: Arc<dyn BookingApi>, config: &Config) -> Self {
        Self::with_clock(api, config, Arc::new(SystemClock))
    }

    /// Wire up the real HTTP backend from configuration.
    pub fn over_http(config: &Config) -> Self {
        Self::new(Arc::new(HttpApi::new(config)), config)
    }

    pub fn with_clock(api: Arc<dyn BookingApi>, config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            api,
            clock,
            poll_config: PollConfig {
                interval: config.poll_interval,
                max_attempts: config.poll_max_attempts,
            },
            proof_max_bytes: config.proof_max_bytes,
            inner: Arc::new(Mutex::new(Inner {
                flow: BookingFlow::new(),
                schedule: None,
                countdown: None,
                poller: None,
            })),
        }
    }

    pub fn state(&self) -> FlowState {
        self.inner.lock().unwrap().flow.state().clone()
    }

    /// Remaining-seconds readout of the live reservation, if one exists.
    pub fn countdown(&self) -> Option<watch::Receiver<i64>> {
        self.inner
            .lock()
            .unwrap()
            .countdown
            .as_ref()
            .map(Countdown::subscribe)
    }

    /* ------------------------------------------------------------
       Schedule
       ------------------------------------------------------------ */

    pub async fn list_doctors(&self) -> Result<Vec<Doctor>, BookingError> {
        self.api.list_doctors().await
    }

    /// Fetch and cache the doctor's schedule. On any error the previously
    /// cached schedule stays untouched.
    pub async fn load_schedule(&self, doctor_id: Uuid) -> Result<(), BookingError> {
        let response = self.api.doctor_schedule(doctor_id).await?;
        let book = ScheduleBook::from_slots(response.availability);
        self.inner.lock().unwrap().schedule = Some(book);
        Ok(())
    }

    pub fn bookable_dates(&self) -> Vec<NaiveDate> {
        let inner = self.inner.lock().unwrap();
        inner
            .schedule
            .as_ref()
            .map(|s| s.bookable_dates(self.clock.now()))
            .unwrap_or_default()
    }

    pub fn slots_on(&self, date: NaiveDate) -> Vec<AvailabilitySlot> {
        let inner = self.inner.lock().unwrap();
        inner
            .schedule
            .as_ref()
            .map(|s| s.slots_on(date).to_vec())
            .unwrap_or_default()
    }

    /* ------------------------------------------------------------
       Booking submission
       ------------------------------------------------------------ */

    /// Confirm payment: build exactly one `BookingRequest` from the form and
    /// POST it. Fails fast with no network call when the slot cannot be
    /// resolved in the cached schedule or another attempt is in flight.
    /// Returns the state reached by this attempt.
    pub async fn submit(&self, form: BookingForm) -> Result<FlowState, BookingError> {
        {
            let mut inner = self.inner.lock().unwrap();
            let now = self.clock.now();
            let Some(schedule) = inner.schedule.as_ref() else {
                return Err(BookingError::Validation(
                    "no schedule loaded for this doctor".into(),
                ));
            };
            match schedule.resolve(form.slot_start) {
                None => {
                    return Err(BookingError::Validation(
                        "selected slot is no longer in the schedule".into(),
                    ));
                }
                Some(slot) if !slot.is_selectable(now) => {
                    return Err(BookingError::Validation(
                        "selected slot is no longer available".into(),
                    ));
                }
                Some(_) => {}
            }
            inner.flow.begin_submission()?;
        }

        let request = BookingRequest {
            doctor_id: form.doctor_id,
            appointment_date: form.slot_start,
            notes: form.notes,
            payment_method: form.payment_method,
        };
        info!(
            doctor_id = %request.doctor_id,
            appointment_date = %request.appointment_date,
            method = ?request.payment_method,
            "submitting booking request"
        );

        let reservation = match self.api.book(&request).await {
            Ok(reservation) => reservation,
            Err(err) => {
                self.inner
                    .lock()
                    .unwrap()
                    .flow
                    .on_submit_failed(err.to_string());
                return Err(err);
            }
        };

        let disposition = {
            let mut inner = self.inner.lock().unwrap();
            let disposition = inner
                .flow
                .on_booked(reservation.clone(), form.payment_method);
            if disposition == BookedDisposition::Accepted {
                self.start_countdown_locked(&mut inner, reservation.reservation_expires_at);
            }
            disposition
        };

        if let BookedDisposition::Orphaned(orphan) = disposition {
            self.release_reservation(orphan.appointment_request_id).await;
        }

        Ok(self.state())
    }

    /* ------------------------------------------------------------
       Hosted checkout + polling
       ------------------------------------------------------------ */

    /// User-initiated: hand back the checkout URL for the UI to open and
    /// start watching the status endpoint. The system never infers that the
    /// redirect happened on its own.
    pub fn open_checkout(&self) -> Result<String, BookingError> {
        let (url, payment_id) = { self.inner.lock().unwrap().flow.open_checkout()? };
        self.spawn_poller(payment_id);
        Ok(url)
    }

    fn spawn_poller(&self, payment_id: String) {
        let api = self.api.clone();
        let weak = Arc::downgrade(&self.inner);
        let config = self.poll_config;

        let task = tokio::spawn(async move {
            let outcome = poll_until(config, move |attempt| {
                let api = api.clone();
                let payment_id = payment_id.clone();
                async move {
                    debug!(attempt, payment_id = %payment_id, "payment status check");
                    let status = api.payment_status(&payment_id).await?;
                    Ok::<_, BookingError>(match status.class() {
                        StatusClass::InFlight => None,
                        _ => Some(status),
                    })
                }
            })
            .await;

            finish_polling(&weak, outcome);
        });

        let mut inner = self.inner.lock().unwrap();
        if let Some(old) = inner.poller.replace(task) {
            old.abort();
        }
    }

    /* ------------------------------------------------------------
       Proof upload (manual settlement)
       ------------------------------------------------------------ */

    /// Upload the GCash payment proof. The size limit is enforced locally,
    /// before any state check or network traffic.
    pub async fn upload_proof(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), BookingError> {
        if bytes.len() > self.proof_max_bytes {
            return Err(BookingError::Validation(format!(
                "proof file is {} bytes; the limit is {} bytes",
                bytes.len(),
                self.proof_max_bytes
            )));
        }

        let target = { self.inner.lock().unwrap().flow.proof_target()? };
        self.api
            .upload_gcash_proof(target, file_name, bytes)
            .await?;

        let mut inner = self.inner.lock().unwrap();
        inner.flow.on_proof_uploaded();
        match inner.flow.state() {
            FlowState::Succeeded { .. } => {
                inner.stop_timers();
                Ok(())
            }
            // The reservation expired while the upload was in flight.
            FlowState::Expired => Err(BookingError::ReservationExpired),
            s => Err(BookingError::IllegalTransition { state: s.name() }),
        }
    }

    /* ------------------------------------------------------------
       Cancel / retry
       ------------------------------------------------------------ */

    /// Close the dialog before a terminal state: stop both timers, clear all
    /// client-held reservation/payment identifiers, then best-effort cancel
    /// the reservation server-side. A cancellation failure is logged, never
    /// surfaced — local state must not get stuck on it.
    pub async fn cancel(&self) {
        let leftover = {
            let mut inner = self.inner.lock().unwrap();
            inner.stop_timers();
            inner.flow.cancel()
        };
        if let Some(reservation) = leftover {
            self.release_reservation(reservation.appointment_request_id)
                .await;
        }
    }

    /// Leave a failure or expiry behind and return to a clean form. Releases
    /// any reservation retained inside the failed state.
    pub async fn retry(&self) {
        self.cancel().await;
    }

    async fn release_reservation(&self, appointment_request_id: Uuid) {
        match self.api.cancel_reservation(appointment_request_id).await {
            Ok(()) => info!(%appointment_request_id, "reservation released"),
            Err(err) => warn!(
                %appointment_request_id,
                %err,
                "best-effort reservation cancel failed"
            ),
        }
    }

    /* ------------------------------------------------------------
       Countdown wiring
       ------------------------------------------------------------ */

    fn start_countdown_locked(&self, inner: &mut Inner, expires_at: DateTime<Utc>) {
        let weak = Arc::downgrade(&self.inner);
        let countdown = Countdown::start(self.clock.clone(), expires_at, move || {
            on_reservation_expired(&weak);
        });
        // Replacing the handle tears down any stale countdown from a
        // previous reservation.
        inner.countdown = Some(countdown);
    }
}

/// Expiry side effects: flip the flow to `Expired` (a no-op when a terminal
/// outcome is already recorded — success always wins that race) and tear
/// both timers down.
fn on_reservation_expired(weak: &Weak<Mutex<Inner>>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let mut guard = inner.lock().unwrap();
    if guard.flow.on_expired() {
        guard.stop_timers();
    }
}

fn finish_polling(weak: &Weak<Mutex<Inner>>, outcome: PollOutcome<PaymentStatus>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let mut guard = inner.lock().unwrap();
    match outcome {
        PollOutcome::Resolved(status) => {
            guard.flow.on_poll_status(status);
        }
        PollOutcome::Exhausted { attempts } => {
            guard.flow.on_poll_exhausted(attempts);
        }
    }
    if guard.flow.state().is_terminal() {
        guard.stop_timers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use chrono::Duration;

    use crate::countdown::ManualClock;
    use crate::flow::FailureKind;
    use crate::models::{DoctorScheduleResponse, ReservationState};

    /* ------------------------------------------------------------
       Scripted backend
       ------------------------------------------------------------ */

    #[derive(Default)]
    struct ScriptedApi {
        slots: Vec<AvailabilitySlot>,
        book_responses: Mutex<VecDeque<ReservationState>>,
        statuses: Mutex<VecDeque<PaymentStatus>>,
        book_calls: AtomicU32,
        status_calls: AtomicU32,
        upload_calls: AtomicU32,
        cancel_calls: Mutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl BookingApi for ScriptedApi {
        async fn list_doctors(&self) -> Result<Vec<Doctor>, BookingError> {
            Ok(vec![])
        }

        async fn doctor_schedule(
            &self,
            _doctor_id: Uuid,
        ) -> Result<DoctorScheduleResponse, BookingError> {
            Ok(DoctorScheduleResponse {
                availability: self.slots.clone(),
            })
        }

        async fn book(
            &self,
            _request: &BookingRequest,
        ) -> Result<ReservationState, BookingError> {
            self.book_calls.fetch_add(1, Ordering::SeqCst);
            self.book_responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(BookingError::Backend {
                    status: 500,
                    message: "no scripted booking response".into(),
                })
        }

        async fn payment_status(
            &self,
            _payment_id: &str,
        ) -> Result<PaymentStatus, BookingError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(PaymentStatus::Pending))
        }

        async fn cancel_reservation(
            &self,
            appointment_request_id: Uuid,
        ) -> Result<(), BookingError> {
            self.cancel_calls
                .lock()
                .unwrap()
                .push(appointment_request_id);
            Ok(())
        }

        async fn upload_gcash_proof(
            &self,
            _appointment_request_id: Uuid,
            _file_name: &str,
            _bytes: Vec<u8>,
        ) -> Result<(), BookingError> {
            self.upload_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /* ------------------------------------------------------------
       Fixture
       ------------------------------------------------------------ */

    struct Fixture {
        api: Arc<ScriptedApi>,
        clock: Arc<ManualClock>,
        orchestrator: BookingOrchestrator,
        doctor_id: Uuid,
        slot_start: DateTime<Utc>,
    }

    fn reservation(
        clock: &ManualClock,
        checkout: Option<&str>,
        payment: Option<&str>,
    ) -> ReservationState {
        ReservationState {
            appointment_request_id: Uuid::new_v4(),
            payment_id: payment.map(Into::into),
            checkout_url: checkout.map(Into::into),
            reservation_expires_at: clock.now() + Duration::seconds(120),
        }
    }

    async fn fixture() -> Fixture {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let slot_start = clock.now() + Duration::hours(2);
        let api = Arc::new(ScriptedApi {
            slots: vec![AvailabilitySlot {
                start: slot_start,
                end: slot_start + Duration::minutes(30),
                is_available: true,
            }],
            ..ScriptedApi::default()
        });

        let orchestrator = BookingOrchestrator::with_clock(
            api.clone(),
            &Config::with_base_url("http://scripted"),
            clock.clone(),
        );
        let doctor_id = Uuid::new_v4();
        orchestrator.load_schedule(doctor_id).await.unwrap();

        Fixture {
            api,
            clock,
            orchestrator,
            doctor_id,
            slot_start,
        }
    }

    fn form(f: &Fixture, method: PaymentMethod) -> BookingForm {
        BookingForm {
            doctor_id: f.doctor_id,
            slot_start: f.slot_start,
            notes: Some("first visit".into()),
            payment_method: method,
        }
    }

    /// Advance the manual clock and the tokio clock together, one second at
    /// a time, so interval ticks observe a consistent wall clock.
    async fn step_seconds(clock: &ManualClock, seconds: u64) {
        for _ in 0..seconds {
            clock.advance(Duration::seconds(1));
            tokio::time::advance(StdDuration::from_secs(1)).await;
            tokio::task::yield_now().await;
        }
    }

    /* ------------------------------------------------------------
       Scenarios
       ------------------------------------------------------------ */

    #[tokio::test(start_paused = true)]
    async fn scenario_paymaya_reaches_redirect_with_running_countdown() {
        let f = fixture().await;
        f.api.book_responses.lock().unwrap().push_back(reservation(
            &f.clock,
            Some("https://pay.example/checkout/abc"),
            Some("pm-1"),
        ));

        let state = f
            .orchestrator
            .submit(form(&f, PaymentMethod::Paymaya))
            .await
            .unwrap();

        match state {
            FlowState::AwaitingRedirect { checkout_url, .. } => {
                assert!(!checkout_url.is_empty());
            }
            other => panic!("expected awaiting_redirect, got {other:?}"),
        }
        let readout = f.orchestrator.countdown().expect("countdown running");
        assert!(*readout.borrow() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_missing_checkout_url_fails_instead_of_stalling() {
        let f = fixture().await;
        f.api
            .book_responses
            .lock()
            .unwrap()
            .push_back(reservation(&f.clock, None, Some("pm-1")));

        let state = f
            .orchestrator
            .submit(form(&f, PaymentMethod::Paymaya))
            .await
            .unwrap();

        assert!(
            matches!(state, FlowState::Failed { kind, .. } if kind == FailureKind::Submission),
            "got {state:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_oversized_gcash_proof_rejected_before_network() {
        let f = fixture().await;
        f.api
            .book_responses
            .lock()
            .unwrap()
            .push_back(reservation(&f.clock, None, None));
        f.orchestrator
            .submit(form(&f, PaymentMethod::Gcash))
            .await
            .unwrap();

        let six_mb = vec![0u8; 6 * 1024 * 1024];
        let err = f
            .orchestrator
            .upload_proof("receipt.jpg", six_mb)
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Validation(_)));
        assert_eq!(f.api.upload_calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.orchestrator.state().name(), "awaiting_proof");
    }

    #[tokio::test(start_paused = true)]
    async fn gcash_proof_upload_completes_the_booking() {
        let f = fixture().await;
        f.api
            .book_responses
            .lock()
            .unwrap()
            .push_back(reservation(&f.clock, None, None));
        f.orchestrator
            .submit(form(&f, PaymentMethod::Gcash))
            .await
            .unwrap();

        f.orchestrator
            .upload_proof("receipt.jpg", vec![0u8; 64 * 1024])
            .await
            .unwrap();

        assert!(matches!(
            f.orchestrator.state(),
            FlowState::Succeeded { .. }
        ));
        assert_eq!(f.api.upload_calls.load(Ordering::SeqCst), 1);
        assert!(f.orchestrator.countdown().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn poller_stops_on_first_terminal_status() {
        let f = fixture().await;
        f.api.book_responses.lock().unwrap().push_back(reservation(
            &f.clock,
            Some("https://pay.example/checkout"),
            Some("pm-1"),
        ));
        *f.api.statuses.lock().unwrap() = VecDeque::from(vec![
            PaymentStatus::Pending,
            PaymentStatus::Pending,
            PaymentStatus::Paid,
        ]);

        f.orchestrator
            .submit(form(&f, PaymentMethod::Paymaya))
            .await
            .unwrap();
        f.orchestrator.open_checkout().unwrap();

        // Three 5-second poll intervals.
        step_seconds(&f.clock, 16).await;
        assert!(matches!(
            f.orchestrator.state(),
            FlowState::Succeeded { .. }
        ));
        assert_eq!(f.api.status_calls.load(Ordering::SeqCst), 3);

        // No further checks after resolution.
        step_seconds(&f.clock, 30).await;
        assert_eq!(f.api.status_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_times_out_at_the_attempt_ceiling() {
        let f = fixture().await;
        let mut res = reservation(&f.clock, Some("https://pay.example"), Some("pm-1"));
        // Keep the reservation alive past the whole polling window so the
        // timeout, not the countdown, decides the outcome.
        res.reservation_expires_at = f.clock.now() + Duration::seconds(600);
        f.api.book_responses.lock().unwrap().push_back(res);
        // Status queue stays empty: every check answers the default Pending.

        f.orchestrator
            .submit(form(&f, PaymentMethod::Paymaya))
            .await
            .unwrap();
        f.orchestrator.open_checkout().unwrap();

        step_seconds(&f.clock, 5 * 60 + 5).await;

        match f.orchestrator.state() {
            FlowState::Failed { kind, message, .. } => {
                assert_eq!(kind, FailureKind::PollTimeout);
                assert!(message.contains("check your appointments"));
            }
            other => panic!("expected poll timeout, got {other:?}"),
        }
        assert_eq!(f.api.status_calls.load(Ordering::SeqCst), 60);

        // The ceiling is final: no 61st request.
        step_seconds(&f.clock, 30).await;
        assert_eq!(f.api.status_calls.load(Ordering::SeqCst), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_expiry_clears_the_reservation() {
        let f = fixture().await;
        f.api.book_responses.lock().unwrap().push_back(reservation(
            &f.clock,
            Some("https://pay.example"),
            Some("pm-1"),
        ));

        f.orchestrator
            .submit(form(&f, PaymentMethod::Paymaya))
            .await
            .unwrap();

        step_seconds(&f.clock, 121).await;

        assert_eq!(f.orchestrator.state(), FlowState::Expired);
        assert!(f.orchestrator.countdown().is_none());
        assert!(f.orchestrator.state().reservation().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_in_redirect_releases_and_readies_a_fresh_attempt() {
        let f = fixture().await;
        let first = reservation(&f.clock, Some("https://pay.example"), Some("pm-1"));
        let first_id = first.appointment_request_id;
        f.api.book_responses.lock().unwrap().push_back(first);

        f.orchestrator
            .submit(form(&f, PaymentMethod::Paymaya))
            .await
            .unwrap();
        f.orchestrator.cancel().await;

        assert_eq!(f.orchestrator.state(), FlowState::Form);
        assert!(f.orchestrator.countdown().is_none());
        assert_eq!(*f.api.cancel_calls.lock().unwrap(), vec![first_id]);

        // A fresh booking goes through from a clean slate.
        f.api.book_responses.lock().unwrap().push_back(reservation(
            &f.clock,
            Some("https://pay.example/second"),
            Some("pm-2"),
        ));
        let state = f
            .orchestrator
            .submit(form(&f, PaymentMethod::Paymaya))
            .await
            .unwrap();
        assert!(matches!(state, FlowState::AwaitingRedirect { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn second_submission_is_blocked_while_one_is_live() {
        let f = fixture().await;
        f.api.book_responses.lock().unwrap().push_back(reservation(
            &f.clock,
            Some("https://pay.example"),
            Some("pm-1"),
        ));

        f.orchestrator
            .submit(form(&f, PaymentMethod::Paymaya))
            .await
            .unwrap();
        let err = f
            .orchestrator
            .submit(form(&f, PaymentMethod::Paymaya))
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::BookingInProgress));
        assert_eq!(f.api.book_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unresolvable_slot_fails_fast_without_network() {
        let f = fixture().await;

        let mut bad_form = form(&f, PaymentMethod::Paymaya);
        bad_form.slot_start = f.slot_start + Duration::minutes(7);
        let err = f.orchestrator.submit(bad_form).await.unwrap_err();

        assert!(matches!(err, BookingError::Validation(_)));
        assert_eq!(f.api.book_calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.orchestrator.state(), FlowState::Form);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_failure_releases_the_retained_reservation() {
        let f = fixture().await;
        let rejected = reservation(&f.clock, None, Some("pm-1"));
        let rejected_id = rejected.appointment_request_id;
        f.api.book_responses.lock().unwrap().push_back(rejected);

        f.orchestrator
            .submit(form(&f, PaymentMethod::Paymaya))
            .await
            .unwrap();
        assert!(matches!(f.orchestrator.state(), FlowState::Failed { .. }));

        f.orchestrator.retry().await;
        assert_eq!(f.orchestrator.state(), FlowState::Form);
        assert_eq!(*f.api.cancel_calls.lock().unwrap(), vec![rejected_id]);
    }
}
