use async_trait::async_trait;
use reqwest::multipart;
use reqwest::{Client, RequestBuilder};
use tracing::warn;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{BookingError, decode_error_body};
use crate::models::{
    BookingRequest, Doctor, DoctorScheduleResponse, PaymentStatus, PaymentStatusResponse,
    ReservationState,
};

/// The clinic backend as seen from the booking flow. One method per consumed
/// endpoint; tests substitute a scripted implementation.
#[async_trait]
pub trait BookingApi: Send + Sync {
    async fn list_doctors(&self) -> Result<Vec<Doctor>, BookingError>;

    async fn doctor_schedule(
        &self,
        doctor_id: Uuid,
    ) -> Result<DoctorScheduleResponse, BookingError>;

    /// POST /appointments/book/ — creates a server-side reservation with an
    /// expiry and, for hosted checkout, a redirect URL.
    async fn book(&self, request: &BookingRequest) -> Result<ReservationState, BookingError>;

    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatus, BookingError>;

    /// Best-effort; callers log failures instead of surfacing them.
    async fn cancel_reservation(
        &self,
        appointment_request_id: Uuid,
    ) -> Result<(), BookingError>;

    async fn upload_gcash_proof(
        &self,
        appointment_request_id: Uuid,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), BookingError>;
}

pub struct HttpApi {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpApi {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        }
    }

    pub fn set_access_token(&mut self, token: Option<String>) {
        self.access_token = token.filter(|t| !t.is_empty());
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the bearer token, short-circuiting before any network traffic
    /// when the session has none.
    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, BookingError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(BookingError::NotAuthenticated)?;
        Ok(builder.bearer_auth(token))
    }

    async fn send_checked(
        &self,
        builder: RequestBuilder,
    ) -> Result<reqwest::Response, BookingError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(decode_error_body(status.as_u16(), &body))
    }
}

#[async_trait]
impl BookingApi for HttpApi {
    async fn list_doctors(&self) -> Result<Vec<Doctor>, BookingError> {
        let builder = self
            .client
            .get(self.url("/user/users/"))
            .query(&[("role", "doctor")]);
        let response = self.send_checked(self.authorized(builder)?).await?;
        Ok(response.json().await?)
    }

    async fn doctor_schedule(
        &self,
        doctor_id: Uuid,
    ) -> Result<DoctorScheduleResponse, BookingError> {
        let builder = self
            .client
            .get(self.url(&format!("/appointment/doctor-schedule/{doctor_id}")));
        let response = self.send_checked(self.authorized(builder)?).await?;
        Ok(response.json().await?)
    }

    async fn book(&self, request: &BookingRequest) -> Result<ReservationState, BookingError> {
        let builder = self.client.post(self.url("/appointments/book/")).json(request);
        let response = self.send_checked(self.authorized(builder)?).await?;
        Ok(response.json().await?)
    }

    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatus, BookingError> {
        let builder = self
            .client
            .get(self.url(&format!("/payments/status/{payment_id}/")));
        let response = self.send_checked(self.authorized(builder)?).await?;
        let payload: PaymentStatusResponse = response.json().await?;

        let status = match payload.raw_status() {
            Some(raw) => {
                let status = PaymentStatus::parse(raw);
                if status == PaymentStatus::Unknown {
                    warn!(raw, "unrecognized payment status; treating as in flight");
                }
                status
            }
            None => {
                warn!("status response carried no status field; treating as in flight");
                PaymentStatus::Unknown
            }
        };
        Ok(status)
    }

    async fn cancel_reservation(
        &self,
        appointment_request_id: Uuid,
    ) -> Result<(), BookingError> {
        let builder = self.client.post(self.url(&format!(
            "/appointment-requests/{appointment_request_id}/cancel/"
        )));
        self.send_checked(self.authorized(builder)?).await?;
        Ok(())
    }

    async fn upload_gcash_proof(
        &self,
        appointment_request_id: Uuid,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), BookingError> {
        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = multipart::Form::new().part("file", part);
        let builder = self
            .client
            .post(self.url(&format!(
                "/appointments/{appointment_request_id}/upload-gcash/"
            )))
            .multipart(form);
        self.send_checked(self.authorized(builder)?).await?;
        Ok(())
    }
}
