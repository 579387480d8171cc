//! One gateway charge per payment request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{PaymentRequested, PaymentResult};

use crate::error::{PaymentError, Result};
use crate::gateway::{ChargeStatus, PaymentGateway};
use crate::model::NewProcessedPayment;
use crate::repository::ProcessedPaymentRepository;

/// Charges payment requests and records their outcome.
///
/// The gateway is called at most once per initiator payment id: a request
/// that was already recorded is answered from the stored row. Gateway
/// failures of any kind (rejections, timeouts, unexpected statuses) are
/// recorded as FAILED payments and never retried here.
#[derive(Clone)]
pub struct PaymentProcessor {
    gateway: Arc<dyn PaymentGateway>,
    repository: Arc<dyn ProcessedPaymentRepository>,
    currency: String,
    gateway_timeout: Duration,
}

impl PaymentProcessor {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        repository: Arc<dyn ProcessedPaymentRepository>,
        currency: impl Into<String>,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            repository,
            currency: currency.into(),
            gateway_timeout,
        }
    }

    /// Processes a request and returns the result to publish.
    ///
    /// Errors are storage failures only; the request can be delivered again.
    #[tracing::instrument(
        skip(self, request),
        fields(order_id = %request.order_id, payment_id = %request.payment_id)
    )]
    pub async fn process(&self, request: &PaymentRequested) -> Result<PaymentResult> {
        if let Some(existing) = self.repository.find_by_request(request.payment_id).await? {
            tracing::info!(
                status = %existing.status,
                "payment request already processed, reporting recorded outcome"
            );
            return Ok(existing.to_result());
        }

        let new = match self.charge(request).await {
            Ok(external_id) => {
                NewProcessedPayment::succeeded(request, &self.currency, external_id)
            }
            Err(reason) => {
                tracing::warn!(%reason, "payment failed");
                NewProcessedPayment::failed(request, &self.currency, reason)
            }
        };

        let payment = match self.repository.insert(new).await {
            Ok(payment) => payment,
            // A concurrent delivery of the same request won the insert.
            Err(PaymentError::Duplicate(id)) => self
                .repository
                .find_by_request(id)
                .await?
                .ok_or(PaymentError::Duplicate(id))?,
            Err(e) => {
                tracing::error!(error = %e, "charge outcome could not be recorded");
                return Err(e);
            }
        };

        metrics::counter!("payments_processed_total", "status" => payment.status.as_str())
            .increment(1);
        tracing::info!(
            status = %payment.status,
            external_payment_id = payment.external_payment_id.as_deref().unwrap_or(""),
            "payment processed"
        );
        Ok(payment.to_result())
    }

    /// Makes the single gateway call. Returns the external id on success and
    /// the failure message otherwise.
    async fn charge(&self, request: &PaymentRequested) -> std::result::Result<String, String> {
        if !request.amount.is_positive() {
            return Err(format!("invalid amount {}", request.amount));
        }
        let amount_minor = request
            .amount
            .to_minor_units()
            .ok_or_else(|| format!("amount {} out of range", request.amount))?;

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.gateway_timeout,
            self.gateway
                .charge(amount_minor, &self.currency, &request.payment_token),
        )
        .await;
        metrics::histogram!("gateway_charge_duration_seconds").record(started.elapsed().as_secs_f64());

        match outcome {
            Err(_) => Err(format!(
                "gateway timed out after {}ms",
                self.gateway_timeout.as_millis()
            )),
            Ok(Err(e)) => Err(e.to_string()),
            Ok(Ok(charge)) if charge.status == ChargeStatus::Succeeded => Ok(charge.external_id),
            Ok(Ok(charge)) => Err(format!("charge ended with status {}", charge.status)),
        }
    }
}
