//! Hosted-checkout payment gateway
//!
//! The gateway REST API is called directly with `reqwest` (no SDK). A
//! preference is created for the draft order; the customer is redirected to
//! its checkout page and the outcome arrives later as a webhook.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::order::{AttemptStatus, PaymentMethod};
use thiserror::Error;

use super::{Initiation, OrderDraft, PaymentStrategy};
use crate::core::config::GatewayConfig;
use crate::orders::{CommerceError, CommerceResult};

/// Attempts per preference (first try + one retry)
const MAX_ATTEMPTS: u32 = 2;
/// Pause before the retry
const RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceItem {
    pub id: String,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

/// Body of `POST /checkout/preferences`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRequest {
    /// Our order id, echoed back in notifications
    pub external_reference: String,
    pub items: Vec<PreferenceItem>,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub back_urls: BackUrls,
    pub notification_url: String,
}

impl PreferenceRequest {
    pub fn for_draft(draft: &OrderDraft, public_base_url: &str) -> Self {
        let base = public_base_url.trim_end_matches('/');
        let back = |outcome: &str| format!("{}/checkout/{}?order={}", base, outcome, draft.order_id);
        Self {
            external_reference: draft.order_id.clone(),
            items: draft
                .items
                .iter()
                .map(|item| PreferenceItem {
                    id: item.product_id.clone(),
                    title: item.name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
            shipping_cost: draft.totals.shipping_cost,
            total: draft.totals.total,
            back_urls: BackUrls {
                success: back("success"),
                failure: back("failure"),
                pending: back("pending"),
            },
            notification_url: format!("{}/api/payments/webhook", base),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceResponse {
    #[serde(alias = "id")]
    pub preference_id: String,
    #[serde(alias = "init_point")]
    pub redirect_url: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("gateway returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Transport failures and 5xx are worth one more try; 4xx are not
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Timeout | GatewayError::Transport(_) => true,
            GatewayError::Status { status, .. } => *status >= 500,
            GatewayError::InvalidResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::InvalidResponse(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<PreferenceResponse, GatewayError>;
}

/// REST client for the gateway
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl HttpPaymentGateway {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    /// `None` when no gateway URL is configured
    pub fn from_config(config: &GatewayConfig) -> Result<Option<Self>, GatewayError> {
        match &config.base_url {
            Some(url) => Self::new(
                url.clone(),
                config.access_token.clone(),
                Duration::from_millis(config.timeout_ms),
            )
            .map(Some),
            None => Ok(None),
        }
    }

    async fn post_once(
        &self,
        request: &PreferenceRequest,
    ) -> Result<PreferenceResponse, GatewayError> {
        let resp = self
            .client
            .post(format!("{}/checkout/preferences", self.base_url))
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let preference: PreferenceResponse = resp.json().await?;
        if preference.preference_id.is_empty() || preference.redirect_url.is_empty() {
            return Err(GatewayError::InvalidResponse(
                "missing preference id or redirect url".into(),
            ));
        }
        Ok(preference)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<PreferenceResponse, GatewayError> {
        let mut attempt = 1;
        loop {
            match self.post_once(request).await {
                Ok(preference) => return Ok(preference),
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        order_id = %request.external_reference,
                        attempt,
                        error = %e,
                        "Gateway preference failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

pub struct GatewayStrategy {
    gateway: Arc<dyn PaymentGateway>,
    public_base_url: String,
}

impl GatewayStrategy {
    pub fn new(gateway: Arc<dyn PaymentGateway>, public_base_url: impl Into<String>) -> Self {
        Self {
            gateway,
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait]
impl PaymentStrategy for GatewayStrategy {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Gateway
    }

    async fn initiate(&self, draft: &OrderDraft) -> CommerceResult<Initiation> {
        let request = PreferenceRequest::for_draft(draft, &self.public_base_url);
        let preference = self
            .gateway
            .create_preference(&request)
            .await
            .map_err(|e| {
                tracing::error!(order_id = %draft.order_id, error = %e, "Gateway preference failed");
                CommerceError::GatewayUnavailable(e.to_string())
            })?;

        tracing::info!(
            order_id = %draft.order_id,
            preference_id = %preference.preference_id,
            "Gateway preference created"
        );
        Ok(Initiation {
            reference: Some(preference.preference_id),
            attempt_status: AttemptStatus::Initiated,
            redirect_url: Some(preference.redirect_url),
        })
    }
}
