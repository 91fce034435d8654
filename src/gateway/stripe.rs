use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{IntentStatus, PaymentGateway, PaymentIntent};
use crate::error::{AppError, AppResult};

/// Stripe REST client for payment intents.
#[derive(Clone)]
pub struct StripeGateway {
    secret_key: String,
    api_base: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    status: String,
    #[serde(default)]
    client_secret: Option<String>,
}

impl StripeGateway {
    pub fn new(secret_key: String, api_base: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn read_intent(response: reqwest::Response) -> AppResult<IntentResponse> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!(%status, "stripe API error: {}", error_text);
            return Err(AppError::Gateway(format!("stripe returned {status}")));
        }

        response
            .json::<IntentResponse>()
            .await
            .map_err(|e| AppError::Gateway(format!("unreadable stripe response: {e}")))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, metadata))]
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
        metadata: HashMap<String, String>,
        idempotency_key: &str,
    ) -> AppResult<PaymentIntent> {
        let mut params: Vec<(String, String)> = vec![
            ("amount".to_string(), amount.to_string()),
            ("currency".to_string(), currency.to_string()),
        ];
        for (key, value) in metadata {
            params.push((format!("metadata[{key}]"), value));
        }

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", idempotency_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("stripe request failed: {e}")))?;

        let intent = Self::read_intent(response).await?;
        let client_secret = intent
            .client_secret
            .ok_or_else(|| AppError::Gateway("stripe intent has no client secret".into()))?;

        info!(intent_id = %intent.id, "payment intent created");
        Ok(PaymentIntent {
            intent_id: intent.id,
            client_secret,
        })
    }

    #[instrument(skip(self))]
    async fn payment_intent_status(&self, intent_id: &str) -> AppResult<IntentStatus> {
        let response = self
            .client
            .get(format!("{}/v1/payment_intents/{intent_id}", self.api_base))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("stripe request failed: {e}")))?;

        let intent = Self::read_intent(response).await?;
        Ok(IntentStatus::from_gateway(&intent.status))
    }
}
