mod stripe;
mod stub;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    config::{GatewayKind, PaymentConfig},
    error::AppResult,
};

pub use stripe::StripeGateway;
pub use stub::StubGateway;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentIntent {
    pub intent_id: String,
    pub client_secret: String,
}

/// Lifecycle of an intent as reported by the gateway. Anything we do not act
/// on is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentStatus {
    Succeeded,
    Processing,
    RequiresAction,
    Canceled,
    Other(String),
}

impl IntentStatus {
    pub fn from_gateway(raw: &str) -> Self {
        match raw {
            "succeeded" => Self::Succeeded,
            "processing" => Self::Processing,
            "requires_action" | "requires_payment_method" | "requires_confirmation" => {
                Self::RequiresAction
            }
            "canceled" => Self::Canceled,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Processing => "processing",
            Self::RequiresAction => "requires_action",
            Self::Canceled => "canceled",
            Self::Other(raw) => raw,
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an intent for `amount` minor units. Calls sharing an
    /// `idempotency_key` must yield the same intent.
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
        metadata: HashMap<String, String>,
        idempotency_key: &str,
    ) -> AppResult<PaymentIntent>;

    async fn payment_intent_status(&self, intent_id: &str) -> AppResult<IntentStatus>;
}

pub fn build_gateway(config: &PaymentConfig) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    match config.gateway {
        GatewayKind::Stub => Ok(Arc::new(StubGateway::default())),
        GatewayKind::Stripe => {
            let secret_key = config
                .stripe_secret_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("STRIPE_SECRET_KEY is not set"))?;
            let gateway =
                StripeGateway::new(secret_key, config.stripe_api_base.clone(), config.timeout)?;
            Ok(Arc::new(gateway))
        }
    }
}
