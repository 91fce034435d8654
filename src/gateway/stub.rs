use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use uuid::Uuid;

use super::{IntentStatus, PaymentGateway, PaymentIntent};
use crate::error::{AppError, AppResult};

/// In-process gateway for development and tests. Every intent it hands out
/// reports `succeeded`, and a repeated idempotency key returns the first intent.
#[derive(Debug, Default, Clone)]
pub struct StubGateway {
    intents: Arc<Mutex<HashMap<String, PaymentIntent>>>,
}

impl StubGateway {
    pub fn issued(&self) -> usize {
        self.intents.lock().map(|m| m.len()).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_payment_intent(
        &self,
        amount: i64,
        _currency: &str,
        _metadata: HashMap<String, String>,
        idempotency_key: &str,
    ) -> AppResult<PaymentIntent> {
        if amount <= 0 {
            return Err(AppError::Gateway("amount must be positive".into()));
        }

        let mut intents = self
            .intents
            .lock()
            .map_err(|_| AppError::Gateway("stub gateway poisoned".into()))?;
        let intent = intents
            .entry(idempotency_key.to_string())
            .or_insert_with(|| {
                let id = Uuid::new_v4().simple().to_string();
                PaymentIntent {
                    intent_id: format!("pi_stub_{id}"),
                    client_secret: format!("pi_stub_{id}_secret"),
                }
            })
            .clone();
        Ok(intent)
    }

    async fn payment_intent_status(&self, intent_id: &str) -> AppResult<IntentStatus> {
        let intents = self
            .intents
            .lock()
            .map_err(|_| AppError::Gateway("stub gateway poisoned".into()))?;
        if intents.values().any(|i| i.intent_id == intent_id) {
            Ok(IntentStatus::Succeeded)
        } else {
            Err(AppError::Gateway(format!("unknown payment intent {intent_id}")))
        }
    }
}
