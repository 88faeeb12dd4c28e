// src/services/payment_service.rs
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing;

use crate::{
    errors::DispatchError as AppError,
    models::{trip::PaymentMethod, user::{Balance, Card}},
    store::Database,
    utils::id_generator::{IdGenerator, IdType},
};

/// Card charges go out to the processor through this seam.
#[async_trait]
pub trait CardGateway: Send + Sync {
    async fn charge_card(&self, card: &Card, amount: i64) -> Result<serde_json::Value, AppError>;
}

pub struct HttpCardGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl HttpCardGateway {
    pub fn new(base_url: &str, secret_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }
}

#[async_trait]
impl CardGateway for HttpCardGateway {
    async fn charge_card(&self, card: &Card, amount: i64) -> Result<serde_json::Value, AppError> {
        tracing::info!("Charging card ending {} for {}", card.last_four, amount);

        let response = self
            .client
            .post(format!("{}/charges", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&json!({
                "token": card.token,
                "amount": amount,
                "reference": IdGenerator::generate(IdType::Payment),
            }))
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("card charge failed - {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            tracing::warn!("Card charge declined: {}", error_text);
            return Err(AppError::payment(format!("card charge declined - {}", error_text)));
        }

        let receipt: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::upstream(format!("card charge failed - {}", e)))?;
        Ok(receipt)
    }
}

// Mock gateways for development and testing
pub struct ApprovingCardGateway;

#[async_trait]
impl CardGateway for ApprovingCardGateway {
    async fn charge_card(&self, card: &Card, amount: i64) -> Result<serde_json::Value, AppError> {
        tracing::info!("[MOCK] Approving card charge of {} on card ending {}", amount, card.last_four);
        Ok(json!({
            "reference": IdGenerator::generate(IdType::Payment),
            "amount": amount,
            "card": card.last_four,
            "status": "approved",
        }))
    }
}

pub struct DecliningCardGateway;

#[async_trait]
impl CardGateway for DecliningCardGateway {
    async fn charge_card(&self, card: &Card, amount: i64) -> Result<serde_json::Value, AppError> {
        tracing::info!("[MOCK] Declining card charge of {} on card ending {}", amount, card.last_four);
        Err(AppError::payment("card charge declined - insufficient funds".to_string()))
    }
}

#[async_trait]
pub trait PaymentOperations: Send + Sync {
    async fn charge(
        &self,
        user_id: &str,
        amount: i64,
        method: &PaymentMethod,
    ) -> Result<serde_json::Value, AppError>;
    async fn get_balance(&self, user_id: &str) -> Result<Balance, AppError>;
    async fn default_card(&self, user_id: &str) -> Result<Option<Card>, AppError>;
}

pub struct PaymentService {
    db: Arc<Database>,
    card_gateway: Arc<dyn CardGateway>,
}

impl PaymentService {
    pub fn new(db: Arc<Database>, card_gateway: Arc<dyn CardGateway>) -> Self {
        Self { db, card_gateway }
    }
}

#[async_trait]
impl PaymentOperations for PaymentService {
    async fn charge(
        &self,
        user_id: &str,
        amount: i64,
        method: &PaymentMethod,
    ) -> Result<serde_json::Value, AppError> {
        tracing::info!("Charging user {} amount {} via {:?}", user_id, amount, method);

        match method {
            PaymentMethod::RulBalance => {
                // Conditional debit, so a concurrent charge can never
                // push the balance negative
                let debited = self
                    .db
                    .balances
                    .update_one(
                        |b| b.user_id == user_id && !b.deleted && b.amount >= amount,
                        |b| {
                            b.amount -= amount;
                            b.updated_at = Utc::now();
                        },
                    )
                    .await;

                match debited {
                    Some(balance) => Ok(json!({
                        "reference": IdGenerator::generate(IdType::Payment),
                        "method": "RUL_BALANCE",
                        "amount": amount,
                        "remaining": balance.amount,
                    })),
                    None => Err(AppError::payment("insufficient funds in RUL balance".to_string())),
                }
            }

            PaymentMethod::Cash => Ok(json!({
                "reference": IdGenerator::generate(IdType::Payment),
                "method": "CASH",
                "amount": amount,
                "instruction": "Give the driver cash",
            })),

            PaymentMethod::Card => {
                let card = self
                    .default_card(user_id)
                    .await?
                    .ok_or_else(|| AppError::payment("no/invalid card setup".to_string()))?;
                let receipt = self.card_gateway.charge_card(&card, amount).await?;
                Ok(json!({
                    "method": "CARD",
                    "amount": amount,
                    "provider": receipt,
                }))
            }
        }
    }

    async fn get_balance(&self, user_id: &str) -> Result<Balance, AppError> {
        if let Some(balance) = self
            .db
            .balances
            .find_one(|b| b.user_id == user_id && !b.deleted)
            .await
        {
            return Ok(balance);
        }

        // First touch opens an empty account
        let balance = Balance {
            id: IdGenerator::generate(IdType::Payment),
            user_id: user_id.to_string(),
            amount: 0,
            deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.db.balances.insert(&balance.id, balance.clone()).await;
        tracing::debug!("Opened RUL balance for user {}", user_id);
        Ok(balance)
    }

    async fn default_card(&self, user_id: &str) -> Result<Option<Card>, AppError> {
        Ok(self
            .db
            .cards
            .find_one(|c| c.user_id == user_id && c.is_default && !c.deleted)
            .await)
    }
}
