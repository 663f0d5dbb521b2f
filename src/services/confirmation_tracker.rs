//! Per-intent payment status with at-most-once confirmation.
//!
//! Every status change for an intent happens under that intent's mutex, so a
//! webhook and a polling verify racing on the same intent serialize and only
//! one of them observes the pending→paid transition.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::payments::error::PaymentError;
use crate::payments::types::{
    CoinMetadata, ConfirmationEvent, IntentStatus, Money, PaymentConfirmed, PaymentIntent,
    PaymentMethod,
};

pub const DEFAULT_INTENT_EXPIRY: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub intent_expiry: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            intent_expiry: DEFAULT_INTENT_EXPIRY,
        }
    }
}

impl TrackerConfig {
    pub fn from_env() -> Self {
        Self {
            intent_expiry: std::env::var("INTENT_EXPIRY_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_INTENT_EXPIRY),
        }
    }
}

type IntentCell = Arc<Mutex<PaymentIntent>>;

pub struct ConfirmationTracker {
    intents: RwLock<HashMap<String, IntentCell>>,
    /// Transaction hash to the intent it paid for.
    claimed_transactions: Mutex<HashMap<String, String>>,
    expiry: chrono::Duration,
}

impl ConfirmationTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            intents: RwLock::new(HashMap::new()),
            claimed_transactions: Mutex::new(HashMap::new()),
            expiry: chrono::Duration::from_std(config.intent_expiry)
                .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_INTENT_EXPIRY.as_secs() as i64)),
        }
    }

    /// Starts tracking a freshly created intent. An existing record is kept as is.
    pub async fn register(&self, intent: PaymentIntent) -> PaymentIntent {
        let mut intents = self.intents.write().await;
        let cell = intents
            .entry(intent.intent_id.clone())
            .or_insert_with(|| {
                debug!(intent_id = %intent.intent_id, "registering payment intent");
                Arc::new(Mutex::new(intent))
            })
            .clone();
        drop(intents);
        let snapshot = cell.lock().await.clone();
        snapshot
    }

    async fn cell(&self, intent_id: &str) -> Option<IntentCell> {
        self.intents.read().await.get(intent_id).cloned()
    }

    async fn cell_or_create(&self, intent_id: &str, method: Option<PaymentMethod>) -> IntentCell {
        if let Some(cell) = self.cell(intent_id).await {
            return cell;
        }
        let mut intents = self.intents.write().await;
        intents
            .entry(intent_id.to_string())
            .or_insert_with(|| {
                debug!(intent_id = %intent_id, "lazily creating payment intent");
                Arc::new(Mutex::new(PaymentIntent::pending(intent_id, method, None, None)))
            })
            .clone()
    }

    fn expire_if_stale(&self, intent: &mut PaymentIntent, now: DateTime<Utc>) {
        if intent.status == IntentStatus::Pending && now - intent.created_at >= self.expiry {
            info!(intent_id = %intent.intent_id, "payment intent expired");
            intent.status = IntentStatus::Expired;
            intent.updated_at = now;
        }
    }

    /// Applies one status change; leaving `paid` is refused.
    fn transition(
        intent: &mut PaymentIntent,
        target: IntentStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, PaymentError> {
        match (intent.status, target) {
            (IntentStatus::Paid, IntentStatus::Paid) => Ok(false),
            (IntentStatus::Paid, _) => Err(PaymentError::AlreadyFinalized {
                intent_id: intent.intent_id.clone(),
            }),
            (IntentStatus::Pending, next) => {
                intent.status = next;
                intent.updated_at = now;
                Ok(true)
            }
            (_, _) => Ok(false),
        }
    }

    pub async fn record_result(
        &self,
        intent_id: &str,
        paid: bool,
        amount: Option<Money>,
        metadata: Option<CoinMetadata>,
    ) -> Option<PaymentConfirmed> {
        self.record_at(intent_id, None, paid, amount, metadata, Utc::now())
            .await
    }

    pub async fn record_event(&self, event: &ConfirmationEvent) -> Option<PaymentConfirmed> {
        self.record_at(
            &event.intent_id,
            Some(event.method),
            event.paid,
            event.amount.clone(),
            event.metadata.clone(),
            Utc::now(),
        )
        .await
    }

    /// Records a paid on-chain transfer. The transaction hash is bound to
    /// the intent only when this call moves it from pending to paid, and a
    /// hash already bound to another intent is refused.
    pub async fn record_transfer(
        &self,
        event: &ConfirmationEvent,
        tx_hash: &str,
    ) -> Result<Option<PaymentConfirmed>, PaymentError> {
        self.record_transfer_at(event, tx_hash, Utc::now()).await
    }

    pub(crate) async fn record_transfer_at(
        &self,
        event: &ConfirmationEvent,
        tx_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentConfirmed>, PaymentError> {
        self.apply(
            &event.intent_id,
            Some(event.method),
            event.paid,
            event.amount.clone(),
            event.metadata.clone(),
            Some(tx_hash),
            now,
        )
        .await
    }

    pub(crate) async fn record_at(
        &self,
        intent_id: &str,
        method: Option<PaymentMethod>,
        paid: bool,
        amount: Option<Money>,
        metadata: Option<CoinMetadata>,
        now: DateTime<Utc>,
    ) -> Option<PaymentConfirmed> {
        // Without a transaction hash there is no claim to refuse.
        self.apply(intent_id, method, paid, amount, metadata, None, now)
            .await
            .ok()
            .flatten()
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply(
        &self,
        intent_id: &str,
        method: Option<PaymentMethod>,
        paid: bool,
        amount: Option<Money>,
        metadata: Option<CoinMetadata>,
        tx_hash: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentConfirmed>, PaymentError> {
        let cell = self.cell_or_create(intent_id, method).await;
        let mut intent = cell.lock().await;
        self.expire_if_stale(&mut intent, now);

        // Lock order is always intent, then claims.
        let claim_key = tx_hash
            .filter(|_| paid && intent.status == IntentStatus::Pending)
            .map(|hash| hash.trim().to_lowercase());
        let mut claims = match &claim_key {
            Some(key) => {
                let claims = self.claimed_transactions.lock().await;
                if let Some(owner) = claims.get(key).filter(|owner| *owner != intent_id) {
                    warn!(intent_id = %intent_id, tx_hash = %key, owner = %owner, "transaction already pays another intent");
                    return Err(PaymentError::TransactionAlreadyClaimed {
                        tx_hash: key.clone(),
                        intent_id: owner.clone(),
                    });
                }
                Some(claims)
            }
            None => None,
        };

        let target = if paid {
            IntentStatus::Paid
        } else {
            IntentStatus::Failed
        };
        match Self::transition(&mut intent, target, now) {
            Ok(true) => {
                if let (Some(claims), Some(key)) = (claims.as_mut(), claim_key) {
                    claims.insert(key.clone(), intent_id.to_string());
                    intent.transaction_hash = Some(key);
                }
                if intent.method.is_none() {
                    intent.method = method;
                }
                if intent.amount.is_none() {
                    intent.amount = amount;
                }
                // Metadata is immutable once attached.
                if intent.metadata.is_none() {
                    intent.metadata = metadata;
                }
                if !paid {
                    info!(intent_id = %intent_id, "payment intent failed");
                    return Ok(None);
                }
                info!(intent_id = %intent_id, "payment intent confirmed");
                Ok(Some(PaymentConfirmed {
                    intent_id: intent.intent_id.clone(),
                    metadata: intent.metadata.clone(),
                    amount: intent.amount.clone(),
                    confirmed_at: now,
                }))
            }
            Ok(false) => {
                match (intent.status, paid) {
                    (IntentStatus::Paid, true) => {
                        debug!(intent_id = %intent_id, "duplicate payment confirmation suppressed")
                    }
                    (IntentStatus::Expired, true) | (IntentStatus::Failed, true) => warn!(
                        intent_id = %intent_id,
                        status = ?intent.status,
                        "payment reported for a closed intent; operator action required"
                    ),
                    _ => debug!(intent_id = %intent_id, status = ?intent.status, "no status change"),
                }
                Ok(None)
            }
            Err(e) => {
                debug!(intent_id = %intent_id, reason = %e, "ignoring failure signal for paid intent");
                Ok(None)
            }
        }
    }

    /// Applies expiry to a tracked intent and returns its status.
    pub async fn touch(&self, intent_id: &str) -> Option<IntentStatus> {
        self.touch_at(intent_id, Utc::now()).await
    }

    pub(crate) async fn touch_at(&self, intent_id: &str, now: DateTime<Utc>) -> Option<IntentStatus> {
        let cell = self.cell(intent_id).await?;
        let mut intent = cell.lock().await;
        self.expire_if_stale(&mut intent, now);
        Some(intent.status)
    }

    pub async fn status_of(&self, intent_id: &str) -> Option<IntentStatus> {
        let cell = self.cell(intent_id).await?;
        let status = cell.lock().await.status;
        Some(status)
    }

    pub async fn get(&self, intent_id: &str) -> Option<PaymentIntent> {
        let cell = self.cell(intent_id).await?;
        let intent = cell.lock().await.clone();
        Some(intent)
    }

    /// Intent a transaction hash has paid for, if any.
    pub async fn transaction_owner(&self, tx_hash: &str) -> Option<String> {
        self.claimed_transactions
            .lock()
            .await
            .get(&tx_hash.trim().to_lowercase())
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.intents.read().await.len()
    }
}

impl Default for ConfirmationTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
