use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::ServiceError;

type HmacSha256 = Hmac<Sha256>;

/// Signatures older (or newer) than this are rejected to limit replay.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// The sentinel secret that switches outbound calls into local mock mode.
pub const PLACEHOLDER_CREDENTIAL: &str = "placeholder";

/// The processor's record of an in-progress charge attempt, reduced to the
/// fields this system consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: StripeEventObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventObject {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    base_url: String,
    timeout: Duration,
}

impl StripeClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: config.stripe_secret_key.clone(),
            webhook_secret: config.stripe_webhook_secret.clone(),
            base_url: config.stripe_base_url.clone(),
            timeout: Duration::from_secs(config.http_timeout_secs),
        }
    }

    /// Create a payment intent for an inclusive total, tagged with the order
    /// and reservation group so the webhook can reconcile it later. With the
    /// placeholder secret the intent is synthesized locally.
    pub async fn create_payment_intent(
        &self,
        order_id: Uuid,
        amount_cents: i64,
        currency: &str,
        reservation_group_id: Uuid,
    ) -> Result<PaymentIntent, ServiceError> {
        if self.secret_key == PLACEHOLDER_CREDENTIAL {
            let id = format!("pi_mock_{}", Uuid::new_v4().simple());
            let client_secret = format!("{}_secret_{}", id, Uuid::new_v4().simple());
            return Ok(PaymentIntent { id, client_secret });
        }

        let params = [
            ("amount", amount_cents.to_string()),
            ("currency", currency.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("metadata[order_id]", order_id.to_string()),
            (
                "metadata[reservation_group_id]",
                reservation_group_id.to_string(),
            ),
        ];

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.base_url))
            .timeout(self.timeout)
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Provider(format!(
                "payment intent creation failed: {}",
                body
            )));
        }

        Ok(response.json::<PaymentIntent>().await?)
    }

    pub fn verify_webhook_signature(&self, payload: &[u8], signature_header: &str) -> bool {
        verify_signature(
            payload,
            signature_header,
            &self.webhook_secret,
            Utc::now().timestamp(),
        )
    }
}

/// Verify a `t=<unix>,v1=<hex hmac>` header over `"{t}.{payload}"` with
/// HMAC-SHA256. Any of the `v1` candidates may match; the timestamp must be
/// within the replay tolerance.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now_ts: i64) -> bool {
    let mut timestamp: Option<&str> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };
    let Ok(ts) = timestamp.parse::<i64>() else {
        return false;
    };
    if (now_ts - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return false;
    }

    for candidate in candidates {
        let Ok(decoded) = hex::decode(candidate) else {
            continue;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(&decoded).is_ok() {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_valid_signature() {
        let payload = b"{\"type\":\"payment_intent.succeeded\"}";
        let now = Utc::now().timestamp();
        let header = format!("t={},v1={}", now, sign(payload, SECRET, now));

        assert!(verify_signature(payload, &header, SECRET, now));
    }

    #[test]
    fn rejects_wrong_secret() {
        let payload = b"{\"type\":\"payment_intent.succeeded\"}";
        let now = Utc::now().timestamp();
        let header = format!("t={},v1={}", now, sign(payload, "wrong_secret", now));

        assert!(!verify_signature(payload, &header, SECRET, now));
    }

    #[test]
    fn rejects_modified_payload() {
        let payload = b"{\"type\":\"payment_intent.succeeded\"}";
        let tampered = b"{\"type\":\"payment_intent.succeeded\",\"amount\":0}";
        let now = Utc::now().timestamp();
        let header = format!("t={},v1={}", now, sign(payload, SECRET, now));

        assert!(!verify_signature(tampered, &header, SECRET, now));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let payload = b"{}";
        let now = Utc::now().timestamp();
        let stale = now - SIGNATURE_TOLERANCE_SECS - 60;
        let header = format!("t={},v1={}", stale, sign(payload, SECRET, stale));

        assert!(!verify_signature(payload, &header, SECRET, now));
    }

    #[test]
    fn rejects_missing_timestamp_and_garbage() {
        let payload = b"{}";
        let now = Utc::now().timestamp();

        assert!(!verify_signature(
            payload,
            &format!("v1={}", sign(payload, SECRET, now)),
            SECRET,
            now
        ));
        assert!(!verify_signature(payload, "", SECRET, now));
        assert!(!verify_signature(payload, "t=abc,v1=zz", SECRET, now));
    }

    #[test]
    fn accepts_any_matching_v1_candidate() {
        let payload = b"{}";
        let now = Utc::now().timestamp();
        let header = format!(
            "t={},v1={},v1={}",
            now,
            "00".repeat(32),
            sign(payload, SECRET, now)
        );

        assert!(verify_signature(payload, &header, SECRET, now));
    }

    #[test]
    fn parses_event_with_metadata() {
        let raw = r#"{
            "id": "evt_123",
            "type": "payment_intent.succeeded",
            "data": {
                "object": {
                    "id": "pi_123",
                    "metadata": {
                        "order_id": "7f8dd5f2-2b0c-4cc1-b0f5-1f5ecb0c1111",
                        "reservation_group_id": "a7a9ffb0-9f5e-4d62-bb5e-36a4f52e2222"
                    }
                }
            }
        }"#;

        let event: StripeEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.id, "evt_123");
        assert_eq!(event.event_type, "payment_intent.succeeded");
        assert_eq!(event.data.object.id, "pi_123");
        assert_eq!(
            event.data.object.metadata.get("reservation_group_id").unwrap(),
            "a7a9ffb0-9f5e-4d62-bb5e-36a4f52e2222"
        );
    }

    #[test]
    fn parses_event_without_metadata() {
        let raw = r#"{"id":"evt_9","type":"charge.refunded","data":{"object":{"id":"ch_1"}}}"#;

        let event: StripeEvent = serde_json::from_str(raw).unwrap();
        assert!(event.data.object.metadata.is_empty());
    }

    #[tokio::test]
    async fn placeholder_secret_synthesizes_intent_locally() {
        let client = StripeClient::new(&AppConfig::defaults(""));

        let intent = client
            .create_payment_intent(Uuid::new_v4(), 10900, "sgd", Uuid::new_v4())
            .await
            .unwrap();

        assert!(intent.id.starts_with("pi_mock_"));
        assert!(intent.client_secret.contains("_secret_"));
    }
}
