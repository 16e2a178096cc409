use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::ServiceError;
use crate::services::invoice::InvoicePayload;
use crate::services::stripe::PLACEHOLDER_CREDENTIAL;

#[derive(Debug, Deserialize)]
struct TransmissionResponse {
    transmission_id: String,
}

/// Client for the e-invoicing gateway. With the placeholder client id the
/// transmission id is synthesized locally and no network call is made.
#[derive(Clone)]
pub struct InvoiceNowClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    base_url: String,
    timeout: Duration,
}

impl InvoiceNowClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: config.invoicenow_client_id.clone(),
            client_secret: config.invoicenow_client_secret.clone(),
            base_url: config.invoicenow_base_url.clone(),
            timeout: Duration::from_secs(config.http_timeout_secs),
        }
    }

    pub async fn send(&self, payload: &InvoicePayload) -> Result<String, ServiceError> {
        if self.client_id == PLACEHOLDER_CREDENTIAL {
            log::info!(
                "mocking invoice transmission for {}",
                payload.invoice_number
            );
            return Ok(format!("MOCK-{}", Uuid::new_v4().simple()));
        }

        let response = self
            .http
            .post(format!("{}/invoices", self.base_url))
            .timeout(self.timeout)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Provider(format!(
                "invoicenow provider error: {}",
                body
            )));
        }

        Ok(response
            .json::<TransmissionResponse>()
            .await?
            .transmission_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::invoice::{CustomerParty, PayloadTotals, SupplierParty};

    fn payload() -> InvoicePayload {
        InvoicePayload {
            invoice_number: "KC-2026-ABCD1234".to_string(),
            issue_date: "2026-08-07".to_string(),
            supplier: SupplierParty {
                uen: "201812345K".to_string(),
                gst_reg: "M9-0012345-6".to_string(),
                name: "Kopi Collective Roastery Pte. Ltd.".to_string(),
            },
            customer: CustomerParty {
                email: Some("buyer@example.com".to_string()),
            },
            totals: PayloadTotals {
                subtotal: 100.0,
                gst: 9.0,
                total: 109.0,
                currency: "SGD".to_string(),
            },
            items: vec![],
        }
    }

    #[tokio::test]
    async fn placeholder_client_synthesizes_transmission_id() {
        let client = InvoiceNowClient::new(&AppConfig::defaults(""));

        let transmission_id = client.send(&payload()).await.unwrap();

        assert!(transmission_id.starts_with("MOCK-"));
        assert!(transmission_id.len() > "MOCK-".len());
    }
}
