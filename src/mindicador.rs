use crate::config::RentRollConfig;
use crate::error::{RentRollError, Result};
use crate::uf::UfQuote;
use log::{info, warn};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Fetches the daily UF value from mindicador.cl.
#[derive(Clone)]
pub struct MindicadorClient {
    client: Client,
    endpoint: String,
}

impl MindicadorClient {
    pub fn new(config: &RentRollConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.uf_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.uf_endpoint.clone(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub async fn fetch_uf(&self) -> Result<UfQuote> {
        let response = self.client.get(&self.endpoint).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("UF request to {} failed with status {}", self.endpoint, status);
            return Err(RentRollError::UfUnavailable(format!(
                "status {}: {}",
                status, error_text
            )));
        }

        let body: Value = response.json().await?;
        let quote = UfQuote::from_mindicador(&body)?;
        info!("Loaded UF quote {} ({:?})", quote.value, quote.date);
        Ok(quote)
    }
}
