//! Snapshot fetched from an HTTP gateway in front of the chain RPC

use super::SnapshotSource;
use crate::error::{CacheError, CacheResult};
use crate::types::Order;
use async_trait::async_trait;
use reqwest::Client;

/// GETs `{base_url}?programId=..&commitment=..` and expects a JSON array of orders
pub struct HttpSnapshotSource {
    client: Client,
    base_url: String,
    program_id: String,
    commitment: String,
}

impl HttpSnapshotSource {
    pub fn new(base_url: &str, program_id: &str, commitment: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            program_id: program_id.to_string(),
            commitment: commitment.to_string(),
        }
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch_all_open_orders(&self) -> CacheResult<Vec<Order>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("programId", self.program_id.as_str()),
                ("commitment", self.commitment.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CacheError::SnapshotFetch(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CacheError::SnapshotFetch(format!("{}: {}", status, error_text)));
        }

        response
            .json::<Vec<Order>>()
            .await
            .map_err(|e| CacheError::SnapshotFetch(e.to_string()))
    }
}
