//! HTTP implementation of the ledger seams against an indexer backend.
//!
//! The backend exposes pinned read views: `GET /view` returns an opaque
//! view token, and every view-scoped read repeats that token so the
//! backend serves it from one snapshot. That is what makes the count,
//! the recently-confirmed window, and the page of one listing mutually
//! consistent even while ingestion keeps writing.
//!
//! Endpoints used:
//! - `GET  /view`                                   -> `{ "view": u64 }`
//! - `GET  /view/{v}/mempool/count[?ergoTree=]`     -> `{ "count": u64 }`
//! - `GET  /view/{v}/mempool/page?offset=&limit=[&ergoTree=]` -> `[PoolTx]`
//! - `GET  /view/{v}/mempool/recently-confirmed`    -> `[TxId]`
//! - `GET  /mempool/tx/{id}`                        -> `PoolTx` | 404
//! - `POST /mempool/inputs` `[TxId]`                -> `[TxInput]`
//! - `POST /mempool/outputs` `[TxId]`               -> `[TxOutput]`
//! - `POST /mempool/assets` `[BoxId]`               -> `[BoxAsset]`
//! - `PUT  /offchain/tx/{id}` `Transaction`         -> 2xx (upsert)

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;
use crate::types::{BoxAsset, BoxId, PoolTx, Transaction, TxId, TxInput, TxOutput};

use super::{LedgerReader, OffchainStore, ReadScope};

pub struct HttpIndexClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIndexClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(request_timeout)
            .pool_max_idle_per_host(32)
            .tcp_nodelay(true)
            .build()
            .expect("reqwest client builder uses valid static config");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Cheap reachability probe for startup checks: opens and discards a
    /// read view.
    pub async fn probe(&self) -> Result<(), CoreError> {
        self.read_scope().await.map(|_| ())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CoreError> {
        get_json(&self.client, &self.base_url, path).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, CoreError> {
        let url = format!("{}{path}", self.base_url);
        debug!(http.path = path, "backend post");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| CoreError::Backend(format!("POST {path}: {e}")))?;
        decode_response(path, response).await
    }
}

#[derive(Deserialize)]
struct ViewToken {
    view: u64,
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

#[async_trait]
impl LedgerReader for HttpIndexClient {
    async fn read_scope(&self) -> Result<Box<dyn ReadScope>, CoreError> {
        let token: ViewToken = self.get_json("/view").await?;
        debug!(view = token.view, "opened read view");
        Ok(Box::new(HttpReadScope {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            view: token.view,
        }))
    }

    async fn unconfirmed_by_id(&self, id: &TxId) -> Result<Option<PoolTx>, CoreError> {
        let path = format!("/mempool/tx/{id}");
        let url = format!("{}{path}", self.base_url);
        debug!(http.path = %path, "backend get");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoreError::Backend(format!("GET {path}: {e}")))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode_response(&path, response).await.map(Some)
    }

    async fn inputs_by_tx_ids(&self, ids: &[TxId]) -> Result<Vec<TxInput>, CoreError> {
        self.post_json("/mempool/inputs", &ids).await
    }

    async fn outputs_by_tx_ids(&self, ids: &[TxId]) -> Result<Vec<TxOutput>, CoreError> {
        self.post_json("/mempool/outputs", &ids).await
    }

    async fn assets_by_box_ids(&self, ids: &[BoxId]) -> Result<Vec<BoxAsset>, CoreError> {
        self.post_json("/mempool/assets", &ids).await
    }
}

#[async_trait]
impl OffchainStore for HttpIndexClient {
    async fn put(&self, id: &TxId, tx: &Transaction) -> Result<(), CoreError> {
        let path = format!("/offchain/tx/{id}");
        let url = format!("{}{path}", self.base_url);
        debug!(http.path = %path, "offchain store put");
        let response = self
            .client
            .put(&url)
            .json(tx)
            .send()
            .await
            .map_err(|e| CoreError::Store(format!("PUT {path}: {e}")))?;
        if !response.status().is_success() {
            return Err(CoreError::Store(format!(
                "PUT {path}: backend returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

struct HttpReadScope {
    client: reqwest::Client,
    base_url: String,
    view: u64,
}

impl HttpReadScope {
    async fn get_json<T: DeserializeOwned>(&self, suffix: &str) -> Result<T, CoreError> {
        let path = format!("/view/{}{suffix}", self.view);
        get_json(&self.client, &self.base_url, &path).await
    }
}

#[async_trait]
impl ReadScope for HttpReadScope {
    async fn pool_count(&self) -> Result<u64, CoreError> {
        let resp: CountResponse = self.get_json("/mempool/count").await?;
        Ok(resp.count)
    }

    async fn pool_count_by_ergo_tree(&self, tree_hex: &str) -> Result<u64, CoreError> {
        let resp: CountResponse = self
            .get_json(&format!("/mempool/count?ergoTree={tree_hex}"))
            .await?;
        Ok(resp.count)
    }

    async fn pool_page(&self, offset: u64, limit: u64) -> Result<Vec<PoolTx>, CoreError> {
        self.get_json(&format!("/mempool/page?offset={offset}&limit={limit}"))
            .await
    }

    async fn pool_page_by_ergo_tree(
        &self,
        tree_hex: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<PoolTx>, CoreError> {
        self.get_json(&format!(
            "/mempool/page?offset={offset}&limit={limit}&ergoTree={tree_hex}"
        ))
        .await
    }

    async fn recently_confirmed_ids(&self) -> Result<HashSet<TxId>, CoreError> {
        self.get_json("/mempool/recently-confirmed").await
    }
}

async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    base_url: &str,
    path: &str,
) -> Result<T, CoreError> {
    let url = format!("{base_url}{path}");
    debug!(http.path = %path, "backend get");
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| CoreError::Backend(format!("GET {path}: {e}")))?;
    decode_response(path, response).await
}

async fn decode_response<T: DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> Result<T, CoreError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| CoreError::Backend(format!("{path}: read response body: {e}")))?;
    debug!(http.path = %path, %status, body_len = body.len(), "backend response");

    if !status.is_success() {
        return Err(CoreError::Backend(format!(
            "{path}: backend returned {status}: {body}"
        )));
    }
    serde_json::from_str(&body)
        .map_err(|e| CoreError::Backend(format!("{path}: decode response: {e}")))
}
