//! Ledger access abstraction layer.
//!
//! Defines the read seams the reconciliation engine depends on
//! ([`LedgerReader`], [`ReadScope`]) and the off-chain persistence seam
//! ([`OffchainStore`]), plus an HTTP implementation ([`HttpIndexClient`])
//! and a test mock (`mock::MockLedger`).

mod http_adapter;
#[cfg(test)]
pub mod mock;

pub use http_adapter::HttpIndexClient;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::{BoxAsset, BoxId, PoolTx, Transaction, TxId, TxInput, TxOutput};

/// Read access to the pool and the confirmed-chain index.
///
/// The pool and the chain index are written by an ingestion process the
/// core never sees; neither is updated atomically with respect to the
/// other. Implementations are expected to handle connection management
/// and response deserialization internally.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Open one consistent read scope over the pool and the
    /// recently-confirmed window. Counts, pages, and recent ids obtained
    /// through the returned scope observe a single logical snapshot;
    /// separate scopes carry no cross-call consistency guarantee.
    async fn read_scope(&self) -> Result<Box<dyn ReadScope>, CoreError>;

    /// Fetch a single pool row by transaction id.
    async fn unconfirmed_by_id(&self, id: &TxId) -> Result<Option<PoolTx>, CoreError>;

    /// Fetch all inputs belonging to any of the given transactions, in
    /// one batched lookup.
    async fn inputs_by_tx_ids(&self, ids: &[TxId]) -> Result<Vec<TxInput>, CoreError>;

    /// Fetch all outputs belonging to any of the given transactions, in
    /// one batched lookup.
    async fn outputs_by_tx_ids(&self, ids: &[TxId]) -> Result<Vec<TxOutput>, CoreError>;

    /// Fetch all assets sitting in any of the given boxes, in one
    /// batched lookup.
    async fn assets_by_box_ids(&self, ids: &[BoxId]) -> Result<Vec<BoxAsset>, CoreError>;
}

/// One consistent view of the pool, opened via [`LedgerReader::read_scope`].
///
/// Reads through a scope are side-effect-free and may run concurrently
/// with each other; abandoning a scope mid-request has no effect on the
/// underlying stores.
#[async_trait]
pub trait ReadScope: Send + Sync {
    /// Number of transactions currently in the pool.
    async fn pool_count(&self) -> Result<u64, CoreError>;

    /// Number of pool transactions with at least one output paying to
    /// the given script.
    async fn pool_count_by_ergo_tree(&self, tree_hex: &str) -> Result<u64, CoreError>;

    /// One page of pool rows in the pool's stable enumeration order.
    async fn pool_page(&self, offset: u64, limit: u64) -> Result<Vec<PoolTx>, CoreError>;

    /// One page of pool rows scoped to transactions with an output
    /// paying to the given script.
    async fn pool_page_by_ergo_tree(
        &self,
        tree_hex: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<PoolTx>, CoreError>;

    /// Transaction ids that moved from pool to chain very recently, the
    /// race window between the two views. Window size and retention are
    /// the implementation's contract; membership must be correct.
    async fn recently_confirmed_ids(&self) -> Result<HashSet<TxId>, CoreError>;
}

/// Key-value persistence for submitted transactions.
#[async_trait]
pub trait OffchainStore: Send + Sync {
    /// Upsert `id -> tx`. Writing the same id twice must leave exactly
    /// one entry, making submission idempotent.
    async fn put(&self, id: &TxId, tx: &Transaction) -> Result<(), CoreError>;
}
