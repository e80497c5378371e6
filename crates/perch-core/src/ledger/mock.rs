use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::{BoxAsset, BoxId, PoolTx, Transaction, TxId, TxInput, TxOutput};

use super::{LedgerReader, OffchainStore, ReadScope};

/// An in-memory ledger backend for testing. Serves canned rows populated
/// via the builder pattern, records every batched lookup it receives, and
/// doubles as the off-chain store so submission tests can inspect what
/// was persisted.
pub struct MockLedger {
    inner: Arc<Inner>,
}

struct Inner {
    pool: Vec<PoolTx>,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    assets: Vec<BoxAsset>,
    recently_confirmed: HashSet<TxId>,
    scopes_opened: AtomicUsize,
    input_batches: Mutex<Vec<usize>>,
    output_batches: Mutex<Vec<usize>>,
    asset_batches: Mutex<Vec<usize>>,
    store: Mutex<HashMap<TxId, Transaction>>,
    store_puts: AtomicUsize,
}

impl MockLedger {
    pub fn builder() -> MockLedgerBuilder {
        MockLedgerBuilder::default()
    }

    pub fn scopes_opened(&self) -> usize {
        self.inner.scopes_opened.load(Ordering::SeqCst)
    }

    /// Sizes of the input-lookup batches received, in call order.
    pub fn input_batch_sizes(&self) -> Vec<usize> {
        self.inner.input_batches.lock().unwrap().clone()
    }

    pub fn output_batch_sizes(&self) -> Vec<usize> {
        self.inner.output_batches.lock().unwrap().clone()
    }

    pub fn asset_batch_sizes(&self) -> Vec<usize> {
        self.inner.asset_batches.lock().unwrap().clone()
    }

    /// Total read calls of any kind observed by the backend.
    pub fn read_calls(&self) -> usize {
        self.scopes_opened()
            + self.input_batch_sizes().len()
            + self.output_batch_sizes().len()
            + self.asset_batch_sizes().len()
    }

    pub fn store_puts(&self) -> usize {
        self.inner.store_puts.load(Ordering::SeqCst)
    }

    pub fn store_len(&self) -> usize {
        self.inner.store.lock().unwrap().len()
    }

    pub fn stored(&self, id: &TxId) -> Option<Transaction> {
        self.inner.store.lock().unwrap().get(id).cloned()
    }
}

#[derive(Default)]
pub struct MockLedgerBuilder {
    pool: Vec<PoolTx>,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    assets: Vec<BoxAsset>,
    recently_confirmed: HashSet<TxId>,
}

impl MockLedgerBuilder {
    pub fn with_pool_tx(mut self, tx: PoolTx) -> Self {
        self.pool.push(tx);
        self
    }

    pub fn with_input(mut self, input: TxInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_output(mut self, output: TxOutput) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn with_asset(mut self, asset: BoxAsset) -> Self {
        self.assets.push(asset);
        self
    }

    pub fn with_recently_confirmed(mut self, id: TxId) -> Self {
        self.recently_confirmed.insert(id);
        self
    }

    pub fn build(self) -> MockLedger {
        MockLedger {
            inner: Arc::new(Inner {
                pool: self.pool,
                inputs: self.inputs,
                outputs: self.outputs,
                assets: self.assets,
                recently_confirmed: self.recently_confirmed,
                scopes_opened: AtomicUsize::new(0),
                input_batches: Mutex::new(Vec::new()),
                output_batches: Mutex::new(Vec::new()),
                asset_batches: Mutex::new(Vec::new()),
                store: Mutex::new(HashMap::new()),
                store_puts: AtomicUsize::new(0),
            }),
        }
    }
}

#[async_trait]
impl LedgerReader for MockLedger {
    async fn read_scope(&self) -> Result<Box<dyn ReadScope>, CoreError> {
        self.inner.scopes_opened.fetch_add(1, Ordering::SeqCst);
        // Clone the state at open time: later mutation of a real pool
        // would not leak into an already-open scope, and neither does it
        // here.
        Ok(Box::new(MockScope {
            pool: self.inner.pool.clone(),
            outputs: self.inner.outputs.clone(),
            recently_confirmed: self.inner.recently_confirmed.clone(),
        }))
    }

    async fn unconfirmed_by_id(&self, id: &TxId) -> Result<Option<PoolTx>, CoreError> {
        Ok(self.inner.pool.iter().find(|tx| tx.id == *id).cloned())
    }

    async fn inputs_by_tx_ids(&self, ids: &[TxId]) -> Result<Vec<TxInput>, CoreError> {
        self.inner.input_batches.lock().unwrap().push(ids.len());
        let wanted: HashSet<&TxId> = ids.iter().collect();
        Ok(self
            .inner
            .inputs
            .iter()
            .filter(|input| wanted.contains(&input.tx_id))
            .cloned()
            .collect())
    }

    async fn outputs_by_tx_ids(&self, ids: &[TxId]) -> Result<Vec<TxOutput>, CoreError> {
        self.inner.output_batches.lock().unwrap().push(ids.len());
        let wanted: HashSet<&TxId> = ids.iter().collect();
        Ok(self
            .inner
            .outputs
            .iter()
            .filter(|output| wanted.contains(&output.tx_id))
            .cloned()
            .collect())
    }

    async fn assets_by_box_ids(&self, ids: &[BoxId]) -> Result<Vec<BoxAsset>, CoreError> {
        self.inner.asset_batches.lock().unwrap().push(ids.len());
        let wanted: HashSet<&BoxId> = ids.iter().collect();
        Ok(self
            .inner
            .assets
            .iter()
            .filter(|asset| wanted.contains(&asset.box_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OffchainStore for MockLedger {
    async fn put(&self, id: &TxId, tx: &Transaction) -> Result<(), CoreError> {
        self.inner.store_puts.fetch_add(1, Ordering::SeqCst);
        self.inner
            .store
            .lock()
            .unwrap()
            .insert(id.clone(), tx.clone());
        Ok(())
    }
}

struct MockScope {
    pool: Vec<PoolTx>,
    outputs: Vec<TxOutput>,
    recently_confirmed: HashSet<TxId>,
}

impl MockScope {
    fn matching_tree(&self, tree_hex: &str) -> Vec<PoolTx> {
        let paying: HashSet<&TxId> = self
            .outputs
            .iter()
            .filter(|output| output.ergo_tree == tree_hex)
            .map(|output| &output.tx_id)
            .collect();
        self.pool
            .iter()
            .filter(|tx| paying.contains(&tx.id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ReadScope for MockScope {
    async fn pool_count(&self) -> Result<u64, CoreError> {
        Ok(self.pool.len() as u64)
    }

    async fn pool_count_by_ergo_tree(&self, tree_hex: &str) -> Result<u64, CoreError> {
        Ok(self.matching_tree(tree_hex).len() as u64)
    }

    async fn pool_page(&self, offset: u64, limit: u64) -> Result<Vec<PoolTx>, CoreError> {
        Ok(page(&self.pool, offset, limit))
    }

    async fn pool_page_by_ergo_tree(
        &self,
        tree_hex: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<PoolTx>, CoreError> {
        Ok(page(&self.matching_tree(tree_hex), offset, limit))
    }

    async fn recently_confirmed_ids(&self) -> Result<HashSet<TxId>, CoreError> {
        Ok(self.recently_confirmed.clone())
    }
}

fn page(rows: &[PoolTx], offset: u64, limit: u64) -> Vec<PoolTx> {
    rows.iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect()
}
