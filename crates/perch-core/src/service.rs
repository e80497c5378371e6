//! The reconciliation engine: paging, snapshotting, chunked assembly,
//! filtering of entries that raced into confirmation, and the
//! submission path.
//!
//! The pool and the confirmed-chain index are written by an ingestion
//! process this service never coordinates with, so a transaction id can
//! transiently exist in both views. The service hides that from callers:
//! it always prefers the confirmed view, drops the duplicate from every
//! listing, and corrects the reported total accordingly.

use std::sync::Arc;

use tracing::{debug, info};

use crate::address::AddressCodec;
use crate::assemble::assemble;
use crate::error::CoreError;
use crate::ledger::{LedgerReader, OffchainStore};
use crate::types::{
    Items, Paging, PoolTx, Transaction, TransactionInfo, TransactionSummary, TxId, TxIdResponse,
};

/// Upper bound on the ids sent into one batched lookup. A page larger
/// than this is split so backend fan-out stays bounded no matter the
/// requested limit.
pub const CHUNK_SIZE: usize = 100;

/// The unconfirmed-transaction view service. Constructed once with its
/// collaborators and passed explicitly wherever it is needed; holds no
/// mutable state of its own.
pub struct MempoolView {
    reader: Arc<dyn LedgerReader>,
    store: Arc<dyn OffchainStore>,
    addresses: AddressCodec,
}

impl MempoolView {
    pub fn new(
        reader: Arc<dyn LedgerReader>,
        store: Arc<dyn OffchainStore>,
        addresses: AddressCodec,
    ) -> Self {
        Self {
            reader,
            store,
            addresses,
        }
    }

    /// List one page of unconfirmed transactions, fully joined, with
    /// recently confirmed duplicates removed and `total` corrected.
    pub async fn list_unconfirmed(
        &self,
        paging: Paging,
    ) -> Result<Items<TransactionInfo>, CoreError> {
        let scope = self.reader.read_scope().await?;
        let (total, recently_confirmed, page) = tokio::try_join!(
            scope.pool_count(),
            scope.recently_confirmed_ids(),
            scope.pool_page(paging.offset(), paging.limit()),
        )?;
        drop(scope);
        self.finish_listing(total, recently_confirmed, page).await
    }

    /// Same listing, scoped to transactions with an output paying to the
    /// given script.
    pub async fn list_unconfirmed_by_ergo_tree(
        &self,
        tree_hex: &str,
        paging: Paging,
    ) -> Result<Items<TransactionInfo>, CoreError> {
        ensure_hex(tree_hex)?;
        let scope = self.reader.read_scope().await?;
        let (total, recently_confirmed, page) = tokio::try_join!(
            scope.pool_count_by_ergo_tree(tree_hex),
            scope.recently_confirmed_ids(),
            scope.pool_page_by_ergo_tree(tree_hex, paging.offset(), paging.limit()),
        )?;
        drop(scope);
        self.finish_listing(total, recently_confirmed, page).await
    }

    /// Resolve `address` to its script and delegate to the tree-scoped
    /// listing. A malformed address fails here, before any ledger read.
    pub async fn list_unconfirmed_by_address(
        &self,
        address: &str,
        paging: Paging,
    ) -> Result<Items<TransactionInfo>, CoreError> {
        let tree_hex = self.addresses.tree_hex_of(address)?;
        self.list_unconfirmed_by_ergo_tree(&tree_hex, paging).await
    }

    /// Fetch and join a single unconfirmed transaction.
    pub async fn unconfirmed_summary(
        &self,
        id: &TxId,
    ) -> Result<Option<TransactionSummary>, CoreError> {
        let Some(row) = self.reader.unconfirmed_by_id(id).await? else {
            return Ok(None);
        };
        let assembled = assemble(self.reader.as_ref(), &[row]).await?;
        Ok(assembled
            .into_iter()
            .next()
            .map(TransactionSummary::from_info))
    }

    /// Accept a transaction into the off-chain store and acknowledge
    /// with its content-derived id. Re-submitting the same transaction
    /// upserts the same entry and returns the same acknowledgement; a
    /// store failure surfaces immediately, there is no retry here.
    pub async fn submit(&self, tx: &Transaction) -> Result<TxIdResponse, CoreError> {
        let id = tx.compute_id();
        self.store.put(&id, tx).await?;
        info!(tx = %id, "accepted unconfirmed transaction");
        Ok(TxIdResponse { id })
    }

    /// Assemble the page in bounded chunks, then apply the confirmed-id
    /// exclusion filter: every removed entry decrements the reported
    /// total by exactly one.
    async fn finish_listing(
        &self,
        total: u64,
        recently_confirmed: std::collections::HashSet<TxId>,
        page: Vec<PoolTx>,
    ) -> Result<Items<TransactionInfo>, CoreError> {
        let chunks = page.chunks(CHUNK_SIZE).map(|chunk| assemble(self.reader.as_ref(), chunk));
        let assembled = futures::future::try_join_all(chunks).await?;

        let mut excluded: u64 = 0;
        let items: Vec<TransactionInfo> = assembled
            .into_iter()
            .flatten()
            .filter(|info| {
                let confirmed = recently_confirmed.contains(&info.id);
                if confirmed {
                    excluded += 1;
                }
                !confirmed
            })
            .collect();

        if excluded > 0 {
            debug!(excluded, "dropped entries that raced into confirmation");
        }
        Ok(Items::new(items, total.saturating_sub(excluded)))
    }
}

fn ensure_hex(tree_hex: &str) -> Result<(), CoreError> {
    if tree_hex.is_empty() || hex::decode(tree_hex).is_err() {
        return Err(CoreError::Refinement(format!(
            "not a hex-encoded script: {tree_hex}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::NetworkPrefix;
    use crate::ledger::mock::MockLedger;
    use crate::test_util::{make_input, make_output, make_pool_tx, tx_id, TEST_TREE};
    use crate::types::{BoxId, OutputCandidate};

    fn service(ledger: &Arc<MockLedger>) -> MempoolView {
        MempoolView::new(
            ledger.clone(),
            ledger.clone(),
            AddressCodec::new(NetworkPrefix::Mainnet),
        )
    }

    fn pool_of(n: u8) -> MockLedger {
        let mut builder = MockLedger::builder();
        for i in 0..n {
            builder = builder.with_pool_tx(make_pool_tx(i));
        }
        builder.build()
    }

    #[tokio::test]
    async fn excludes_recently_confirmed_and_corrects_total() {
        let mut builder = MockLedger::builder();
        for i in 0..150u8 {
            builder = builder.with_pool_tx(make_pool_tx(i));
        }
        // Three ids raced into confirmation, all within the first page.
        for confirmed in [3u8, 40, 77] {
            builder = builder.with_recently_confirmed(tx_id(confirmed));
        }
        let ledger = Arc::new(builder.build());
        let view = service(&ledger);

        let items = view
            .list_unconfirmed(Paging::new(0, 100).unwrap())
            .await
            .unwrap();

        assert_eq!(items.total, 147);
        assert_eq!(items.items.len(), 97);
        for confirmed in [3u8, 40, 77] {
            assert!(items.items.iter().all(|info| info.id != tx_id(confirmed)));
        }
        // One snapshot served the count, the window, and the page.
        assert_eq!(ledger.scopes_opened(), 1);
    }

    #[tokio::test]
    async fn oversized_pages_are_chunked_and_merged_in_order() {
        let ledger = Arc::new(pool_of(250));
        let view = service(&ledger);

        let items = view
            .list_unconfirmed(Paging::new(0, 250).unwrap())
            .await
            .unwrap();

        assert_eq!(items.items.len(), 250);
        for (i, info) in items.items.iter().enumerate() {
            assert_eq!(info.id, tx_id(i as u8));
        }
        let mut batches = ledger.input_batch_sizes();
        assert!(batches.iter().all(|&size| size <= CHUNK_SIZE));
        batches.sort_unstable();
        assert_eq!(batches, vec![50, 100, 100]);
    }

    #[tokio::test]
    async fn empty_pool_lists_nothing() {
        let ledger = Arc::new(pool_of(0));
        let view = service(&ledger);
        let items = view
            .list_unconfirmed(Paging::new(0, 20).unwrap())
            .await
            .unwrap();
        assert!(items.items.is_empty());
        assert_eq!(items.total, 0);
        // An empty page never reaches the batched lookups.
        assert_eq!(ledger.input_batch_sizes().len(), 0);
    }

    #[tokio::test]
    async fn tree_scoped_listing_only_sees_matching_rows() {
        let ledger = Arc::new(
            MockLedger::builder()
                .with_pool_tx(make_pool_tx(1))
                .with_pool_tx(make_pool_tx(2))
                .with_pool_tx(make_pool_tx(3))
                .with_output(make_output(&tx_id(1), 10, 0))
                .with_output(make_output(&tx_id(3), 11, 0))
                .build(),
        );
        let view = service(&ledger);

        let items = view
            .list_unconfirmed_by_ergo_tree(TEST_TREE, Paging::new(0, 10).unwrap())
            .await
            .unwrap();

        assert_eq!(items.total, 2);
        assert_eq!(items.items.len(), 2);
        assert_eq!(items.items[0].id, tx_id(1));
        assert_eq!(items.items[1].id, tx_id(3));
    }

    #[tokio::test]
    async fn tree_listing_rejects_non_hex_before_any_read() {
        let ledger = Arc::new(pool_of(5));
        let view = service(&ledger);
        let err = view
            .list_unconfirmed_by_ergo_tree("zz-not-hex", Paging::new(0, 10).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Refinement(_)));
        assert_eq!(ledger.read_calls(), 0);
    }

    #[tokio::test]
    async fn invalid_address_fails_before_any_read() {
        let ledger = Arc::new(pool_of(5));
        let view = service(&ledger);
        let err = view
            .list_unconfirmed_by_address("definitely not an address", Paging::new(0, 10).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidAddress(_)));
        assert_eq!(ledger.read_calls(), 0);
    }

    #[tokio::test]
    async fn by_address_resolves_to_tree_listing() {
        let codec = AddressCodec::new(NetworkPrefix::Mainnet);
        let address = codec.p2pk_address(&[0x02; 33]);
        // TEST_TREE is exactly the P2PK tree for that key.
        let ledger = Arc::new(
            MockLedger::builder()
                .with_pool_tx(make_pool_tx(7))
                .with_output(make_output(&tx_id(7), 20, 0))
                .build(),
        );
        let view = service(&ledger);

        let items = view
            .list_unconfirmed_by_address(&address, Paging::new(0, 10).unwrap())
            .await
            .unwrap();
        assert_eq!(items.total, 1);
        assert_eq!(items.items[0].id, tx_id(7));
    }

    #[tokio::test]
    async fn summary_of_missing_tx_is_none() {
        let ledger = Arc::new(pool_of(1));
        let view = service(&ledger);
        assert!(view.unconfirmed_summary(&tx_id(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn summary_joins_the_single_row() {
        let ledger = Arc::new(
            MockLedger::builder()
                .with_pool_tx(make_pool_tx(5))
                .with_input(make_input(&tx_id(5), 30, 0))
                .with_output(make_output(&tx_id(5), 31, 0))
                .build(),
        );
        let view = service(&ledger);

        let summary = view.unconfirmed_summary(&tx_id(5)).await.unwrap().unwrap();
        assert_eq!(summary.id, tx_id(5));
        assert_eq!(summary.inputs.len(), 1);
        assert_eq!(summary.outputs.len(), 1);
        assert_eq!(summary.total_value, 1_000_000);
    }

    #[tokio::test]
    async fn submit_is_idempotent() {
        let ledger = Arc::new(pool_of(0));
        let view = service(&ledger);
        let tx = Transaction {
            inputs: vec![BoxId::from("aa11")],
            data_inputs: vec![],
            outputs: vec![OutputCandidate {
                value: 500,
                ergo_tree: TEST_TREE.into(),
                creation_height: 10,
                assets: vec![],
                additional_registers: Default::default(),
            }],
        };

        let first = view.submit(&tx).await.unwrap();
        let second = view.submit(&tx).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.store_puts(), 2);
        assert_eq!(ledger.store_len(), 1);
        assert!(ledger.stored(&first.id).is_some());
    }
}
