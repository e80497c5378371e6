//! Batched assembly of raw pool rows into fully joined transaction views.
//!
//! One call covers one chunk of rows and issues at most three batched
//! lookups (inputs, outputs, assets) regardless of chunk size. The unit
//! of failure is the chunk, not the row: any failed lookup fails the
//! whole call, so callers never see a partially joined page.

use std::collections::{HashMap, HashSet};

use crate::error::CoreError;
use crate::ledger::LedgerReader;
use crate::registers;
use crate::types::{
    AssetInfo, BoxAsset, BoxId, OutputInfo, PoolTx, TransactionInfo, TxId, TxInput, TxOutput,
};

/// Join a batch of pool rows against their inputs, outputs, and assets.
///
/// The i-th element of the result corresponds to the i-th input row; rows
/// are never reordered or dropped here. A row the ledger has no pieces
/// for still yields a (nearly empty) `TransactionInfo`; filtering rows
/// out is the reconciliation layer's job, not the assembler's.
pub async fn assemble(
    reader: &dyn LedgerReader,
    rows: &[PoolTx],
) -> Result<Vec<TransactionInfo>, CoreError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<TxId> = dedup_ids(rows);
    if ids.is_empty() {
        // Unreachable given non-empty rows; kept as a hard guard so a
        // broken caller cannot trigger an unbounded lookup.
        return Ok(Vec::new());
    }

    let (inputs, outputs) = tokio::try_join!(
        reader.inputs_by_tx_ids(&ids),
        reader.outputs_by_tx_ids(&ids),
    )?;

    let box_ids: Vec<BoxId> = outputs.iter().map(|output| output.box_id.clone()).collect();
    // A transaction with no registered assets is legitimate; skip the
    // lookup entirely instead of querying with an empty key set.
    let assets = if box_ids.is_empty() {
        Vec::new()
    } else {
        reader.assets_by_box_ids(&box_ids).await?
    };

    Ok(zip_rows(rows, inputs, outputs, assets))
}

fn dedup_ids(rows: &[PoolTx]) -> Vec<TxId> {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.iter()
        .map(|row| row.id.clone())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

fn zip_rows(
    rows: &[PoolTx],
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    assets: Vec<BoxAsset>,
) -> Vec<TransactionInfo> {
    let mut inputs_by_tx: HashMap<TxId, Vec<TxInput>> = HashMap::new();
    for input in inputs {
        inputs_by_tx.entry(input.tx_id.clone()).or_default().push(input);
    }

    let mut assets_by_box: HashMap<BoxId, Vec<AssetInfo>> = HashMap::new();
    for asset in assets {
        assets_by_box
            .entry(asset.box_id.clone())
            .or_default()
            .push(AssetInfo {
                token_id: asset.token_id,
                index: asset.index,
                amount: asset.amount,
            });
    }

    let mut outputs_by_tx: HashMap<TxId, Vec<OutputInfo>> = HashMap::new();
    for output in outputs {
        let assets = assets_by_box
            .remove(&output.box_id)
            .map(|mut assets| {
                assets.sort_by_key(|a| a.index);
                assets
            })
            .unwrap_or_default();
        let info = OutputInfo {
            assets,
            additional_registers: registers::expand(&output.additional_registers),
            box_id: output.box_id,
            tx_id: output.tx_id.clone(),
            index: output.index,
            value: output.value,
            creation_height: output.creation_height,
            ergo_tree: output.ergo_tree,
            address: output.address,
        };
        outputs_by_tx.entry(output.tx_id).or_default().push(info);
    }

    rows.iter()
        .map(|row| {
            let mut inputs = inputs_by_tx.get(&row.id).cloned().unwrap_or_default();
            inputs.sort_by_key(|input| input.index);
            let mut outputs = outputs_by_tx.get(&row.id).cloned().unwrap_or_default();
            outputs.sort_by_key(|output| output.index);
            TransactionInfo {
                id: row.id.clone(),
                creation_timestamp: row.creation_timestamp,
                size: row.size,
                inputs,
                outputs,
            }
        })
        .collect()
}
