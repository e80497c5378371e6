//! Domain types for Perch's unconfirmed-transaction model.
//!
//! Contains the raw pool row (`PoolTx`), the per-transaction pieces it is
//! joined against (`TxInput`, `TxOutput`, `BoxAsset`), the assembled read
//! models (`TransactionInfo`, `TransactionSummary`), and the shared
//! paging envelope (`Paging`, `Items`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::registers::{ExpandedRegister, RegisterId};
use crate::vlq::Writer;

// ==============================================================================
// Identifiers
// ==============================================================================

/// A transaction id: the hex-encoded blake2b-256 digest of the
/// transaction content.
///
/// `#[serde(transparent)]` preserves the JSON representation as a bare
/// string, so this newtype is wire-compatible with plain hex strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(pub String);

/// A box id, unique across the whole system: at most one output ever
/// carries a given box id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoxId(pub String);

/// A token id (the box id of the token's minting box).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub String);

macro_rules! impl_id_display {
    ($($ty:ty),*) => {$(
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    )*};
}

impl_id_display!(TxId, BoxId, TokenId);

// ==============================================================================
// Raw Rows
// ==============================================================================

/// A raw unconfirmed-transaction row as enumerated from the pool.
/// Everything else (inputs, outputs, assets) is joined on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolTx {
    pub id: TxId,
    /// Milliseconds since epoch at which the pool first saw this tx.
    pub creation_timestamp: u64,
    /// Serialized size in bytes.
    pub size: u64,
}

/// An input of an unconfirmed transaction, referencing the box it spends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxInput {
    pub box_id: BoxId,
    pub tx_id: TxId,
    pub index: u32,
}

/// An output created by an unconfirmed transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutput {
    pub box_id: BoxId,
    pub tx_id: TxId,
    pub index: u32,
    /// Value in nanoERG.
    pub value: u64,
    pub creation_height: u32,
    /// Hex-serialized spending script.
    pub ergo_tree: String,
    pub address: String,
    /// Raw register payloads, keyed R4..R9. Expanded on read only.
    pub additional_registers: BTreeMap<RegisterId, String>,
    pub timestamp: u64,
}

/// A token amount sitting in one output, keyed by box id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxAsset {
    pub token_id: TokenId,
    pub box_id: BoxId,
    pub index: u32,
    pub amount: u64,
}

// ==============================================================================
// Assembled Read Models
// ==============================================================================

/// A token amount projected into its owning output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetInfo {
    pub token_id: TokenId,
    pub index: u32,
    pub amount: u64,
}

/// An output joined with its assets and with its registers expanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputInfo {
    pub box_id: BoxId,
    pub tx_id: TxId,
    pub index: u32,
    pub value: u64,
    pub creation_height: u32,
    pub ergo_tree: String,
    pub address: String,
    pub assets: Vec<AssetInfo>,
    pub additional_registers: BTreeMap<RegisterId, ExpandedRegister>,
}

/// The fully joined view of one unconfirmed transaction. Never persisted;
/// reconstructed per query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub id: TxId,
    pub creation_timestamp: u64,
    pub size: u64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<OutputInfo>,
}

/// Single-transaction lookup result: the joined view plus derived totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub id: TxId,
    pub creation_timestamp: u64,
    pub size: u64,
    /// Sum of all output values, in nanoERG.
    pub total_value: u64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<OutputInfo>,
}

impl TransactionSummary {
    pub fn from_info(info: TransactionInfo) -> Self {
        let total_value = info.outputs.iter().map(|o| o.value).sum();
        Self {
            id: info.id,
            creation_timestamp: info.creation_timestamp,
            size: info.size,
            total_value,
            inputs: info.inputs,
            outputs: info.outputs,
        }
    }
}

// ==============================================================================
// Submitted Transactions
// ==============================================================================

/// An output candidate of a submitted transaction (no box id yet; ids are
/// assigned once the ledger places the output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputCandidate {
    pub value: u64,
    pub ergo_tree: String,
    pub creation_height: u32,
    #[serde(default)]
    pub assets: Vec<AssetInfo>,
    #[serde(default)]
    pub additional_registers: BTreeMap<RegisterId, String>,
}

/// A transaction as accepted by the submission path. Ledger-validity
/// checking happens elsewhere; this core only persists and acknowledges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<BoxId>,
    #[serde(default)]
    pub data_inputs: Vec<BoxId>,
    pub outputs: Vec<OutputCandidate>,
}

impl Transaction {
    /// Derive the transaction id from the content alone: blake2b-256
    /// over a canonical length-prefixed encoding of every field. Equal
    /// transactions always hash to equal ids, which is what makes
    /// submission idempotent.
    pub fn compute_id(&self) -> TxId {
        use blake2::digest::consts::U32;
        use blake2::{Blake2b, Digest};

        let mut w = Writer::new();
        w.put_u64(self.inputs.len() as u64);
        for box_id in &self.inputs {
            put_str(&mut w, &box_id.0);
        }
        w.put_u64(self.data_inputs.len() as u64);
        for box_id in &self.data_inputs {
            put_str(&mut w, &box_id.0);
        }
        w.put_u64(self.outputs.len() as u64);
        for output in &self.outputs {
            w.put_u64(output.value);
            put_str(&mut w, &output.ergo_tree);
            w.put_u64(u64::from(output.creation_height));
            w.put_u64(output.assets.len() as u64);
            for asset in &output.assets {
                put_str(&mut w, &asset.token_id.0);
                w.put_u64(u64::from(asset.index));
                w.put_u64(asset.amount);
            }
            w.put_u64(output.additional_registers.len() as u64);
            for (id, raw) in &output.additional_registers {
                put_str(&mut w, &id.to_string());
                put_str(&mut w, raw);
            }
        }

        let digest = Blake2b::<U32>::digest(w.into_bytes());
        TxId(hex::encode(digest))
    }
}

fn put_str(w: &mut Writer, s: &str) {
    w.put_u64(s.len() as u64);
    w.put_bytes(s.as_bytes());
}

/// Acknowledgement returned by the submission path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIdResponse {
    pub id: TxId,
}

// ==============================================================================
// Paging
// ==============================================================================

/// Largest page a single request may ask for.
pub const MAX_PAGE_LIMIT: u64 = 1000;

/// A validated page window. Construct through [`Paging::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    offset: u64,
    limit: u64,
}

impl Paging {
    pub fn new(offset: u64, limit: u64) -> Result<Self, CoreError> {
        if limit == 0 {
            return Err(CoreError::Refinement("limit must be positive".into()));
        }
        if limit > MAX_PAGE_LIMIT {
            return Err(CoreError::Refinement(format!(
                "limit must not exceed {MAX_PAGE_LIMIT}, got {limit}"
            )));
        }
        Ok(Self { offset, limit })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

/// One page of results plus the total count of matching entities
/// disregarding the page window. After reconciliation, `total` reflects
/// the count with confirmed duplicates excluded, never the raw pool count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Items<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Items<T> {
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }
}
