//! Shared test helpers for `perch-core` unit tests.
//!
//! Consolidates builder functions for pool rows and their joined pieces
//! so that tests across modules share a single source of truth for dummy
//! data construction.

use std::collections::BTreeMap;

use crate::types::{BoxAsset, BoxId, PoolTx, TokenId, TxId, TxInput, TxOutput};

/// Script used by default-constructed test outputs.
pub const TEST_TREE: &str = "0008cd020202020202020202020202020202020202020202020202020202020202020202";

/// Create a deterministic `TxId` from a single distinguishing byte.
pub fn tx_id(b: u8) -> TxId {
    TxId(hex::encode([b; 32]))
}

pub fn box_id(b: u8) -> BoxId {
    BoxId(hex::encode([b; 32]))
}

pub fn token_id(b: u8) -> TokenId {
    TokenId(hex::encode([b; 32]))
}

/// Build a minimal pool row with sane defaults. The distinguishing byte
/// keeps ids unique across a test's rows.
pub fn make_pool_tx(b: u8) -> PoolTx {
    PoolTx {
        id: tx_id(b),
        creation_timestamp: 1_700_000_000_000 + u64::from(b),
        size: 250,
    }
}

pub fn make_input(tx: &TxId, box_byte: u8, index: u32) -> TxInput {
    TxInput {
        box_id: box_id(box_byte),
        tx_id: tx.clone(),
        index,
    }
}

pub fn make_output(tx: &TxId, box_byte: u8, index: u32) -> TxOutput {
    TxOutput {
        box_id: box_id(box_byte),
        tx_id: tx.clone(),
        index,
        value: 1_000_000,
        creation_height: 100,
        ergo_tree: TEST_TREE.to_owned(),
        address: "test-address".to_owned(),
        additional_registers: BTreeMap::new(),
        timestamp: 1_700_000_000_000,
    }
}

pub fn make_asset(in_box: &BoxId, token_byte: u8, amount: u64) -> BoxAsset {
    BoxAsset {
        token_id: token_id(token_byte),
        box_id: in_box.clone(),
        index: 0,
        amount,
    }
}
