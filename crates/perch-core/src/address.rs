//! Address decoding for the by-address lookup path.
//!
//! Addresses are base58-encoded as `prefix byte ++ content ++ checksum`,
//! where the prefix byte packs the network (high nibble) and the address
//! type (low nibble), and the checksum is the first four bytes of the
//! blake2b-256 digest of everything before it.
//!
//! Only the script hex is ever needed downstream: P2PK addresses map to
//! the fixed `0008cd<pubkey>` tree, P2S addresses carry their serialized
//! tree verbatim. P2SH cannot be resolved to a full tree from the address
//! alone and is rejected.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

use crate::error::CoreError;

type Blake2b256 = Blake2b<U32>;

const CHECKSUM_LEN: usize = 4;
const P2PK_KEY_LEN: usize = 33;
/// Tree prefix for a pay-to-public-key script: header byte `00`, then a
/// `ProveDlog` proposition (`08cd`) followed by the 33-byte key.
const P2PK_TREE_PREFIX: &str = "0008cd";

const TYPE_P2PK: u8 = 0x01;
const TYPE_P2SH: u8 = 0x02;
const TYPE_P2S: u8 = 0x03;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkPrefix {
    Mainnet = 0x00,
    Testnet = 0x10,
}

/// Decodes addresses of one network into their spending-script hex.
#[derive(Debug, Clone, Copy)]
pub struct AddressCodec {
    network: NetworkPrefix,
}

impl AddressCodec {
    pub fn new(network: NetworkPrefix) -> Self {
        Self { network }
    }

    /// Resolve an address to the hex of the script it pays to.
    pub fn tree_hex_of(&self, address: &str) -> Result<String, CoreError> {
        let bytes = bs58::decode(address)
            .into_vec()
            .map_err(|_| invalid(address, "not base58"))?;
        if bytes.len() < 1 + 1 + CHECKSUM_LEN {
            return Err(invalid(address, "too short"));
        }

        let (body, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        if checksum_of(body) != checksum {
            return Err(invalid(address, "checksum mismatch"));
        }

        let prefix = body[0];
        let content = &body[1..];
        if prefix & 0xF0 != self.network as u8 {
            return Err(invalid(address, "wrong network"));
        }

        match prefix & 0x0F {
            TYPE_P2PK => {
                if content.len() != P2PK_KEY_LEN {
                    return Err(invalid(address, "malformed public key"));
                }
                Ok(format!("{P2PK_TREE_PREFIX}{}", hex::encode(content)))
            }
            TYPE_P2S => Ok(hex::encode(content)),
            TYPE_P2SH => Err(invalid(address, "pay-to-script-hash is not resolvable")),
            _ => Err(invalid(address, "unknown address type")),
        }
    }

    /// Encode the address paying to the given public key. The reverse of
    /// the P2PK arm of [`Self::tree_hex_of`]; used by tooling and tests.
    pub fn p2pk_address(&self, key: &[u8; P2PK_KEY_LEN]) -> String {
        self.encode(TYPE_P2PK, key)
    }

    fn encode(&self, address_type: u8, content: &[u8]) -> String {
        let mut body = Vec::with_capacity(1 + content.len() + CHECKSUM_LEN);
        body.push(self.network as u8 | address_type);
        body.extend_from_slice(content);
        let checksum = checksum_of(&body);
        body.extend_from_slice(&checksum);
        bs58::encode(body).into_string()
    }
}

fn checksum_of(body: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Blake2b256::digest(body);
    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&digest[..CHECKSUM_LEN]);
    checksum
}

fn invalid(address: &str, reason: &str) -> CoreError {
    CoreError::InvalidAddress(format!("{address}: {reason}"))
}
