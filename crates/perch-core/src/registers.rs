//! Register codec: decoding of the compact binary typed values stored in
//! box registers R4..R9, and the projection back to raw form.
//!
//! Decoding is deliberately lenient at the map level: a register whose
//! payload is malformed or uses an unsupported type is dropped from the
//! expanded map instead of failing the whole read. The per-entry parser
//! itself is strict and reports exactly why a payload was rejected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::vlq::{Reader, VlqError};

// ==============================================================================
// Register Ids
// ==============================================================================

/// The non-mandatory register slots of a box. R0..R3 are fixed by the
/// ledger (value, script, creation info) and never carry user payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RegisterId {
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
}

impl std::fmt::Display for RegisterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::R4 => write!(f, "R4"),
            Self::R5 => write!(f, "R5"),
            Self::R6 => write!(f, "R6"),
            Self::R7 => write!(f, "R7"),
            Self::R8 => write!(f, "R8"),
            Self::R9 => write!(f, "R9"),
        }
    }
}

// ==============================================================================
// Sigma Types
// ==============================================================================

/// The subset of serialized value types the codec understands. Registers
/// carrying any other type are dropped by [`expand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigmaType {
    #[serde(rename = "SBoolean")]
    Boolean,
    #[serde(rename = "SByte")]
    Byte,
    #[serde(rename = "SShort")]
    Short,
    #[serde(rename = "SInt")]
    Int,
    #[serde(rename = "SLong")]
    Long,
    #[serde(rename = "SBigInt")]
    BigInt,
    #[serde(rename = "SGroupElement")]
    GroupElement,
    #[serde(rename = "SSigmaProp")]
    SigmaProp,
    #[serde(rename = "Coll[SByte]")]
    CollByte,
    #[serde(rename = "Coll[SShort]")]
    CollShort,
    #[serde(rename = "Coll[SInt]")]
    CollInt,
    #[serde(rename = "Coll[SLong]")]
    CollLong,
    #[serde(rename = "Coll[Coll[SByte]]")]
    CollCollByte,
}

// Type codes as they appear on the wire. Collection codes are the
// collection-constructor base (12 per nesting level) plus the element code.
const T_BOOLEAN: u8 = 0x01;
const T_BYTE: u8 = 0x02;
const T_SHORT: u8 = 0x03;
const T_INT: u8 = 0x04;
const T_LONG: u8 = 0x05;
const T_BIGINT: u8 = 0x06;
const T_GROUP_ELEMENT: u8 = 0x07;
const T_SIGMA_PROP: u8 = 0x08;
const T_COLL_BYTE: u8 = 0x0E;
const T_COLL_SHORT: u8 = 0x0F;
const T_COLL_INT: u8 = 0x10;
const T_COLL_LONG: u8 = 0x11;
const T_COLL_COLL_BYTE: u8 = 0x1A;

/// Leading byte of a serialized proposition proving knowledge of a
/// discrete log, the only sigma proposition the codec renders.
const PROVE_DLOG: u8 = 0xCD;

const GROUP_ELEMENT_LEN: usize = 33;
/// Serialized big integers are capped at 256 bits.
const MAX_BIGINT_LEN: usize = 32;

// ==============================================================================
// Expanded Registers
// ==============================================================================

/// The decoded form of one register: the original payload, the inferred
/// value type, and a rendered value. Derived on read, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandedRegister {
    pub serialized_value: String,
    pub sigma_type: SigmaType,
    pub rendered_value: String,
}

// ==============================================================================
// Parsing
// ==============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegisterParseError {
    #[error("payload is not valid hex")]
    NotHex,
    #[error("unsupported type code {0:#04x}")]
    UnsupportedType(u8),
    #[error("payload truncated")]
    Truncated,
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
    #[error("value out of range for its declared type")]
    OutOfRange,
}

impl From<VlqError> for RegisterParseError {
    fn from(_: VlqError) -> Self {
        Self::Truncated
    }
}

/// Parse one register payload into its type and rendered value.
///
/// Numbers render as decimal strings, byte collections and EC points as
/// hex, nested collections as `[hex,hex,...]`. The whole payload must be
/// consumed; trailing bytes mean the declared type does not match the
/// content.
pub fn render(raw_hex: &str) -> Result<(SigmaType, String), RegisterParseError> {
    let bytes = hex::decode(raw_hex).map_err(|_| RegisterParseError::NotHex)?;
    let mut reader = Reader::new(&bytes);
    let code = reader.read_u8().map_err(|_| RegisterParseError::Truncated)?;
    let decoded = decode_value(code, &mut reader)?;
    match reader.remaining() {
        0 => Ok(decoded),
        n => Err(RegisterParseError::TrailingBytes(n)),
    }
}

fn decode_value(
    code: u8,
    reader: &mut Reader<'_>,
) -> Result<(SigmaType, String), RegisterParseError> {
    match code {
        T_BOOLEAN => match reader.read_u8()? {
            0 => Ok((SigmaType::Boolean, "false".into())),
            1 => Ok((SigmaType::Boolean, "true".into())),
            _ => Err(RegisterParseError::OutOfRange),
        },
        T_BYTE => {
            let b = reader.read_u8()? as i8;
            Ok((SigmaType::Byte, b.to_string()))
        }
        T_SHORT => {
            let v = reader.read_i64()?;
            i16::try_from(v).map_err(|_| RegisterParseError::OutOfRange)?;
            Ok((SigmaType::Short, v.to_string()))
        }
        T_INT => {
            let v = reader.read_i64()?;
            i32::try_from(v).map_err(|_| RegisterParseError::OutOfRange)?;
            Ok((SigmaType::Int, v.to_string()))
        }
        T_LONG => Ok((SigmaType::Long, reader.read_i64()?.to_string())),
        T_BIGINT => {
            let len = read_length(reader)?;
            if len == 0 || len > MAX_BIGINT_LEN {
                return Err(RegisterParseError::OutOfRange);
            }
            let magnitude = reader.read_bytes(len)?;
            Ok((SigmaType::BigInt, signed_be_to_decimal(magnitude)))
        }
        T_GROUP_ELEMENT => {
            let point = reader.read_bytes(GROUP_ELEMENT_LEN)?;
            Ok((SigmaType::GroupElement, hex::encode(point)))
        }
        T_SIGMA_PROP => {
            if reader.read_u8()? != PROVE_DLOG {
                // Arbitrary sigma trees are not renderable here.
                return Err(RegisterParseError::UnsupportedType(T_SIGMA_PROP));
            }
            let point = reader.read_bytes(GROUP_ELEMENT_LEN)?;
            Ok((SigmaType::SigmaProp, hex::encode(point)))
        }
        T_COLL_BYTE => {
            let len = read_length(reader)?;
            let items = reader.read_bytes(len)?;
            Ok((SigmaType::CollByte, hex::encode(items)))
        }
        T_COLL_SHORT => decode_numeric_coll(reader, SigmaType::CollShort, |v| {
            i16::try_from(v).map(|_| ()).map_err(|_| RegisterParseError::OutOfRange)
        }),
        T_COLL_INT => decode_numeric_coll(reader, SigmaType::CollInt, |v| {
            i32::try_from(v).map(|_| ()).map_err(|_| RegisterParseError::OutOfRange)
        }),
        T_COLL_LONG => decode_numeric_coll(reader, SigmaType::CollLong, |_| Ok(())),
        T_COLL_COLL_BYTE => {
            let len = read_length(reader)?;
            let mut parts = Vec::with_capacity(len);
            for _ in 0..len {
                let inner_len = read_length(reader)?;
                parts.push(hex::encode(reader.read_bytes(inner_len)?));
            }
            Ok((SigmaType::CollCollByte, format!("[{}]", parts.join(","))))
        }
        other => Err(RegisterParseError::UnsupportedType(other)),
    }
}

fn decode_numeric_coll(
    reader: &mut Reader<'_>,
    tpe: SigmaType,
    check: impl Fn(i64) -> Result<(), RegisterParseError>,
) -> Result<(SigmaType, String), RegisterParseError> {
    let len = read_length(reader)?;
    let mut parts = Vec::with_capacity(len);
    for _ in 0..len {
        let v = reader.read_i64()?;
        check(v)?;
        parts.push(v.to_string());
    }
    Ok((tpe, format!("[{}]", parts.join(","))))
}

fn read_length(reader: &mut Reader<'_>) -> Result<usize, RegisterParseError> {
    let len = reader.read_u64()?;
    // A declared length beyond the buffer can never be satisfied.
    if len > reader.remaining() as u64 {
        return Err(RegisterParseError::Truncated);
    }
    Ok(len as usize)
}

/// Render a big-endian two's-complement integer as a decimal string.
fn signed_be_to_decimal(bytes: &[u8]) -> String {
    let negative = bytes.first().is_some_and(|b| b & 0x80 != 0);
    let mut magnitude: Vec<u8> = if negative {
        // Two's-complement negate: invert, then add one from the LSB.
        let mut inverted: Vec<u8> = bytes.iter().map(|b| !b).collect();
        for byte in inverted.iter_mut().rev() {
            let (sum, carry) = byte.overflowing_add(1);
            *byte = sum;
            if !carry {
                break;
            }
        }
        inverted
    } else {
        bytes.to_vec()
    };

    while magnitude.first() == Some(&0) {
        magnitude.remove(0);
    }

    let mut digits = Vec::new();
    while !magnitude.is_empty() {
        let mut rem: u32 = 0;
        let mut quotient = Vec::with_capacity(magnitude.len());
        for &byte in &magnitude {
            let acc = rem * 256 + u32::from(byte);
            quotient.push((acc / 10) as u8);
            rem = acc % 10;
        }
        while quotient.first() == Some(&0) {
            quotient.remove(0);
        }
        digits.push(char::from(b'0' + rem as u8));
        magnitude = quotient;
    }

    if digits.is_empty() {
        return "0".into();
    }
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.extend(digits.iter().rev());
    out
}

// ==============================================================================
// Map-level Expansion and Projection
// ==============================================================================

/// Expand every decodable register of a box. Undecodable entries are
/// dropped from the result, so the output key set is a subset of the
/// input's; the drop is logged at debug level and never propagated.
pub fn expand(registers: &BTreeMap<RegisterId, String>) -> BTreeMap<RegisterId, ExpandedRegister> {
    registers
        .iter()
        .map(|(id, raw)| (*id, raw, render(raw)))
        .filter_map(|(id, raw, parsed)| match parsed {
            Ok((sigma_type, rendered_value)) => Some((
                id,
                ExpandedRegister {
                    serialized_value: raw.clone(),
                    sigma_type,
                    rendered_value,
                },
            )),
            Err(reason) => {
                tracing::debug!(register = %id, %reason, "dropping undecodable register");
                None
            }
        })
        .collect()
}

/// Project a document believed to hold expanded registers back down to a
/// plain id-to-raw-hex map. If the document does not have that shape
/// (already-raw map, or malformed), it is returned unchanged; this is a
/// best-effort inverse of [`expand`], not a validator.
pub fn convolve(document: serde_json::Value) -> serde_json::Value {
    match serde_json::from_value::<BTreeMap<RegisterId, ExpandedRegister>>(document.clone()) {
        Ok(expanded) => {
            let raw: BTreeMap<String, String> = expanded
                .into_iter()
                .map(|(id, reg)| (id.to_string(), reg.serialized_value))
                .collect();
            serde_json::to_value(raw).unwrap_or(document)
        }
        Err(_) => document,
    }
}
