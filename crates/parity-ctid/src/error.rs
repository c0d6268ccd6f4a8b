//! Error types for CTID encoding and decoding

use std::fmt;
use thiserror::Error;

/// The CTID component a validation error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CtidField {
    LedgerSeq,
    TxnIndex,
    NetworkId,
}

impl fmt::Display for CtidField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CtidField::LedgerSeq => write!(f, "ledger_seq"),
            CtidField::TxnIndex => write!(f, "txn_index"),
            CtidField::NetworkId => write!(f, "network_id"),
        }
    }
}

/// Errors produced when building or parsing a CTID
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CtidError {
    #[error("{field} must not be negative (got {value})")]
    Negative { field: CtidField, value: i64 },

    #[error("{field} exceeds its bit width (got {value}, max {max:#X})")]
    OutOfRange {
        field: CtidField,
        value: u64,
        max: u64,
    },

    #[error("CTID must be exactly 16 characters (got {len})")]
    InvalidLength { len: usize },

    #[error("CTID must be hexadecimal: '{input}'")]
    InvalidHex { input: String },

    #[error("CTID must start with nibble 0xC (got {nibble:#X})")]
    InvalidPrefix { nibble: u8 },
}
