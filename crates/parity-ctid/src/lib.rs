//! Compact transaction identifier (CTID) codec
//!
//! A CTID packs the ledger sequence a transaction was validated in, its
//! index within that ledger, and the network it belongs to into a single
//! 64-bit value rendered as 16 uppercase hex characters:
//!
//! ```text
//!  63    60 59                      32 31            16 15             0
//! ┌────────┬──────────────────────────┬────────────────┬────────────────┐
//! │  0xC   │        ledger_seq        │   txn_index    │   network_id   │
//! │ 4 bits │         28 bits          │    16 bits     │    16 bits     │
//! └────────┴──────────────────────────┴────────────────┴────────────────┘
//! ```
//!
//! Both servers accept a CTID wherever a transaction hash is accepted, so
//! the parity suite uses this crate to build lookup keys and to check the
//! `ctid` fields the servers return.

mod ctid;
mod error;

pub use ctid::{decode, encode, encode_signed, Ctid, CtidInput};
pub use error::{CtidError, CtidField};

/// Value of the fixed top nibble of every CTID
pub const CTID_PREFIX: u64 = 0xC;

/// Largest ledger sequence representable in a CTID (28 bits)
pub const MAX_LEDGER_SEQ: u64 = 0x0FFF_FFFF;

/// Largest transaction index representable in a CTID (16 bits)
pub const MAX_TXN_INDEX: u64 = 0xFFFF;

/// Largest network id representable in a CTID (16 bits)
pub const MAX_NETWORK_ID: u64 = 0xFFFF;

/// Length of the hex rendering of a CTID
pub const CTID_HEX_LEN: usize = 16;
