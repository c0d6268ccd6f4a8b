//! The CTID value type and its hex codec

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CtidError, CtidField};
use crate::{CTID_HEX_LEN, CTID_PREFIX, MAX_LEDGER_SEQ, MAX_NETWORK_ID, MAX_TXN_INDEX};

const PREFIX_MASK: u64 = 0xF000_0000_0000_0000;

/// A decoded compact transaction identifier
///
/// Construction always validates bit widths, so every `Ctid` encodes to a
/// well-formed 16 character identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ctid {
    ledger_seq: u32,
    txn_index: u16,
    network_id: u16,
}

impl Ctid {
    /// Create a CTID from its components
    ///
    /// `txn_index` and `network_id` are bounded by their types; only
    /// `ledger_seq` needs a range check.
    pub fn new(ledger_seq: u32, txn_index: u16, network_id: u16) -> Result<Self, CtidError> {
        check_width(CtidField::LedgerSeq, ledger_seq as u64, MAX_LEDGER_SEQ)?;
        Ok(Self {
            ledger_seq,
            txn_index,
            network_id,
        })
    }

    /// Rebuild a CTID from its packed 64-bit value
    pub fn from_u64(value: u64) -> Result<Self, CtidError> {
        let nibble = ((value & PREFIX_MASK) >> 60) as u8;
        if nibble as u64 != CTID_PREFIX {
            return Err(CtidError::InvalidPrefix { nibble });
        }

        Ok(Self {
            ledger_seq: ((value >> 32) & MAX_LEDGER_SEQ) as u32,
            txn_index: ((value >> 16) & MAX_TXN_INDEX) as u16,
            network_id: (value & MAX_NETWORK_ID) as u16,
        })
    }

    /// The packed 64-bit value
    pub fn as_u64(&self) -> u64 {
        (((CTID_PREFIX << 28) + self.ledger_seq as u64) << 32)
            | ((self.txn_index as u64) << 16)
            | self.network_id as u64
    }

    pub fn ledger_seq(&self) -> u32 {
        self.ledger_seq
    }

    pub fn txn_index(&self) -> u16 {
        self.txn_index
    }

    pub fn network_id(&self) -> u16 {
        self.network_id
    }
}

impl FromStr for Ctid {
    type Err = CtidError;

    /// Parse a 16 character hex CTID; either letter case is accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let len = s.chars().count();
        if len != CTID_HEX_LEN {
            return Err(CtidError::InvalidLength { len });
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CtidError::InvalidHex {
                input: s.to_string(),
            });
        }

        let value = u64::from_str_radix(s, 16).map_err(|_| CtidError::InvalidHex {
            input: s.to_string(),
        })?;
        Self::from_u64(value)
    }
}

impl TryFrom<String> for Ctid {
    type Error = CtidError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ctid> for String {
    fn from(ctid: Ctid) -> String {
        ctid.to_string()
    }
}

impl fmt::Display for Ctid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.as_u64())
    }
}

/// Input accepted by [`decode`]: a hex string or an already parsed value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtidInput<'a> {
    Hex(&'a str),
    Value(u64),
}

impl<'a> From<&'a str> for CtidInput<'a> {
    fn from(s: &'a str) -> Self {
        CtidInput::Hex(s)
    }
}

impl<'a> From<&'a String> for CtidInput<'a> {
    fn from(s: &'a String) -> Self {
        CtidInput::Hex(s.as_str())
    }
}

impl From<u64> for CtidInput<'_> {
    fn from(value: u64) -> Self {
        CtidInput::Value(value)
    }
}

/// Encode a `(ledger_seq, txn_index, network_id)` triple as a CTID string
///
/// Values are taken as `u64` so callers holding untrusted numbers (for
/// example from a JSON response) get a range error naming the offending
/// component instead of a silent truncation.
pub fn encode(ledger_seq: u64, txn_index: u64, network_id: u64) -> Result<String, CtidError> {
    check_width(CtidField::LedgerSeq, ledger_seq, MAX_LEDGER_SEQ)?;
    check_width(CtidField::TxnIndex, txn_index, MAX_TXN_INDEX)?;
    check_width(CtidField::NetworkId, network_id, MAX_NETWORK_ID)?;

    let ctid = Ctid {
        ledger_seq: ledger_seq as u32,
        txn_index: txn_index as u16,
        network_id: network_id as u16,
    };
    Ok(ctid.to_string())
}

/// Encode from signed components, rejecting negatives
pub fn encode_signed(
    ledger_seq: i64,
    txn_index: i64,
    network_id: i64,
) -> Result<String, CtidError> {
    encode(
        non_negative(CtidField::LedgerSeq, ledger_seq)?,
        non_negative(CtidField::TxnIndex, txn_index)?,
        non_negative(CtidField::NetworkId, network_id)?,
    )
}

/// Decode a CTID from its hex form or its packed value
pub fn decode<'a>(input: impl Into<CtidInput<'a>>) -> Result<Ctid, CtidError> {
    match input.into() {
        CtidInput::Hex(s) => s.parse(),
        CtidInput::Value(value) => Ctid::from_u64(value),
    }
}

fn check_width(field: CtidField, value: u64, max: u64) -> Result<(), CtidError> {
    if value > max {
        return Err(CtidError::OutOfRange { field, value, max });
    }
    Ok(())
}

fn non_negative(field: CtidField, value: i64) -> Result<u64, CtidError> {
    u64::try_from(value).map_err(|_| CtidError::Negative { field, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_value() {
        assert_eq!(encode(2500, 0, 0).unwrap(), "C00009C400000000");
        assert_eq!(encode(0x05523E, 0, 2).unwrap(), "C005523E00000002");
        assert_eq!(
            encode(MAX_LEDGER_SEQ, MAX_TXN_INDEX, MAX_NETWORK_ID).unwrap(),
            "CFFFFFFFFFFFFFFF"
        );
        assert_eq!(encode(0, 0, 0).unwrap(), "C000000000000000");
    }

    #[test]
    fn test_decode_known_value() {
        let ctid = decode("C005523E00000002").unwrap();
        assert_eq!(ctid.ledger_seq(), 0x05523E);
        assert_eq!(ctid.txn_index(), 0);
        assert_eq!(ctid.network_id(), 2);
    }

    #[test]
    fn test_decode_is_case_insensitive() {
        let upper = decode("C005523E00000002").unwrap();
        let lower = decode("c005523e00000002").unwrap();
        assert_eq!(upper, lower);
        // Re-encoding always normalizes to upper case
        assert_eq!(lower.to_string(), "C005523E00000002");
    }

    #[test]
    fn test_decode_packed_value() {
        let ctid = decode(0xC005_523E_0000_0002u64).unwrap();
        assert_eq!(ctid, decode("C005523E00000002").unwrap());
        assert_eq!(ctid.as_u64(), 0xC005_523E_0000_0002);
    }

    #[test]
    fn test_round_trip() {
        let samples = [
            (0u64, 0u64, 0u64),
            (1, 1, 1),
            (2500, 17, 21337),
            (0x0ABC_DEF1, 0x1234, 0xFFFF),
            (MAX_LEDGER_SEQ, 0, MAX_NETWORK_ID),
            (MAX_LEDGER_SEQ, MAX_TXN_INDEX, MAX_NETWORK_ID),
        ];

        for (ledger_seq, txn_index, network_id) in samples {
            let encoded = encode(ledger_seq, txn_index, network_id).unwrap();
            assert_eq!(encoded.len(), CTID_HEX_LEN);
            assert!(encoded.starts_with('C'));

            let decoded = decode(&encoded).unwrap();
            assert_eq!(decoded.ledger_seq() as u64, ledger_seq);
            assert_eq!(decoded.txn_index() as u64, txn_index);
            assert_eq!(decoded.network_id() as u64, network_id);
        }
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        assert_eq!(
            encode(MAX_LEDGER_SEQ + 1, 0, 0).unwrap_err(),
            CtidError::OutOfRange {
                field: CtidField::LedgerSeq,
                value: 0x1000_0000,
                max: MAX_LEDGER_SEQ,
            }
        );
        assert!(matches!(
            encode(0, 0x10000, 0).unwrap_err(),
            CtidError::OutOfRange {
                field: CtidField::TxnIndex,
                ..
            }
        ));
        assert!(matches!(
            encode(0, 0, 0x10000).unwrap_err(),
            CtidError::OutOfRange {
                field: CtidField::NetworkId,
                ..
            }
        ));
    }

    #[test]
    fn test_encode_rejects_negative() {
        assert_eq!(
            encode_signed(-1, 0, 0).unwrap_err(),
            CtidError::Negative {
                field: CtidField::LedgerSeq,
                value: -1,
            }
        );
        assert!(matches!(
            encode_signed(1, -5, 0).unwrap_err(),
            CtidError::Negative {
                field: CtidField::TxnIndex,
                ..
            }
        ));
        assert!(matches!(
            encode_signed(1, 0, -5).unwrap_err(),
            CtidError::Negative {
                field: CtidField::NetworkId,
                ..
            }
        ));
        assert_eq!(encode_signed(2500, 0, 0).unwrap(), "C00009C400000000");
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert_eq!(
            decode("C005523E0000000").unwrap_err(),
            CtidError::InvalidLength { len: 15 }
        );
        assert_eq!(
            decode("C005523E000000020").unwrap_err(),
            CtidError::InvalidLength { len: 17 }
        );
        assert_eq!(decode("").unwrap_err(), CtidError::InvalidLength { len: 0 });
    }

    #[test]
    fn test_decode_rejects_non_hex() {
        assert!(matches!(
            decode("C005523G00000002").unwrap_err(),
            CtidError::InvalidHex { .. }
        ));
        assert!(matches!(
            decode("C005523-00000002").unwrap_err(),
            CtidError::InvalidHex { .. }
        ));
        // Sixteen characters, but not sixteen bytes
        assert!(matches!(
            decode("C005523É00000002").unwrap_err(),
            CtidError::InvalidHex { .. }
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_prefix() {
        assert_eq!(
            decode("D005523E00000002").unwrap_err(),
            CtidError::InvalidPrefix { nibble: 0xD }
        );
        assert_eq!(
            decode("0005523E00000002").unwrap_err(),
            CtidError::InvalidPrefix { nibble: 0x0 }
        );
        assert_eq!(
            decode(0x1234u64).unwrap_err(),
            CtidError::InvalidPrefix { nibble: 0x0 }
        );
    }

    #[test]
    fn test_new_validates_ledger_seq() {
        assert!(Ctid::new(0x0FFF_FFFF, 1, 2).is_ok());
        assert!(matches!(
            Ctid::new(0x1000_0000, 1, 2).unwrap_err(),
            CtidError::OutOfRange {
                field: CtidField::LedgerSeq,
                ..
            }
        ));
    }

    #[test]
    fn test_error_messages_name_the_rule() {
        let err = encode(0, 0x10000, 0).unwrap_err();
        assert!(err.to_string().contains("txn_index"));

        let err = decode("ABC").unwrap_err();
        assert!(err.to_string().contains("16 characters"));

        let err = decode("A005523E00000002").unwrap_err();
        assert!(err.to_string().contains("0xC"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let ctid = Ctid::new(2500, 3, 1).unwrap();
        let json = serde_json::to_string(&ctid).unwrap();
        assert_eq!(json, "\"C00009C400030001\"");

        let parsed: Ctid = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ctid);

        assert!(serde_json::from_str::<Ctid>("\"E00009C400030001\"").is_err());
    }
}
