use num_bigint::BigUint;
use thiserror::Error;

// Conversions for the hex-encoded integers the backend uses for on-chain amounts.

/// Number of Shannon in one CKB.
pub const SHANNONS_PER_CKB: u128 = 100_000_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("hex string does not start with 0x: {0:?}")]
    MissingPrefix(String),
    #[error("hex string has no digits after the prefix")]
    Empty,
    #[error("invalid hex character {character:?} at position {index}")]
    InvalidCharacter { character: char, index: usize },
    #[error("expected {expected} hex digits, found {found}")]
    Width { expected: usize, found: usize },
    #[error("value {0} does not fit in {1} bits")]
    Overflow(String, u32),
}

fn validate_digits(digits: &str) -> Result<(), DecodeError> {
    if digits.is_empty() {
        return Err(DecodeError::Empty);
    }
    match digits.char_indices().find(|(_, c)| !c.is_ascii_hexdigit()) {
        Some((index, character)) => Err(DecodeError::InvalidCharacter { character, index }),
        None => Ok(()),
    }
}

/// Parses a `0x`-prefixed big-endian hex string into an arbitrary-precision integer.
pub fn hex_to_decimal(hex: &str) -> Result<BigUint, DecodeError> {
    let digits = hex
        .strip_prefix("0x")
        .ok_or_else(|| DecodeError::MissingPrefix(hex.to_string()))?;
    validate_digits(digits)?;
    BigUint::parse_bytes(digits.as_bytes(), 16).ok_or(DecodeError::Empty)
}

pub fn hex_to_u64(hex: &str) -> Result<u64, DecodeError> {
    let value = hex_to_decimal(hex)?;
    u64::try_from(&value).map_err(|_| DecodeError::Overflow(value.to_string(), 64))
}

pub fn hex_to_u128(hex: &str) -> Result<u128, DecodeError> {
    let value = hex_to_decimal(hex)?;
    u128::try_from(&value).map_err(|_| DecodeError::Overflow(value.to_string(), 128))
}

/// Decodes exactly `N` little-endian bytes. The `0x` prefix is optional because the
/// backend emits both forms; the digit count is not.
fn le_bytes<const N: usize>(hex: &str) -> Result<[u8; N], DecodeError> {
    let digits = hex.strip_prefix("0x").unwrap_or(hex);
    validate_digits(digits)?;
    if digits.len() != N * 2 {
        return Err(DecodeError::Width {
            expected: N * 2,
            found: digits.len(),
        });
    }
    let mut bytes = [0u8; N];
    hex::decode_to_slice(digits, &mut bytes).map_err(|e| match e {
        hex::FromHexError::InvalidHexCharacter { c, index } => DecodeError::InvalidCharacter {
            character: c,
            index,
        },
        _ => DecodeError::Width {
            expected: N * 2,
            found: digits.len(),
        },
    })?;
    Ok(bytes)
}

/// Decodes a 16-digit little-endian hex string, e.g. `"0x00e1f50500000000"` -> `100000000`.
pub fn u64_le_to_decimal(hex: &str) -> Result<u64, DecodeError> {
    le_bytes::<8>(hex).map(u64::from_le_bytes)
}

/// Decodes a 32-digit little-endian hex string. Channel capacities use this encoding.
pub fn u128_le_to_decimal(hex: &str) -> Result<u128, DecodeError> {
    le_bytes::<16>(hex).map(u128::from_le_bytes)
}

#[cfg(test)]
pub fn u64_to_le_hex(value: u64) -> String {
    format!("0x{}", hex::encode(value.to_le_bytes()))
}

/// Encodes the way the API sends channel capacities.
#[cfg(test)]
pub fn u128_to_le_hex(value: u128) -> String {
    format!("0x{}", hex::encode(value.to_le_bytes()))
}

/// Converts Shannon to CKB for display.
pub fn shannon_to_ckb(shannon: u128) -> f64 {
    let whole = (shannon / SHANNONS_PER_CKB) as f64;
    let fraction = (shannon % SHANNONS_PER_CKB) as f64 / SHANNONS_PER_CKB as f64;
    whole + fraction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_one_ckb_from_little_endian() {
        assert_eq!(u64_le_to_decimal("0x00e1f50500000000"), Ok(100_000_000));
        assert_eq!(shannon_to_ckb(100_000_000), 1.0);
    }

    #[test]
    fn little_endian_matches_reversed_big_endian() {
        let samples = [
            "0x00e1f50500000000",
            "0102030405060708",
            "0xffffffffffffffff",
            "0x0000000000000000",
        ];
        for sample in samples {
            let digits = sample.trim_start_matches("0x");
            let reversed: String = hex::decode(digits)
                .unwrap()
                .iter()
                .rev()
                .map(|b| format!("{:02x}", b))
                .collect();
            let big_endian = hex_to_u64(&format!("0x{}", reversed)).unwrap();
            let decoded = u64_le_to_decimal(sample).unwrap();
            assert_eq!(decoded, big_endian);
            assert_eq!(u64_to_le_hex(decoded), format!("0x{}", digits));
        }
    }

    #[test]
    fn u128_round_trips_through_encoder() {
        let value = 123_456_789_000_000_000_000u128;
        let encoded = u128_to_le_hex(value);
        assert_eq!(encoded.len(), 34);
        assert_eq!(u128_le_to_decimal(&encoded), Ok(value));
    }

    #[test]
    fn rejects_wrong_widths() {
        assert_eq!(
            u64_le_to_decimal("0x00e1f505"),
            Err(DecodeError::Width {
                expected: 16,
                found: 8
            })
        );
        assert_eq!(
            u128_le_to_decimal("0x00e1f50500000000"),
            Err(DecodeError::Width {
                expected: 32,
                found: 16
            })
        );
    }

    #[test]
    fn rejects_malformed_hex() {
        assert_eq!(hex_to_decimal("0x"), Err(DecodeError::Empty));
        assert_eq!(
            hex_to_decimal("ff"),
            Err(DecodeError::MissingPrefix("ff".to_string()))
        );
        assert_eq!(
            hex_to_decimal("0x12g4"),
            Err(DecodeError::InvalidCharacter {
                character: 'g',
                index: 2
            })
        );
        assert!(u64_le_to_decimal("0x00e1f5050000000z").is_err());
    }

    #[test]
    fn big_endian_is_arbitrary_precision() {
        let wide = format!("0x1{}", "0".repeat(33));
        let value = hex_to_decimal(&wide).unwrap();
        assert_eq!(value.to_string(), "5444517870735015415413993718908291383296");
        assert!(matches!(
            hex_to_u128(&wide),
            Err(DecodeError::Overflow(_, 128))
        ));
        assert_eq!(hex_to_u64("0x5f5e100"), Ok(100_000_000));
    }

    #[test]
    fn converts_between_units() {
        assert_eq!(shannon_to_ckb(150 * SHANNONS_PER_CKB + 50_000_000), 150.5);
        assert_eq!(shannon_to_ckb(1), 0.00000001);
    }
}
