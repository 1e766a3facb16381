use alloy::primitives::U256;
use rust_decimal::Decimal;

use crate::error::ChainReadError;

/// Ray precision used by the lending protocol for rates.
pub const RAY_DECIMALS: u32 = 27;
/// Wad precision used for the health factor.
pub const WAD_DECIMALS: u32 = 18;
/// LTV and liquidation threshold are reported in basis points.
pub const BPS_DECIMALS: u32 = 4;

const MAX_SCALE: u32 = 28;

/// Convert a fixed-point integer with `decimals` fractional digits to a `Decimal`.
///
/// Values whose mantissa exceeds 96 bits lose trailing fractional digits
/// rather than failing; only an integer part that cannot fit is an error.
pub fn to_decimal(value: U256, decimals: u32) -> Result<Decimal, ChainReadError> {
    let max_mantissa = U256::from(u128::MAX >> 32);
    let ten = U256::from(10u64);

    let mut mantissa = value;
    let mut scale = decimals;
    while scale > MAX_SCALE || (mantissa > max_mantissa && scale > 0) {
        mantissa /= ten;
        scale -= 1;
    }
    if mantissa > max_mantissa {
        return Err(ChainReadError::Overflow(format!(
            "{value} with {decimals} decimals"
        )));
    }

    let raw = u128::try_from(mantissa)
        .map_err(|e| ChainReadError::Overflow(format!("{value}: {e}")))?;
    Decimal::try_from_i128_with_scale(raw as i128, scale)
        .map(|d| d.normalize())
        .map_err(|e| ChainReadError::Overflow(format!("{value}: {e}")))
}

/// Split ABI return data into 32-byte static words, requiring at least `expected`.
pub fn decode_words(data: &[u8], expected: usize, what: &str) -> Result<Vec<U256>, ChainReadError> {
    if data.len() % 32 != 0 {
        return Err(ChainReadError::Malformed(format!(
            "{what}: return data length {} is not word aligned",
            data.len()
        )));
    }
    let words: Vec<U256> = data.chunks_exact(32).map(U256::from_be_slice).collect();
    if words.len() < expected {
        return Err(ChainReadError::Malformed(format!(
            "{what}: expected {expected} fields, got {}",
            words.len()
        )));
    }
    Ok(words)
}
