//! Entry-fee conversion from fiat units to wei.
//!
//! The value sent with `enter` is the entry fee priced at the oracle rate:
//!
//! ```text
//! fee_wei = 10^18 / (rate / 10^18) * entry_fee
//! ```
//!
//! The arithmetic runs in `U256` fixed point. `10^18 / (rate / 10^18)`
//! is the wei price of one fiat unit. It is computed as `10^54 / rate`,
//! which is that price carrying 18 fractional digits, truncated. That
//! value is multiplied by the fee and the product is rounded half-up to
//! whole wei. The division happens first, so a fee of 3 at a rate of
//! 3·10^18 gives `333333333333333333.333333333333333333 * 3`. Rounding
//! that product gives exactly one ether, as floating-point evaluation of
//! the formula does. Any rate and fee whose product fits in 256 bits
//! converts, including 8-decimal Chainlink feeds.

use rust_decimal::Decimal;
use tracing::debug;
use web3::types::U256;

use crate::types::BettingError;

/// Fractional digits carried by the per-unit price.
const PRICE_PRECISION: usize = 18;

/// Convert a fiat entry fee into the wei amount to send with `enter`.
pub fn fee_in_native(rate: U256, entry_fee: U256) -> Result<U256, BettingError> {
    if rate.is_zero() {
        return Err(BettingError::FeeConversion("oracle rate is zero".into()));
    }

    // 10^18 / (rate / 10^18), scaled by 10^PRICE_PRECISION
    let per_unit = U256::exp10(36 + PRICE_PRECISION) / rate;
    let product = per_unit.checked_mul(entry_fee).ok_or_else(|| {
        BettingError::FeeConversion(format!("fee {entry_fee} at rate {rate} overflows 256 bits"))
    })?;

    let scale = U256::exp10(PRICE_PRECISION);
    let (whole, remainder) = product.div_mod(scale);
    let wei = if remainder * 2 >= scale {
        whole + 1
    } else {
        whole
    };

    debug!(%rate, %entry_fee, %wei, ether = ?to_ether(wei), "Converted entry fee");
    Ok(wei)
}

/// Wei as an ether amount for display, `None` beyond `Decimal` range.
pub fn to_ether(wei: U256) -> Option<Decimal> {
    if wei.bits() > 96 {
        return None;
    }
    Decimal::try_from_i128_with_scale(wei.low_u128() as i128, 18)
        .ok()
        .map(|d| d.normalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
