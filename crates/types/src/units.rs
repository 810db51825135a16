//! Canonical units for donation settlement
//!
//! ## Units
//! - Vault shares are 18-decimal fixed point (`WAD`), held as `u128`
//! - Asset amounts are raw token units (decimals come from the asset metadata)
//! - Policy weights are basis points; three weights always sum to 10000
//! - NO floating point anywhere in settlement math

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// CANONICAL UNITS
// =============================================================================

/// Basis-point denominator (10000 bps = 100%)
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Fixed-point scale for share amounts and share prices (18 decimals)
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Decimals used by vault shares
pub const SHARE_DECIMALS: u8 = 18;

/// Largest decimals value whose scale `10^decimals` fits in a `u128`
pub const MAX_DECIMALS: u8 = 38;

/// Policy version number
pub type Epoch = u64;

/// Weight in basis points
pub type Bps = u16;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Safe multiplication followed by division using u128 intermediate.
/// Returns None if divisor is zero or the product overflows.
#[inline]
pub fn mul_div_u128(n: u128, mul: u128, div: u128) -> Option<u128> {
    if div == 0 {
        return None;
    }
    n.checked_mul(mul).map(|product| product / div)
}

/// `floor(amount * bps / 10000)` without an intermediate product that can
/// overflow: the amount is split into whole 10000-unit blocks and a tail.
#[inline]
pub const fn bps_share(amount: u128, bps: Bps) -> u128 {
    let bps = bps as u128;
    (amount / BPS_DENOMINATOR) * bps + (amount % BPS_DENOMINATOR) * bps / BPS_DENOMINATOR
}

/// Render a raw integer amount with `decimals` fractional digits, trimming
/// trailing zeros (`1500000` at 6 decimals → `"1.5"`).
///
/// Works on the decimal digits directly, so any `decimals` value is accepted.
pub fn format_units(amount: u128, decimals: u8) -> String {
    let digits = amount.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }
    let (whole, frac) = if digits.len() > decimals {
        let (whole, frac) = digits.split_at(digits.len() - decimals);
        (whole.to_string(), frac.to_string())
    } else {
        ("0".to_string(), format!("{:0>width$}", digits, width = decimals))
    };
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole
    } else {
        format!("{}.{}", whole, frac)
    }
}

// =============================================================================
// SHARE PRICE
// =============================================================================

/// Asset units per vault share, 18-decimal fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharePrice(pub u128);

impl SharePrice {
    /// One asset unit per share.
    pub const ONE: SharePrice = SharePrice(WAD);

    pub const fn from_wad(raw: u128) -> Self {
        SharePrice(raw)
    }

    pub const fn as_wad(&self) -> u128 {
        self.0
    }

    /// Assets redeemable for `shares` at this price (rounded down).
    pub fn convert_to_assets(&self, shares: u128) -> Option<u128> {
        mul_div_u128(shares, self.0, WAD)
    }

    /// Shares minted for `assets` at this price (rounded down).
    /// None for a zero price.
    pub fn convert_to_shares(&self, assets: u128) -> Option<u128> {
        mul_div_u128(assets, WAD, self.0)
    }
}

impl Default for SharePrice {
    fn default() -> Self {
        SharePrice::ONE
    }
}

impl fmt::Display for SharePrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_units(self.0, SHARE_DECIMALS))
    }
}

/// Metadata of the underlying fungible asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub symbol: String,
    pub decimals: u8,
}

impl AssetInfo {
    pub fn new(symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
        }
    }

    /// Format a raw amount of this asset, e.g. `"12.5 USDC"`.
    pub fn display_amount(&self, amount: u128) -> String {
        format!("{} {}", format_units(amount, self.decimals), self.symbol)
    }
}

impl Default for AssetInfo {
    fn default() -> Self {
        Self::new("ASSET", 18)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_u128() {
        assert_eq!(mul_div_u128(100, 50, 100), Some(50));
        assert_eq!(mul_div_u128(1000, 3333, 10000), Some(333));
        assert_eq!(mul_div_u128(100, 1, 0), None); // Division by zero
        assert_eq!(mul_div_u128(u128::MAX, 2, 1), None); // Overflow
    }

    #[test]
    fn test_bps_share_matches_naive_floor() {
        for amount in [0u128, 1, 9, 10, 99, 100, 9_999, 10_000, 12_345, 1_000_003] {
            for bps in [0u16, 1, 2000, 3333, 3334, 5000, 10_000] {
                assert_eq!(
                    bps_share(amount, bps),
                    amount * bps as u128 / BPS_DENOMINATOR,
                    "amount={} bps={}",
                    amount,
                    bps
                );
            }
        }
    }

    #[test]
    fn test_bps_share_no_overflow_at_max() {
        let full = bps_share(u128::MAX, 10_000);
        assert_eq!(full, u128::MAX);
        let half = bps_share(u128::MAX, 5_000);
        assert_eq!(half, u128::MAX / 2);
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(1_500_000, 6), "1.5");
        assert_eq!(format_units(1_000_000, 6), "1");
        assert_eq!(format_units(1, 6), "0.000001");
        assert_eq!(format_units(42, 0), "42");
        assert_eq!(format_units(WAD, SHARE_DECIMALS), "1");
        assert_eq!(format_units(0, 6), "0");
        assert_eq!(format_units(u128::MAX, 0), u128::MAX.to_string());
    }

    #[test]
    fn test_format_units_beyond_u128_scale() {
        // 10^40 does not fit in a u128; rendering must still be exact
        assert_eq!(format_units(5, 40), format!("0.{}5", "0".repeat(39)));
        assert_eq!(
            format_units(u128::MAX, MAX_DECIMALS),
            "3.40282366920938463463374607431768211455"
        );
        assert_eq!(format_units(0, u8::MAX), "0");

        let wide = AssetInfo::new("X", 40);
        assert_eq!(
            wide.display_amount(5),
            format!("0.{}5 X", "0".repeat(39))
        );
    }

    #[test]
    fn test_share_price_conversions() {
        let price = SharePrice::from_wad(WAD + WAD / 10); // 1.1
        assert_eq!(price.convert_to_assets(10 * WAD), Some(11 * WAD));
        assert_eq!(price.convert_to_shares(11 * WAD), Some(10 * WAD));
        assert_eq!(SharePrice(0).convert_to_shares(1), None);
        assert_eq!(price.to_string(), "1.1");
    }

    #[test]
    fn test_asset_display_amount() {
        let usdc = AssetInfo::new("USDC", 6);
        assert_eq!(usdc.display_amount(12_500_000), "12.5 USDC");
    }
}
