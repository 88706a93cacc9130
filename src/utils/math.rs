//! Fixed-point arithmetic shared by pricing and aggregation.
//!
//! Monetary values are 18-decimal fixed-point `U256` integers ("normalized").
//! Intermediate products are computed in 512 bits and saturate back to 256 bits,
//! so `reserve * price` never wraps.
use alloy::primitives::{I256, U256, U512};
use bigdecimal::num_bigint::{BigInt, Sign};
use bigdecimal::{BigDecimal, Zero};

use super::constants::{Q192, TEN_TO_THE_18};

fn pow10(exp: u8) -> Option<U512> {
    U512::from(10u64).checked_pow(U512::from(exp))
}

fn narrow(value: U512) -> U256 {
    U256::saturating_from(value)
}

/// Scales `amount`, expressed with `token_decimals` decimals, to 18 decimals.
///
/// `token_decimals == 0` leaves the amount untouched: a token whose decimals could
/// not be read reports zero, and it is treated as already normalized. Above 18
/// decimals the result truncates toward zero.
pub fn normalize(amount: U256, token_decimals: u8) -> U256 {
    if token_decimals == 0 {
        return amount;
    }
    match pow10(token_decimals) {
        Some(scale) => narrow(U512::from(amount) * U512::from(TEN_TO_THE_18) / scale),
        None => U256::ZERO,
    }
}

/// Inverse of [`normalize`], truncating toward zero.
pub fn denormalize(amount: U256, token_decimals: u8) -> U256 {
    if token_decimals == 0 {
        return amount;
    }
    pow10(token_decimals).map_or(U256::MAX, |scale| {
        narrow(U512::from(amount) * scale / U512::from(TEN_TO_THE_18))
    })
}

/// Multiplies two 18-decimal values, keeping the result at 18 decimals.
pub fn multiply_normalized(a: U256, b: U256) -> U256 {
    narrow(U512::from(a) * U512::from(b) / U512::from(TEN_TO_THE_18))
}

/// Divides two 18-decimal values, keeping the result at 18 decimals. Zero when `b` is zero.
pub fn divide_normalized(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::ZERO;
    }
    narrow(U512::from(a) * U512::from(TEN_TO_THE_18) / U512::from(b))
}

/// Integer division where a zero denominator means "no price" and yields zero.
pub fn safe_div(numerator: U256, denominator: U256) -> U256 {
    if denominator.is_zero() {
        U256::ZERO
    } else {
        numerator / denominator
    }
}

/// Unsigned magnitude of a signed swap delta.
pub fn absolute(value: I256) -> U256 {
    value.unsigned_abs()
}

/// Decimal division where a zero denominator yields zero.
pub fn safe_div_decimal(numerator: &BigDecimal, denominator: &BigDecimal) -> BigDecimal {
    if denominator.is_zero() {
        BigDecimal::zero()
    } else {
        numerator / denominator
    }
}

/// Raw token amount to a human decimal, e.g. `1_500_000` with 6 decimals is `1.5`.
pub fn to_decimal(value: U256, decimals: u8) -> BigDecimal {
    let digits = BigInt::from_bytes_be(Sign::Plus, &value.to_be_bytes::<32>());
    BigDecimal::new(digits, i64::from(decimals))
}

/// Decimal to 18-decimal fixed point, truncating toward zero. Negative values map to zero.
pub fn to_fixed(value: &BigDecimal) -> U256 {
    let scaled = (value * BigDecimal::from(1_000_000_000_000_000_000u64)).with_scale(0);
    let (digits, _) = scaled.into_bigint_and_exponent();
    match digits.to_bytes_be() {
        (Sign::Minus, _) => U256::ZERO,
        (_, bytes) => U256::try_from_be_slice(&bytes).unwrap_or(U256::MAX),
    }
}

/// Converts a Q64.96 square-root price into `(price0, price1)` as 18-decimal values,
/// where `price1` is token1 per token0 and `price0` is its inverse.
pub fn sqrt_price_x96_to_token_prices(
    sqrt_price_x96: U256,
    token0_decimals: u8,
    token1_decimals: u8,
) -> (U256, U256) {
    let (Some(scale0), Some(scale1)) = (pow10(token0_decimals), pow10(token1_decimals)) else {
        return (U256::ZERO, U256::ZERO);
    };
    let sqrt = U512::from(sqrt_price_x96);
    let numerator = sqrt * sqrt * U512::from(TEN_TO_THE_18) * scale0;
    let denominator = U512::from(Q192) * scale1;

    let price1 = narrow(numerator / denominator);
    let price0 = divide_normalized(TEN_TO_THE_18, price1);
    (price0, price1)
}
