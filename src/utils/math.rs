//! Fixed-point arithmetic and mathematical utilities.
//!
//! Amounts and prices are WAD-scaled `u128`s. Products of two WAD values do
//! not fit in 128 bits, so intermediates are carried in `U256` and narrowed
//! back with an explicit overflow check.

use alloy_primitives::U256;
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::utils::constants::{BPS_DIVISOR, WAD};

// ═══════════════════════════════════════════════════════════════════════════════
// SAFE ARITHMETIC OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(Error::Overflow {
        operation: format!("{} + {}", a, b),
    })
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or(Error::Underflow {
        operation: format!("{} - {}", a, b),
    })
}

/// Computes `(a * b) / c` with a 256-bit intermediate, rounding down
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 {
        return Err(Error::Overflow {
            operation: format!("({} * {}) / 0", a, b),
        });
    }
    let result = U256::from(a) * U256::from(b) / U256::from(c);
    narrow(result, "mul_div")
}

/// Computes `(a * b) / c` with a 256-bit intermediate, rounding up
pub fn mul_div_up(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 {
        return Err(Error::Overflow {
            operation: format!("ceil(({} * {}) / 0)", a, b),
        });
    }
    let numerator = U256::from(a) * U256::from(b);
    let divisor = U256::from(c);
    let mut result = numerator / divisor;
    if numerator % divisor != U256::ZERO {
        result += U256::from(1u8);
    }
    narrow(result, "mul_div_up")
}

/// Narrow a 256-bit value back to `u128`
pub fn narrow(value: U256, operation: &str) -> Result<u128> {
    u128::try_from(value).map_err(|_| Error::Overflow {
        operation: operation.to_string(),
    })
}

/// Narrow a 256-bit value, clamping at `u128::MAX`
pub fn saturating_narrow(value: U256) -> u128 {
    u128::try_from(value).unwrap_or(u128::MAX)
}

/// Checked 256-bit product
pub fn mul_u256(a: U256, b: U256, operation: &str) -> Result<U256> {
    a.checked_mul(b).ok_or(Error::Overflow {
        operation: operation.to_string(),
    })
}

/// Amount times price: USD value carried at WAD^2 scale
pub fn value_of(amount: u128, price: u128) -> U256 {
    U256::from(amount) * U256::from(price)
}

/// Apply a basis-point weight to a 256-bit value
pub fn apply_bps(value: U256, bps: u64) -> Result<U256> {
    Ok(mul_u256(value, U256::from(bps), "apply_bps")? / U256::from(BPS_DIVISOR))
}

// ═══════════════════════════════════════════════════════════════════════════════
// WAD OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// WAD multiplication, rounding down
pub fn wad_mul(a: u128, b: u128) -> Result<u128> {
    mul_div(a, b, WAD)
}

/// WAD exponentiation by squaring
pub fn wad_pow(base: u128, mut exponent: u64) -> Result<u128> {
    let mut result = WAD;
    let mut base = base;

    while exponent > 0 {
        if exponent % 2 == 1 {
            result = wad_mul(result, base)?;
        }
        exponent /= 2;
        if exponent > 0 {
            base = wad_mul(base, base)?;
        }
    }

    Ok(result)
}

// ═══════════════════════════════════════════════════════════════════════════════
// FORMATTING
// ═══════════════════════════════════════════════════════════════════════════════

/// Render a WAD value as a decimal string (e.g. `1.05`)
pub fn format_wad(value: u128) -> String {
    match i128::try_from(value)
        .ok()
        .and_then(|v| Decimal::try_from_i128_with_scale(v, 18).ok())
    {
        Some(decimal) => decimal.normalize().to_string(),
        None => format!("{}", value / WAD),
    }
}

/// Render basis points as a percentage string (e.g. `7.5%`)
pub fn format_bps(bps: u64) -> String {
    let decimal = Decimal::new(bps as i64, 2).normalize();
    format!("{}%", decimal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_arithmetic() {
        assert!(safe_add(1, 2).is_ok());
        assert!(safe_add(u128::MAX, 1).is_err());

        assert!(safe_sub(5, 3).is_ok());
        assert!(safe_sub(3, 5).is_err());
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        // 10^30 * 10^18 overflows u128 but the quotient fits
        let a = 1_000_000_000_000 * WAD;
        assert_eq!(mul_div(a, WAD, WAD).unwrap(), a);
        assert!(mul_div(1, 1, 0).is_err());
        assert!(mul_div(u128::MAX, 2, 1).is_err());
    }

    #[test]
    fn test_mul_div_up() {
        assert_eq!(mul_div_up(10, 1, 3).unwrap(), 4);
        assert_eq!(mul_div_up(9, 1, 3).unwrap(), 3);
        assert_eq!(mul_div(10, 1, 3).unwrap(), 3);
    }

    #[test]
    fn test_apply_bps() {
        let value = value_of(100 * WAD, WAD);
        let weighted = apply_bps(value, 7_500).unwrap();
        assert_eq!(weighted, value_of(75 * WAD, WAD));
    }

    #[test]
    fn test_wad_pow() {
        let two = 2 * WAD;
        assert_eq!(wad_pow(two, 0).unwrap(), WAD);
        assert_eq!(wad_pow(two, 1).unwrap(), two);
        assert_eq!(wad_pow(two, 10).unwrap(), 1024 * WAD);
    }

    #[test]
    fn test_format_wad() {
        assert_eq!(format_wad(WAD), "1");
        assert_eq!(format_wad(WAD + WAD / 20), "1.05");
        assert_eq!(format_wad(0), "0");
    }

    #[test]
    fn test_format_bps() {
        assert_eq!(format_bps(750), "7.5%");
        assert_eq!(format_bps(10_000), "100%");
    }
}
