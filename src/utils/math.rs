//! Checked integer arithmetic for ledger and reward computations.
//!
//! Every amount in the protocol is a `u128` count of base units. Nothing here
//! touches floating point, so floor-division results are bit-exact.

use crate::error::{Error, Result};
use crate::utils::constants::MAX_DECIMALS;

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

/// Safe multiplication with overflow check
pub fn safe_mul(a: u128, b: u128) -> Result<u128> {
    a.checked_mul(b).ok_or(Error::Overflow {
        operation: format!("{} * {}", a, b),
    })
}

/// Safe division with zero check
pub fn safe_div(a: u128, b: u128) -> Result<u128> {
    if b == 0 {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    Ok(a / b)
}

/// Computes `floor(a * b / c)` with a 256-bit intermediate product.
///
/// Only the quotient has to fit in `u128`: reward accrual multiplies an
/// 18-decimal emission by `WAD`, which routinely exceeds `u128::MAX` before
/// the division brings it back down.
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    let (hi, lo) = widening_mul(a, b);
    if hi == 0 {
        return Ok(lo / c);
    }
    if hi >= c {
        return Err(Error::Overflow {
            operation: format!("({} * {}) / {}", a, b, c),
        });
    }
    Ok(div_wide(hi, lo, c))
}

/// Full product of two u128 values as `(high, low)` halves
fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    const LOW: u128 = u64::MAX as u128;

    let (a_lo, a_hi) = (a & LOW, a >> 64);
    let (b_lo, b_hi) = (b & LOW, b >> 64);

    let p0 = a_lo * b_lo;
    let p1 = a_lo * b_hi;
    let p2 = a_hi * b_lo;
    let p3 = a_hi * b_hi;

    // p1 + p2 + carry can exceed u128, so sum the 64-bit halves separately
    let mid = (p0 >> 64) + (p1 & LOW) + (p2 & LOW);
    let lo = (p0 & LOW) | (mid << 64);
    let hi = p3 + (p1 >> 64) + (p2 >> 64) + (mid >> 64);
    (hi, lo)
}

/// `(hi * 2^128 + lo) / c`, requires `hi < c`
fn div_wide(hi: u128, lo: u128, c: u128) -> u128 {
    let mut rem = hi;
    let mut quotient = 0u128;
    for bit in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> bit) & 1);
        quotient <<= 1;
        // rem < c before the shift, so the true value is below 2c
        if carry == 1 || rem >= c {
            rem = rem.wrapping_sub(c);
            quotient |= 1;
        }
    }
    quotient
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECIMALS
// ═══════════════════════════════════════════════════════════════════════════════

/// 10^exp as u128
pub fn pow10(exp: u32) -> Result<u128> {
    if exp > MAX_DECIMALS as u32 {
        return Err(Error::Overflow {
            operation: format!("10^{}", exp),
        });
    }
    Ok(10u128.pow(exp))
}

/// Re-express `value` (with `from` decimals) in `to` decimals, rounding down.
///
/// Scaling up multiplies, scaling down floor-divides:
/// `rescale(1_500_000, 6, 18) == 1_500_000_000_000_000_000`.
pub fn rescale(value: u128, from: u32, to: u32) -> Result<u128> {
    if to >= from {
        safe_mul(value, pow10(to - from)?)
    } else {
        Ok(value / pow10(from - to)?)
    }
}

/// Format a base-unit amount as a decimal string, trimming trailing zeros
pub fn format_units(amount: u128, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let unit = match pow10(decimals as u32) {
        Ok(unit) => unit,
        Err(_) => return amount.to_string(),
    };
    let whole = amount / unit;
    let frac = amount % unit;
    if frac == 0 {
        return whole.to_string();
    }
    let frac_str = format!("{:0width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}
