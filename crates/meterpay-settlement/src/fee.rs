//! Platform fee on an incremental session charge.

use meterpay_types::{MeterpayError, Result, Wei, constants::RATE_DENOMINATOR};

/// `delta * rate / 100`, rounded half up.
///
/// Integer division with the remainder rounded away from zero when it is at
/// least half the denominator, so `0.5` wei of fee becomes `1`.
///
/// # Errors
/// Returns `ArithmeticOverflow` if `delta * rate` does not fit.
pub fn platform_fee(delta: Wei, rate: u8) -> Result<Wei> {
    let scaled = delta
        .checked_mul(Wei::from(rate))
        .and_then(|v| v.checked_add(RATE_DENOMINATOR / 2))
        .ok_or(MeterpayError::ArithmeticOverflow)?;
    Ok(scaled / RATE_DENOMINATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rate_on_500() {
        assert_eq!(platform_fee(500, 1).unwrap(), 5);
    }

    #[test]
    fn half_rounds_up() {
        assert_eq!(platform_fee(50, 1).unwrap(), 1);
        assert_eq!(platform_fee(150, 1).unwrap(), 2);
        assert_eq!(platform_fee(250, 1).unwrap(), 3);
    }

    #[test]
    fn below_half_rounds_down() {
        assert_eq!(platform_fee(49, 1).unwrap(), 0);
        assert_eq!(platform_fee(149, 1).unwrap(), 1);
        assert_eq!(platform_fee(1, 49).unwrap(), 0);
        assert_eq!(platform_fee(1, 50).unwrap(), 1);
    }

    #[test]
    fn rate_bounds() {
        assert_eq!(platform_fee(12_345, 0).unwrap(), 0);
        assert_eq!(platform_fee(12_345, 100).unwrap(), 12_345);
        assert_eq!(platform_fee(333, 33).unwrap(), 110);
    }

    #[test]
    fn fee_never_exceeds_delta() {
        for delta in 0..300u128 {
            for rate in [0u8, 1, 49, 50, 99, 100] {
                assert!(platform_fee(delta, rate).unwrap() <= delta);
            }
        }
    }

    #[test]
    fn overflow_rejected() {
        assert!(matches!(
            platform_fee(Wei::MAX, 2),
            Err(MeterpayError::ArithmeticOverflow)
        ));
    }
}
