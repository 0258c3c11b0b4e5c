use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use serde::{Serialize, Serializer};

/// Number of decimal places every [`Percentage`] is rendered with.
pub const PERCENTAGE_DP: u32 = 2;

/// A spread expressed in percent, always carrying exactly two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percentage(Decimal);

impl Percentage {
    /// Lossy conversion for plotting.
    pub fn as_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }
}

impl std::fmt::Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Percentage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Convert a raw spread ratio into a [`Percentage`], ie/ `round(value * 100, 2dp)`.
///
/// Midpoints round away from zero. Returns `None` for non-finite or out of range input.
pub fn to_percentage(value: f64) -> Option<Percentage> {
    if !value.is_finite() {
        return None;
    }

    let mut pct = Decimal::from_f64(value)?
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(PERCENTAGE_DP, RoundingStrategy::MidpointAwayFromZero);

    // "-0.00" is noise
    if pct.is_zero() {
        pct.set_sign_positive(true);
    }
    pct.rescale(PERCENTAGE_DP);

    Some(Percentage(pct))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_percentage() {
        struct TestCase {
            input: f64,
            expected: Option<&'static str>,
        }

        let tests = vec![
            TestCase {
                // TC0: positive ratio
                input: 0.0523,
                expected: Some("5.23"),
            },
            TestCase {
                // TC1: negative ratio keeps two decimals
                input: -0.01,
                expected: Some("-1.00"),
            },
            TestCase {
                // TC2: whole percentages are padded
                input: 0.01,
                expected: Some("1.00"),
            },
            TestCase {
                // TC3: zero
                input: 0.0,
                expected: Some("0.00"),
            },
            TestCase {
                // TC4: extra precision is rounded
                input: 0.123456,
                expected: Some("12.35"),
            },
            TestCase {
                // TC5: tiny negative collapses to unsigned zero
                input: -0.00001,
                expected: Some("0.00"),
            },
            TestCase {
                // TC6: NaN is rejected
                input: f64::NAN,
                expected: None,
            },
            TestCase {
                // TC7: infinity is rejected
                input: f64::INFINITY,
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = to_percentage(test.input).map(|pct| pct.to_string());
            assert_eq!(
                actual.as_deref(),
                test.expected,
                "TC{} failed",
                index
            );
        }
    }

    #[test]
    fn test_percentage_sign_and_float() {
        let negative = to_percentage(-0.0123).unwrap();
        assert!(negative.is_negative());
        assert!((negative.as_f64() + 1.23).abs() < 1e-9);

        let zero = to_percentage(0.0).unwrap();
        assert!(!zero.is_negative());
    }
}
