//! Fixed-point math utilities for deterministic simulation.
//!
//! Every fractional quantity in world state (power efficiency, production
//! progress, turret cadence, renewal scores) is a [`Fixed`]. Floating-point
//! values only appear while parsing human-authored content, and are
//! converted once at load time.

use fixed::types::I32F32;

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Construct a fixed-point value from a ratio of integers.
///
/// Returns zero when `denominator` is zero.
#[must_use]
pub fn ratio(numerator: i64, denominator: i64) -> Fixed {
    if denominator == 0 {
        return Fixed::ZERO;
    }
    Fixed::from_num(numerator) / Fixed::from_num(denominator)
}

/// Raise a non-negative fixed-point value to a small integer power.
#[must_use]
pub fn powi(base: Fixed, exponent: u32) -> Fixed {
    let mut result = Fixed::ONE;
    for _ in 0..exponent {
        result = result.saturating_mul(base);
    }
    result
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for fixed-point numbers written as decimals in RON content.
///
/// Content authors write `range: 6.5`; the value is converted to [`Fixed`]
/// once, at parse time, and written back out as a decimal.
pub mod fixed_decimal_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize as a decimal number.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize from a decimal number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| serde::de::Error::custom(format!("value {value} out of fixed range")))
    }

    /// The same conversion for optional values.
    pub mod option {
        use super::Fixed;
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        /// Serialize as an optional decimal.
        pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            value.map(|v| v.to_num::<f64>()).serialize(serializer)
        }

        /// Deserialize from an optional decimal.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<f64>::deserialize(deserializer)? {
                Some(value) => Fixed::checked_from_num(value)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("value {value} out of fixed range"))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(1, 2), Fixed::from_num(0.5));
        assert_eq!(ratio(7, 0), Fixed::ZERO);
        assert_eq!(ratio(12, 4), Fixed::from_num(3));
    }

    #[test]
    fn test_powi() {
        let half = Fixed::from_num(0.5);
        assert_eq!(powi(half, 0), Fixed::ONE);
        assert_eq!(powi(half, 2), Fixed::from_num(0.25));
        assert_eq!(powi(Fixed::from_num(3), 3), Fixed::from_num(27));
    }

    #[test]
    fn test_fixed_serde_preserves_bits() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrapper(#[serde(with = "fixed_serde")] Fixed);

        let value = Fixed::from_bits(0x1234_5678_9abc);
        let bytes = bincode::serialize(&Wrapper(value)).unwrap();
        let back: Wrapper = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.0, value);
    }

    #[test]
    fn test_decimal_serde_from_ron() {
        #[derive(serde::Deserialize)]
        struct Range {
            #[serde(with = "fixed_decimal_serde")]
            range: Fixed,
        }

        let parsed: Range = ron::from_str("(range: 6.5)").unwrap();
        assert_eq!(parsed.range, Fixed::from_num(6.5));
    }
}
