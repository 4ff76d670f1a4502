use crate::error::ParseError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of decimals in one whole unit of the native token.
pub const DECIMALS: u32 = 18;
const UNIT: u128 = 10u128.pow(DECIMALS);

/// Multipliers in the payout table are scaled by this factor.
pub const MULTIPLIER_SCALE: u128 = 10_000;

/// Fixed-point monetary amount in the smallest unit (wei).
///
/// Serializes as a decimal string of wei so values survive JSON untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_wei(wei: u128) -> Self {
        Self(wei)
    }

    pub const fn from_units(units: u64) -> Self {
        Self(units as u128 * UNIT)
    }

    pub const fn wei(self) -> u128 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Whole units, rounded down.
    pub fn whole_units(self) -> u128 {
        self.0 / UNIT
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    pub fn saturating_mul(self, n: u128) -> Amount {
        Amount(self.0.saturating_mul(n))
    }

    pub fn checked_div(self, n: u128) -> Option<Amount> {
        self.0.checked_div(n).map(Amount)
    }

    /// `self × multiplier / 10_000`, floored.
    ///
    /// Split as `q·m + r·m/10_000` so the product stays in range for any
    /// realistic bet.
    pub fn apply_multiplier(self, multiplier: u32) -> Amount {
        let m = multiplier as u128;
        let q = self.0 / MULTIPLIER_SCALE;
        let r = self.0 % MULTIPLIER_SCALE;
        Amount(q.saturating_mul(m).saturating_add(r * m / MULTIPLIER_SCALE))
    }

    pub fn parse_wei(s: &str) -> Result<Self, ParseError> {
        s.trim()
            .parse::<u128>()
            .map(Amount)
            .map_err(|_| ParseError::Amount(s.to_string()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNIT;
        let frac = self.0 % UNIT;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{:0width$}", frac, width = DECIMALS as usize);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

/// Parses a decimal number of whole units, e.g. `"2847.392"`.
impl FromStr for Amount {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ParseError::Amount(s.to_string());
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(bad());
        }
        if frac.len() > DECIMALS as usize
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(bad());
        }
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| bad())?
        };
        let frac_wei: u128 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = DECIMALS as usize);
            padded.parse().map_err(|_| bad())?
        };
        whole
            .checked_mul(UNIT)
            .and_then(|w| w.checked_add(frac_wei))
            .map(Amount)
            .ok_or_else(bad)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Amount::parse_wei(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_fractional_units() {
        let a: Amount = "2847.392".parse().unwrap();
        assert_eq!(a.wei(), 2_847_392_000_000_000_000_000);
        assert_eq!(a.to_string(), "2847.392");
        assert_eq!(Amount::from_units(10).to_string(), "10");
        assert_eq!(".5".parse::<Amount>().unwrap().to_string(), "0.5");
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<Amount>().is_err());
        assert!("1.2.3".parse::<Amount>().is_err());
        assert!("-4".parse::<Amount>().is_err());
        assert!("0.0000000000000000001".parse::<Amount>().is_err());
    }

    #[test]
    fn multiplier_is_exact_for_scaled_values() {
        let bet = Amount::from_units(10);
        assert_eq!(
            bet.apply_multiplier(2_847_392),
            "2847.392".parse::<Amount>().unwrap()
        );
        assert_eq!(Amount::from_wei(9_999).apply_multiplier(10_000).wei(), 9_999);
        assert_eq!(bet.apply_multiplier(0), Amount::ZERO);
    }
}
