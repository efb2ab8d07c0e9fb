//! Conversions between integer minor units and the decimal amounts the
//! downstream services speak.

pub fn cents_to_major(cents: i64) -> f64 {
    cents as f64 / 100.0
}

pub fn major_to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Serde adapter for `i64` cent fields that travel as decimal amounts.
pub mod major_units {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(cents: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(super::cents_to_major(*cents))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        f64::deserialize(deserializer).map(super::major_to_cents)
    }
}
