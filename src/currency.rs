use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WarikanError;

/// Currencies a group can keep its books in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Jpy,
    Usd,
    Eur,
    Gbp,
    Cny,
    Krw,
}

impl Currency {
    pub const ALL: [Currency; 6] = [
        Currency::Jpy,
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Cny,
        Currency::Krw,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Currency::Jpy => "JPY",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Cny => "CNY",
            Currency::Krw => "KRW",
        }
    }

    /// Number of decimal places of the minor unit.
    pub fn exponent(self) -> u32 {
        match self {
            Currency::Jpy | Currency::Krw => 0,
            Currency::Usd | Currency::Eur | Currency::Gbp | Currency::Cny => 2,
        }
    }

    fn scale(self) -> f64 {
        10f64.powi(self.exponent() as i32)
    }

    /// Size of the smallest denomination, e.g. 1 yen or 0.01 dollars.
    pub fn minor_unit(self) -> f64 {
        1.0 / self.scale()
    }

    /// Rounds half away from zero to the minor unit.
    pub fn round(self, amount: f64) -> f64 {
        (amount * self.scale()).round() / self.scale()
    }

    pub fn to_minor_units(self, amount: f64) -> i64 {
        (amount * self.scale()).round() as i64
    }

    pub fn from_minor_units(self, units: i64) -> f64 {
        units as f64 / self.scale()
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::Jpy
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = WarikanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_uppercase();
        Currency::ALL
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or_else(|| WarikanError::validation("currency", format!("unsupported currency: {s}")))
    }
}
