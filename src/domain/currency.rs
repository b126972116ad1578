//! Currency codes
//!
//! The closed set of ISO currencies an account can be opened in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported account currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Usd,
    Gbp,
    Jpy,
    Chf,
    Cad,
    Aud,
    Pln,
}

/// Error returned when a code is outside the supported set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported currency: {0}")]
pub struct UnsupportedCurrency(pub String);

impl Currency {
    pub const ALL: [Currency; 8] = [
        Currency::Eur,
        Currency::Usd,
        Currency::Gbp,
        Currency::Jpy,
        Currency::Chf,
        Currency::Cad,
        Currency::Aud,
        Currency::Pln,
    ];

    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Chf => "CHF",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
            Currency::Pln => "PLN",
        }
    }

    /// Country prefix used for account identifiers issued in this currency.
    pub fn country_code(&self) -> &'static str {
        match self {
            Currency::Eur => "PT",
            Currency::Usd => "US",
            Currency::Gbp => "GB",
            Currency::Jpy => "JP",
            Currency::Chf => "CH",
            Currency::Cad => "CA",
            Currency::Aud => "AU",
            Currency::Pln => "PL",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = UnsupportedCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Currency::ALL
            .iter()
            .copied()
            .find(|c| c.code() == upper)
            .ok_or_else(|| UnsupportedCurrency(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("eur".parse::<Currency>().unwrap(), Currency::Eur);
        assert_eq!(" PLN ".parse::<Currency>().unwrap(), Currency::Pln);
    }

    #[test]
    fn test_unknown_code_rejected() {
        let err = "SEK".parse::<Currency>().unwrap_err();
        assert_eq!(err, UnsupportedCurrency("SEK".to_string()));
    }

    #[test]
    fn test_serde_uses_iso_code() {
        let json = serde_json::to_string(&Currency::Gbp).unwrap();
        assert_eq!(json, r#""GBP""#);
        let back: Currency = serde_json::from_str(r#""CHF""#).unwrap();
        assert_eq!(back, Currency::Chf);
    }

    #[test]
    fn test_every_currency_has_country_prefix() {
        for currency in Currency::ALL {
            assert_eq!(currency.country_code().len(), 2);
            assert_eq!(currency.code().parse::<Currency>().unwrap(), currency);
        }
    }
}
