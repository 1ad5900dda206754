//! Currency code value object.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::AccountError;

/// A three-letter currency code such as `EUR`.
///
/// Only the shape is checked; the code is stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Currency {
    type Err = AccountError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AccountError::InvalidCurrency {
                code: code.to_string(),
            });
        }
        Ok(Self(code.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for Currency {
    type Error = AccountError;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        code.parse()
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
