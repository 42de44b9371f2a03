//! External transaction identifiers
//!
//! Every deposit and transfer gets an order id that the payment processor
//! sees, separate from the internal primary key. The prefix names the table
//! the record lives in: `DEP-` for deposits, `TRF-` for transfers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderKind {
    Deposit,
    Transfer,
}

impl OrderKind {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Deposit => "DEP",
            Self::Transfer => "TRF",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderId(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed order id: {0}")]
pub struct OrderIdError(pub String);

impl OrderId {
    /// Generate a fresh order id for a record of `kind`
    pub fn generate(kind: OrderKind) -> Self {
        Self(format!("{}-{}", kind.prefix(), Uuid::new_v4().simple()))
    }

    pub fn kind(&self) -> OrderKind {
        if self.0.starts_with("TRF-") {
            OrderKind::Transfer
        } else {
            OrderKind::Deposit
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OrderId {
    type Err = OrderIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, body) = s.split_once('-').ok_or_else(|| OrderIdError(s.to_string()))?;

        if !matches!(prefix, "DEP" | "TRF") {
            return Err(OrderIdError(s.to_string()));
        }
        if body.len() != 32 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(OrderIdError(s.to_string()));
        }

        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for OrderId {
    type Error = OrderIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderId> for String {
    fn from(id: OrderId) -> Self {
        id.0
    }
}
