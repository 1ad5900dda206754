//! Current-state rows kept on the command side.

use common::{AggregateId, AggregateState, Version};
use serde::{Deserialize, Serialize};

/// Stored state of a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub id: AggregateId,
    pub version: Version,
    pub first_name: String,
    pub last_name: String,
    pub state: AggregateState,
}

/// Stored state of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub id: AggregateId,
    pub version: Version,
    /// Owning customer; must be stored before the account.
    pub customer_id: AggregateId,
    pub currency: String,
    pub state: AggregateState,
}

/// Either kind of snapshot, for callers that save generically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AggregateSnapshot {
    Customer(CustomerSnapshot),
    Account(AccountSnapshot),
}

impl AggregateSnapshot {
    pub fn id(&self) -> AggregateId {
        match self {
            Self::Customer(c) => c.id,
            Self::Account(a) => a.id,
        }
    }

    pub fn version(&self) -> Version {
        match self {
            Self::Customer(c) => c.version,
            Self::Account(a) => a.version,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Customer(_) => "Customer",
            Self::Account(_) => "Account",
        }
    }
}

impl From<CustomerSnapshot> for AggregateSnapshot {
    fn from(snapshot: CustomerSnapshot) -> Self {
        Self::Customer(snapshot)
    }
}

impl From<AccountSnapshot> for AggregateSnapshot {
    fn from(snapshot: AccountSnapshot) -> Self {
        Self::Account(snapshot)
    }
}
