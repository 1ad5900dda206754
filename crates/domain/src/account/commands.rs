//! Account commands.

use common::{AggregateId, Command, Message, Version};
use serde::{Deserialize, Serialize};

/// Command to open an account for an existing customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccount {
    pub account_id: AggregateId,
    pub customer_id: AggregateId,
    pub version: Version,
    pub currency: String,
}

impl CreateAccount {
    /// Creates a command for a new account at version 1.
    pub fn new(
        account_id: AggregateId,
        customer_id: AggregateId,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            customer_id,
            version: Version::first(),
            currency: currency.into(),
        }
    }
}

impl Message for CreateAccount {
    const MESSAGE_TYPE: &'static str = "CreateAccount";

    fn aggregate_id(&self) -> AggregateId {
        self.account_id
    }

    fn version(&self) -> Version {
        self.version
    }
}

impl Command for CreateAccount {}

/// Command to freeze an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockAccount {
    pub account_id: AggregateId,
    pub version: Version,
}

impl LockAccount {
    pub fn new(account_id: AggregateId, version: Version) -> Self {
        Self {
            account_id,
            version,
        }
    }
}

impl Message for LockAccount {
    const MESSAGE_TYPE: &'static str = "LockAccount";

    fn aggregate_id(&self) -> AggregateId {
        self.account_id
    }

    fn version(&self) -> Version {
        self.version
    }
}

impl Command for LockAccount {}

/// Command to release a locked account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockAccount {
    pub account_id: AggregateId,
    pub version: Version,
}

impl UnlockAccount {
    pub fn new(account_id: AggregateId, version: Version) -> Self {
        Self {
            account_id,
            version,
        }
    }
}

impl Message for UnlockAccount {
    const MESSAGE_TYPE: &'static str = "UnlockAccount";

    fn aggregate_id(&self) -> AggregateId {
        self.account_id
    }

    fn version(&self) -> Version {
        self.version
    }
}

impl Command for UnlockAccount {}

/// Command to close an account for good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseAccount {
    pub account_id: AggregateId,
    pub version: Version,
}

impl CloseAccount {
    pub fn new(account_id: AggregateId, version: Version) -> Self {
        Self {
            account_id,
            version,
        }
    }
}

impl Message for CloseAccount {
    const MESSAGE_TYPE: &'static str = "CloseAccount";

    fn aggregate_id(&self) -> AggregateId {
        self.account_id
    }

    fn version(&self) -> Version {
        self.version
    }
}

impl Command for CloseAccount {}
