//! Account domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, Event, Message, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::Currency;

/// Events that can occur on an account aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AccountEvent {
    /// Account was opened.
    AccountCreated(AccountCreated),

    /// Account was frozen.
    AccountLocked(AccountLocked),

    /// Account was released from a lock.
    AccountUnlocked(AccountUnlocked),

    /// Account was closed.
    AccountClosed(AccountClosed),
}

impl DomainEvent for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::AccountCreated(_) => AccountCreated::MESSAGE_TYPE,
            AccountEvent::AccountLocked(_) => AccountLocked::MESSAGE_TYPE,
            AccountEvent::AccountUnlocked(_) => AccountUnlocked::MESSAGE_TYPE,
            AccountEvent::AccountClosed(_) => AccountClosed::MESSAGE_TYPE,
        }
    }

    fn version(&self) -> Version {
        match self {
            AccountEvent::AccountCreated(e) => e.version,
            AccountEvent::AccountLocked(e) => e.version,
            AccountEvent::AccountUnlocked(e) => e.version,
            AccountEvent::AccountClosed(e) => e.version,
        }
    }
}

/// An account was opened for a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountCreated {
    pub account_id: AggregateId,
    pub customer_id: AggregateId,
    pub version: Version,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

impl Message for AccountCreated {
    const MESSAGE_TYPE: &'static str = "AccountCreated";

    fn aggregate_id(&self) -> AggregateId {
        self.account_id
    }

    fn version(&self) -> Version {
        self.version
    }
}

impl Event for AccountCreated {}

/// An account was frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountLocked {
    pub account_id: AggregateId,
    pub version: Version,
    pub locked_at: DateTime<Utc>,
}

impl Message for AccountLocked {
    const MESSAGE_TYPE: &'static str = "AccountLocked";

    fn aggregate_id(&self) -> AggregateId {
        self.account_id
    }

    fn version(&self) -> Version {
        self.version
    }
}

impl Event for AccountLocked {}

/// An account was released from a lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountUnlocked {
    pub account_id: AggregateId,
    pub version: Version,
    pub unlocked_at: DateTime<Utc>,
}

impl Message for AccountUnlocked {
    const MESSAGE_TYPE: &'static str = "AccountUnlocked";

    fn aggregate_id(&self) -> AggregateId {
        self.account_id
    }

    fn version(&self) -> Version {
        self.version
    }
}

impl Event for AccountUnlocked {}

/// An account was closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountClosed {
    pub account_id: AggregateId,
    pub version: Version,
    pub closed_at: DateTime<Utc>,
}

impl Message for AccountClosed {
    const MESSAGE_TYPE: &'static str = "AccountClosed";

    fn aggregate_id(&self) -> AggregateId {
        self.account_id
    }

    fn version(&self) -> Version {
        self.version
    }
}

impl Event for AccountClosed {}
