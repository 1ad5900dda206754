//! Account aggregate implementation.

use chrono::Utc;
use common::{AggregateId, AggregateState, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    AccountClosed, AccountCreated, AccountError, AccountEvent, AccountLocked, AccountUnlocked,
    CloseAccount, CreateAccount, Currency, LockAccount, UnlockAccount,
};

/// Account aggregate root.
///
/// State transitions:
/// ```text
/// Open ──► Locked ──► Unlocked ──► Locked ...
///   │         │           │
///   └─────────┴───────────┴──► Closed
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    customer_id: Option<AggregateId>,
    currency: Option<Currency>,
    state: AggregateState,
}

impl Aggregate for Account {
    type Event = AccountEvent;
    type Error = AccountError;

    fn aggregate_type() -> &'static str {
        "Account"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            AccountEvent::AccountCreated(data) => {
                self.id = Some(data.account_id);
                self.customer_id = Some(data.customer_id);
                self.currency = Some(data.currency);
                self.state = AggregateState::Open;
            }
            AccountEvent::AccountLocked(_) => self.state = AggregateState::Locked,
            AccountEvent::AccountUnlocked(_) => self.state = AggregateState::Unlocked,
            AccountEvent::AccountClosed(_) => self.state = AggregateState::Closed,
        }
    }
}

// Query methods
impl Account {
    pub fn customer_id(&self) -> Option<AggregateId> {
        self.customer_id
    }

    pub fn currency(&self) -> Option<&Currency> {
        self.currency.as_ref()
    }

    pub fn state(&self) -> AggregateState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state == AggregateState::Locked
    }
}

// Command methods (return events)
impl Account {
    /// Opens a new account for a customer.
    ///
    /// Whether the customer exists is checked by the persistence gateway.
    pub fn create(&self, cmd: &CreateAccount) -> Result<Vec<AccountEvent>, AccountError> {
        if self.id.is_some() {
            return Err(AccountError::AlreadyCreated);
        }
        let currency: Currency = cmd.currency.parse()?;

        Ok(vec![AccountEvent::AccountCreated(AccountCreated {
            account_id: cmd.account_id,
            customer_id: cmd.customer_id,
            version: cmd.version,
            currency,
            created_at: Utc::now(),
        })])
    }

    /// Freezes the account.
    pub fn lock(&self, cmd: &LockAccount) -> Result<Vec<AccountEvent>, AccountError> {
        self.ensure_active("lock")?;
        if self.is_locked() {
            return Err(self.invalid("lock"));
        }

        Ok(vec![AccountEvent::AccountLocked(AccountLocked {
            account_id: cmd.account_id,
            version: cmd.version,
            locked_at: Utc::now(),
        })])
    }

    /// Releases a locked account.
    pub fn unlock(&self, cmd: &UnlockAccount) -> Result<Vec<AccountEvent>, AccountError> {
        self.ensure_active("unlock")?;
        if !self.is_locked() {
            return Err(self.invalid("unlock"));
        }

        Ok(vec![AccountEvent::AccountUnlocked(AccountUnlocked {
            account_id: cmd.account_id,
            version: cmd.version,
            unlocked_at: Utc::now(),
        })])
    }

    /// Closes the account; no further commands are accepted.
    pub fn close(&self, cmd: &CloseAccount) -> Result<Vec<AccountEvent>, AccountError> {
        self.ensure_active("close")?;

        Ok(vec![AccountEvent::AccountClosed(AccountClosed {
            account_id: cmd.account_id,
            version: cmd.version,
            closed_at: Utc::now(),
        })])
    }

    fn ensure_active(&self, action: &'static str) -> Result<(), AccountError> {
        if self.id.is_none() {
            return Err(AccountError::NotCreated);
        }
        if self.state.is_terminal() {
            return Err(self.invalid(action));
        }
        Ok(())
    }

    fn invalid(&self, action: &'static str) -> AccountError {
        AccountError::InvalidStateTransition {
            current_state: self.state,
            action,
        }
    }
}
