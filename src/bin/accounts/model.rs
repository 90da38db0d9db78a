//! Account messages and the in-memory store behind the handlers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use mqbus::dispatcher::HandlerError;
use mqbus::Message;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Message)]
#[message(response = CreateAccountResponse)]
pub struct CreateAccount {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAccountResponse {
    pub account: Account,
    pub result: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Message)]
#[message(response = GetAccountResponse)]
pub struct GetAccount {
    pub id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetAccountResponse {
    pub account: Account,
}

#[derive(Debug, Serialize, Deserialize, Message)]
#[message(response = GetAccountsResponse)]
pub struct GetAccounts {}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetAccountsResponse {
    pub accounts: Vec<Account>,
}

#[derive(Debug, Serialize, Deserialize, Message)]
#[message(response = DeleteAccountResponse)]
pub struct DeleteAccount {
    pub id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteAccountResponse {
    pub result: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Message)]
#[message(response = DeleteAccountsResponse)]
pub struct DeleteAccounts {}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteAccountsResponse {
    pub result: Option<String>,
}

/// Published (fan-out) after an account is stored.
#[derive(Debug, Serialize, Deserialize, Message)]
pub struct AccountCreatedEvent {
    pub account: Account,
}

/// Sent one-way to its inbound queue after a delete.
#[derive(Debug, Serialize, Deserialize, Message)]
pub struct AccountDeletedEvent {
    pub id: u64,
}

#[derive(Debug, Serialize, Deserialize, Message)]
pub struct AccountsDeletedEvent {
    pub count: usize,
}

/// Accounts keyed by id; ids start at 1 and are never reused.
#[derive(Default)]
pub struct AccountStore {
    accounts: Mutex<BTreeMap<u64, Account>>,
    next_id: AtomicU64,
}

impl AccountStore {
    fn accounts(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<u64, Account>>, HandlerError> {
        self.accounts
            .lock()
            .map_err(|_| HandlerError::other("account store poisoned"))
    }

    pub fn create(&self, name: &str) -> Result<Account, HandlerError> {
        let account = Account {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            name: name.to_string(),
        };
        self.accounts()?.insert(account.id, account.clone());
        Ok(account)
    }

    pub fn get(&self, id: u64) -> Result<Option<Account>, HandlerError> {
        Ok(self.accounts()?.get(&id).cloned())
    }

    pub fn all(&self) -> Result<Vec<Account>, HandlerError> {
        Ok(self.accounts()?.values().cloned().collect())
    }

    pub fn delete(&self, id: u64) -> Result<bool, HandlerError> {
        Ok(self.accounts()?.remove(&id).is_some())
    }

    /// Remove every account, returning how many there were.
    pub fn clear(&self) -> Result<usize, HandlerError> {
        let mut accounts = self.accounts()?;
        let count = accounts.len();
        accounts.clear();
        Ok(count)
    }
}
