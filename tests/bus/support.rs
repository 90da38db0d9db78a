//! Shared fixtures: test messages, the account domain and polling helpers.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use mqbus::broker::InMemoryBroker;
use mqbus::dispatcher::{Context, HandlerError};
use mqbus::{Bus, BusConfig, Message, QueueNames};
use serde::{Deserialize, Serialize};

/// A bus with a short poll interval so stop() returns quickly.
pub fn fast_bus(broker: &InMemoryBroker) -> Bus {
    fast_bus_with_retries(broker, 1)
}

pub fn fast_bus_with_retries(broker: &InMemoryBroker, max_retries: u32) -> Bus {
    let config = BusConfig::default()
        .with_poll_interval(Duration::from_millis(10))
        .with_request_timeout(Duration::from_secs(5))
        .with_max_retries(max_retries);
    Bus::with_config(broker.clone(), config)
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

pub fn temp_queues(broker: &InMemoryBroker) -> Vec<String> {
    broker
        .queue_names()
        .into_iter()
        .filter(|q| QueueNames::is_temporary(q))
        .collect()
}

// =============================================================================
// Generic messages
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Message)]
#[message(response = EchoResponse)]
pub struct Echo {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoResponse {
    pub text: String,
    pub attempt: u32,
}

/// Shares `Echo`'s type name with an incompatible shape.
#[derive(Debug, Serialize, Deserialize, Message)]
#[message(name = "Echo", response = EchoResponse)]
pub struct MalformedEcho {
    pub count: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Message)]
#[message(name = "tests.numbered")]
pub struct Numbered {
    pub n: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Message)]
pub struct Notice {
    pub text: String,
}

pub fn echo_handler<S>(req: Echo, ctx: &Context<S>) -> Result<EchoResponse, HandlerError> {
    Ok(EchoResponse {
        text: req.text.to_uppercase(),
        attempt: ctx.retry_attempts(),
    })
}

// =============================================================================
// Account domain
// =============================================================================

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
pub struct AccountCreatedEvent {
    pub account: Account,
}

#[derive(Default)]
pub struct AccountStore {
    accounts: Mutex<BTreeMap<u64, Account>>,
    next_id: AtomicU64,
}

impl AccountStore {
    pub fn len(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }
}

pub mod create_account {
    use super::*;

    pub const WORKERS: usize = 4;

    pub fn handle(
        req: CreateAccount,
        ctx: &Context<AccountStore>,
    ) -> Result<CreateAccountResponse, HandlerError> {
        let store = ctx.state();
        let account = Account {
            id: store.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            name: req.name,
        };
        store
            .accounts
            .lock()
            .unwrap()
            .insert(account.id, account.clone());
        ctx.bus().publish(&AccountCreatedEvent {
            account: account.clone(),
        });
        Ok(CreateAccountResponse { account })
    }
}

pub mod get_account {
    use super::*;

    pub const WORKERS: usize = 2;

    pub fn handle(
        req: GetAccount,
        ctx: &Context<AccountStore>,
    ) -> Result<GetAccountResponse, HandlerError> {
        let accounts = ctx.state().accounts.lock().unwrap();
        accounts
            .get(&req.id)
            .cloned()
            .map(|account| GetAccountResponse { account })
            .ok_or_else(|| HandlerError::NotFound(format!("account {}", req.id)))
    }
}
