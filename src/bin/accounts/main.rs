//! Account service demo.
//!
//! Starts the account handlers on an in-memory broker, then drives them
//! through the bus: a burst of `CreateAccount { name: "Peter" }` requests,
//! a listing, one delete and a delete-all.
//!
//! Environment:
//! - `RUST_LOG` (default `mqbus=info,accounts=info`)
//! - `MQBUS_LOG_FORMAT=json|pretty` (default `pretty`)
//! - `MQBUS_DEMO_REQUESTS` number of create requests (default 12)
//! - `MQBUS_*` bus settings, see `BusConfig::from_env`

mod handlers;
mod model;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use mqbus::broker::InMemoryBroker;
use mqbus::dispatcher::Dispatcher;
use mqbus::{Bus, BusConfig, Message};
use tracing::{info, info_span, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use model::{
    AccountCreatedEvent, AccountDeletedEvent, AccountStore, AccountsDeletedEvent, CreateAccount,
    DeleteAccount, DeleteAccounts, GetAccount, GetAccounts,
};

const DEFAULT_REQUESTS: usize = 12;

fn init_logging() -> Result<()> {
    let log_format = std::env::var("MQBUS_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("mqbus=info,accounts=info"))
        .context("invalid log filter")?;

    match log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init()?,
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .try_init()?,
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;

    let config = BusConfig::from_env().context("loading bus configuration")?;
    let requests = match std::env::var("MQBUS_DEMO_REQUESTS") {
        Ok(value) => value.parse().context("MQBUS_DEMO_REQUESTS")?,
        Err(_) => DEFAULT_REQUESTS,
    };
    info!(?config, requests, "accounts demo starting");

    let broker = InMemoryBroker::new();
    let bus = Bus::with_config(broker.clone(), config).with_span(info_span!("accounts"));
    let store = Arc::new(AccountStore::default());

    let handle = mqbus::register_handlers!(
        Dispatcher::with_shared_state(bus.clone(), Arc::clone(&store)),
        handlers::create_account,
        handlers::get_account,
        handlers::get_accounts,
        handlers::delete_account,
        handlers::delete_accounts,
    )?
    .subscribe::<AccountCreatedEvent, _>("logger", 1, handlers::events::on_account_created)?
    .on::<AccountDeletedEvent, _>(1, handlers::events::on_account_deleted)?
    .on::<AccountsDeletedEvent, _>(1, handlers::events::on_accounts_deleted)?
    .start()?;

    for _ in 0..requests {
        let response = bus.send(&CreateAccount {
            name: "Peter".into(),
        })?;
        info!(id = response.account.id, name = %response.account.name, "created");
    }

    let accounts = bus.send(&GetAccounts {})?.accounts;
    info!(count = accounts.len(), "listed accounts");

    if let Some(first) = accounts.first() {
        bus.send(&DeleteAccount { id: first.id })?;
        match bus.send(&GetAccount { id: first.id }) {
            Ok(found) => warn!(id = found.account.id, "deleted account still present"),
            Err(err) => info!(id = first.id, error = %err, "lookup after delete failed as expected"),
        }
    }
    bus.send(&DeleteAccounts {})?;

    wait_for_drain(
        &broker,
        &[
            AccountCreatedEvent::exchange(),
            AccountDeletedEvent::inbound_queue(),
            AccountsDeletedEvent::inbound_queue(),
        ],
        Duration::from_secs(2),
    );

    let stats = handle.stop();
    for (queue, s) in stats.iter() {
        info!(
            queue,
            handled = s.handled,
            replied = s.replied,
            retried = s.retried,
            dead_lettered = s.dead_lettered,
            "worker stats"
        );
    }
    info!(accounts_left = store.all().map(|a| a.len()).unwrap_or(0), "done");
    Ok(())
}

/// Give fire-and-forget events a moment to be consumed before shutdown.
fn wait_for_drain(broker: &InMemoryBroker, queues: &[String], timeout: Duration) {
    let deadline = Instant::now() + timeout;
    let subscription_queues: Vec<String> = queues
        .iter()
        .flat_map(|q| {
            let bound = broker.bindings(q);
            if bound.is_empty() {
                vec![q.clone()]
            } else {
                bound
            }
        })
        .collect();

    while Instant::now() < deadline {
        let pending: usize = subscription_queues.iter().map(|q| broker.len(q)).sum();
        if pending == 0 && broker.unacked_len() == 0 {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    warn!("events still pending at shutdown");
}
