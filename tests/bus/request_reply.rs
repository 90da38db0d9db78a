use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mqbus::broker::InMemoryBroker;
use mqbus::dispatcher::Dispatcher;
use mqbus::{Bus, BusConfig, BusError, Codec, ErrorKind, Message};

use crate::support::{
    self, create_account, echo_handler, fast_bus, get_account, temp_queues, AccountStore,
    CreateAccount, Echo, GetAccount, MalformedEcho,
};

#[test]
fn send_returns_what_the_handler_computed() {
    let broker = InMemoryBroker::new();
    let bus = fast_bus(&broker);
    let handle = Dispatcher::new(bus.clone())
        .handle::<Echo, _>(1, echo_handler)
        .and_then(Dispatcher::start)
        .unwrap();

    let response = bus.send(&Echo { text: "hello".into() }).unwrap();
    assert_eq!(response.text, "HELLO");
    assert_eq!(response.attempt, 0);

    let stats = handle.stop();
    assert_eq!(stats.queue(&Echo::inbound_queue()).replied, 1);
    assert!(temp_queues(&broker).is_empty());
}

#[test]
fn concurrent_senders_only_see_their_own_replies() {
    let broker = InMemoryBroker::new();
    let bus = fast_bus(&broker);
    let handle = Dispatcher::new(bus.clone())
        .handle::<Echo, _>(4, echo_handler)
        .and_then(Dispatcher::start)
        .unwrap();

    let senders: Vec<_> = (0..8)
        .map(|t| {
            let bus = bus.clone();
            thread::spawn(move || {
                for i in 0..10 {
                    let text = format!("sender-{t}-call-{i}");
                    let response = bus.send(&Echo { text: text.clone() }).unwrap();
                    assert_eq!(response.text, text.to_uppercase());
                }
            })
        })
        .collect();
    for sender in senders {
        sender.join().unwrap();
    }

    let stats = handle.stop();
    assert_eq!(stats.total().replied, 80);
    assert!(temp_queues(&broker).is_empty());
}

#[test]
fn creating_peter_repeatedly_yields_distinct_ids() {
    let broker = InMemoryBroker::new();
    let bus = fast_bus(&broker);
    let store = Arc::new(AccountStore::default());
    let handle = mqbus::register_handlers!(
        Dispatcher::with_shared_state(bus.clone(), Arc::clone(&store)),
        create_account,
        get_account,
    )
    .and_then(Dispatcher::start)
    .unwrap();

    let mut ids = HashSet::new();
    for _ in 0..12 {
        let response = bus
            .send(&CreateAccount {
                name: "Peter".into(),
            })
            .unwrap();
        assert_eq!(response.account.name, "Peter");
        assert!(ids.insert(response.account.id), "duplicate id");
    }
    assert_eq!(store.len(), 12);

    let some_id = *ids.iter().next().unwrap();
    let fetched = bus.send(&GetAccount { id: some_id }).unwrap();
    assert_eq!(fetched.account.id, some_id);

    handle.stop();
}

#[test]
fn missing_account_fails_the_send_with_a_handler_error() {
    let broker = InMemoryBroker::new();
    let bus = fast_bus(&broker);
    let handle = Dispatcher::with_state(bus.clone(), AccountStore::default())
        .handle::<GetAccount, _>(1, get_account::handle)
        .and_then(Dispatcher::start)
        .unwrap();

    let err = bus.send(&GetAccount { id: 404 }).unwrap_err();
    assert!(
        matches!(err, BusError::Handler(ref msg) if msg.contains("account 404")),
        "unexpected: {err:?}"
    );

    handle.stop();
    assert_eq!(broker.len(&GetAccount::dead_letter_queue()), 1);
}

#[test]
fn undecodable_request_is_dead_lettered_without_retry() {
    let broker = InMemoryBroker::new();
    let bus = fast_bus(&broker);
    let handle = Dispatcher::new(bus.clone())
        .handle::<Echo, _>(1, echo_handler)
        .and_then(Dispatcher::start)
        .unwrap();

    let err = bus.send(&MalformedEcho { count: vec![1, 2] }).unwrap_err();
    assert!(matches!(err, BusError::Deserialization(_)), "unexpected: {err:?}");

    let stats = handle.stop();
    let echo = stats.queue(&Echo::inbound_queue());
    assert_eq!(echo.retried, 0);
    assert_eq!(echo.dead_lettered, 1);
    assert_eq!(echo.handled, 0);

    let dead = broker.messages(&Echo::dead_letter_queue());
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].error.as_ref().unwrap().kind, ErrorKind::Deserialization);
}

#[test]
fn bitcode_payloads_round_trip() {
    let broker = InMemoryBroker::new();
    let config = BusConfig::default()
        .with_codec(Codec::Bitcode)
        .with_poll_interval(Duration::from_millis(10));
    let bus = Bus::with_config(broker.clone(), config);
    let handle = Dispatcher::new(bus.clone())
        .handle::<Echo, _>(1, echo_handler)
        .and_then(Dispatcher::start)
        .unwrap();

    let response = bus.send(&Echo { text: "binary".into() }).unwrap();
    assert_eq!(response.text, "BINARY");
    handle.stop();
}

#[test]
fn handlers_can_send_requests_themselves() {
    let broker = InMemoryBroker::new();
    let bus = support::fast_bus(&broker);
    let store = Arc::new(AccountStore::default());

    // A second request type whose handler calls CreateAccount through the bus.
    let handle = Dispatcher::with_shared_state(bus.clone(), Arc::clone(&store))
        .handle::<CreateAccount, _>(1, create_account::handle)
        .and_then(|d| {
            d.handle::<Echo, _>(1, |req, ctx| {
                let created = ctx.bus().send(&CreateAccount { name: req.text })?;
                Ok(support::EchoResponse {
                    text: created.account.id.to_string(),
                    attempt: ctx.retry_attempts(),
                })
            })
        })
        .and_then(Dispatcher::start)
        .unwrap();

    let response = bus.send(&Echo { text: "nested".into() }).unwrap();
    assert_eq!(response.text, "1");
    assert_eq!(store.len(), 1);
    handle.stop();
}
