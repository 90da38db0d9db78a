use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mqbus::broker::InMemoryBroker;
use mqbus::dispatcher::Dispatcher;
use mqbus::{Message, QueueNames};

use crate::support::{
    create_account, fast_bus, wait_until, AccountCreatedEvent, AccountStore, CreateAccount, Notice,
};

#[derive(Default)]
struct Counters {
    audit: AtomicUsize,
    mailer: AtomicUsize,
    direct: AtomicUsize,
}

#[test]
fn publish_reaches_every_subscriber_and_nothing_else() {
    let broker = InMemoryBroker::new();
    let bus = fast_bus(&broker);
    let counters = Arc::new(Counters::default());

    let handle = Dispatcher::with_shared_state(bus.clone(), Arc::clone(&counters))
        .subscribe::<Notice, _>("audit", 1, |_, ctx| {
            ctx.state().audit.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .and_then(|d| {
            d.subscribe::<Notice, _>("mailer", 2, |_, ctx| {
                ctx.state().mailer.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .and_then(|d| {
            d.on::<Notice, _>(1, |_, ctx| {
                ctx.state().direct.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .and_then(Dispatcher::start)
        .unwrap();

    for i in 0..3 {
        bus.publish(&Notice {
            text: format!("notice {i}"),
        });
    }
    assert!(wait_until(Duration::from_secs(5), || {
        counters.audit.load(Ordering::SeqCst) == 3 && counters.mailer.load(Ordering::SeqCst) == 3
    }));
    thread::sleep(Duration::from_millis(50));

    handle.stop();
    assert_eq!(counters.audit.load(Ordering::SeqCst), 3);
    assert_eq!(counters.mailer.load(Ordering::SeqCst), 3);
    assert_eq!(counters.direct.load(Ordering::SeqCst), 0);
    assert_eq!(
        broker.bindings(&Notice::exchange()),
        vec![
            QueueNames::subscription("Notice", "audit"),
            QueueNames::subscription("Notice", "mailer"),
        ]
    );
}

#[test]
fn publish_without_subscribers_is_dropped_quietly() {
    let broker = InMemoryBroker::new();
    let bus = fast_bus(&broker);

    bus.publish(&Notice {
        text: "into the void".into(),
    });
    assert!(bus
        .try_publish(&Notice {
            text: "still fine".into()
        })
        .is_ok());
    assert!(broker.queue_names().is_empty());
}

#[test]
fn account_creation_notifies_subscribers() {
    let broker = InMemoryBroker::new();
    let bus = fast_bus(&broker);
    let store = Arc::new(AccountStore::default());
    let created = Arc::new(AtomicUsize::new(0));

    let listener = {
        let created = Arc::clone(&created);
        Dispatcher::new(bus.clone())
            .subscribe::<AccountCreatedEvent, _>("logger", 1, move |event, _| {
                assert_eq!(event.account.name, "Peter");
                created.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .and_then(Dispatcher::start)
            .unwrap()
    };
    let service = Dispatcher::with_shared_state(bus.clone(), Arc::clone(&store))
        .handle::<CreateAccount, _>(create_account::WORKERS, create_account::handle)
        .and_then(Dispatcher::start)
        .unwrap();

    for _ in 0..5 {
        bus.send(&CreateAccount {
            name: "Peter".into(),
        })
        .unwrap();
    }
    assert!(wait_until(Duration::from_secs(5), || created.load(Ordering::SeqCst) == 5));

    service.stop();
    listener.stop();
    assert_eq!(store.len(), 5);
}
