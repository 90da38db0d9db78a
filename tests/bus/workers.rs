use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use mqbus::broker::InMemoryBroker;
use mqbus::dispatcher::Dispatcher;
use mqbus::Message;

use crate::support::{fast_bus, wait_until, Numbered};

#[test]
fn single_worker_handles_messages_in_order() {
    let broker = InMemoryBroker::new();
    let bus = fast_bus(&broker);
    let seen = Arc::new(Mutex::new(Vec::<u64>::new()));

    let handle = Dispatcher::with_shared_state(bus.clone(), Arc::clone(&seen))
        .on::<Numbered, _>(1, |msg, ctx| {
            ctx.state().lock().unwrap().push(msg.n);
            Ok(())
        })
        .and_then(Dispatcher::start)
        .unwrap();

    for n in 1..=100 {
        bus.send_one_way(&Numbered { n }).unwrap();
    }
    assert!(wait_until(Duration::from_secs(5), || seen.lock().unwrap().len() == 100));

    let stats = handle.stop();
    assert_eq!(*seen.lock().unwrap(), (1..=100).collect::<Vec<u64>>());
    assert_eq!(stats.queue(&Numbered::inbound_queue()).handled, 100);
}

#[test]
fn four_workers_handle_each_message_exactly_once() {
    let broker = InMemoryBroker::new();
    let bus = fast_bus(&broker);
    let counts: Arc<Mutex<HashMap<u64, usize>>> = Arc::default();
    let workers_seen: Arc<Mutex<HashMap<String, usize>>> = Arc::default();

    let state = (Arc::clone(&counts), Arc::clone(&workers_seen));
    let handle = Dispatcher::with_state(bus.clone(), state)
        .on::<Numbered, _>(4, |msg, ctx| {
            let (counts, workers) = ctx.state();
            *counts.lock().unwrap().entry(msg.n).or_default() += 1;
            *workers
                .lock()
                .unwrap()
                .entry(ctx.worker_id().to_string())
                .or_default() += 1;
            thread::sleep(Duration::from_millis(1));
            Ok(())
        })
        .and_then(Dispatcher::start)
        .unwrap();
    assert_eq!(handle.worker_count(), 4);

    for n in 1..=200 {
        bus.send_one_way(&Numbered { n }).unwrap();
    }
    assert!(wait_until(Duration::from_secs(10), || {
        counts.lock().unwrap().values().sum::<usize>() >= 200
    }));

    let stats = handle.stop();
    let counts = counts.lock().unwrap();
    assert_eq!(counts.len(), 200);
    assert!(counts.values().all(|&c| c == 1));
    assert_eq!(stats.total().handled, 200);
    assert!(workers_seen
        .lock()
        .unwrap()
        .keys()
        .all(|w| w.starts_with("mq:tests.numbered.inq#")));
}

#[test]
fn stop_lets_the_in_flight_message_finish() {
    let broker = InMemoryBroker::new();
    let bus = fast_bus(&broker);
    let started = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));

    let state = (Arc::clone(&started), Arc::clone(&finished));
    let handle = Dispatcher::with_state(bus.clone(), state)
        .on::<Numbered, _>(1, |_, ctx| {
            let (started, finished) = ctx.state();
            started.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(150));
            finished.store(true, Ordering::SeqCst);
            Ok(())
        })
        .and_then(Dispatcher::start)
        .unwrap();

    bus.send_one_way(&Numbered { n: 1 }).unwrap();
    assert!(wait_until(Duration::from_secs(5), || started.load(Ordering::SeqCst)));

    let stats = handle.stop();
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(stats.total().handled, 1);
    assert_eq!(broker.unacked_len(), 0);
}

#[test]
fn queued_messages_survive_a_restart() {
    let broker = InMemoryBroker::new();
    let bus = fast_bus(&broker);
    let seen = Arc::new(Mutex::new(Vec::<u64>::new()));

    // Queue exists but nobody is consuming yet.
    for n in 1..=3 {
        bus.send_one_way(&Numbered { n }).unwrap();
    }
    assert_eq!(broker.len(&Numbered::inbound_queue()), 3);

    let handle = Dispatcher::with_shared_state(bus.clone(), Arc::clone(&seen))
        .on::<Numbered, _>(1, |msg, ctx| {
            ctx.state().lock().unwrap().push(msg.n);
            Ok(())
        })
        .and_then(Dispatcher::start)
        .unwrap();
    assert!(wait_until(Duration::from_secs(5), || seen.lock().unwrap().len() == 3));
    handle.stop();

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}
