use shmring::{
    CancelToken, Candidate, Consume, Edge, Producer, Publish, ResourceNames, RingBuffer,
    RingConfig, RingError, ShutdownPhase,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Long enough for a thread that is going to block to reach its wait.
const SETTLE: Duration = Duration::from_millis(150);
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn names(tag: &str) -> ResourceNames {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    ResourceNames::from_prefix(&format!(
        "shmring_it_{}_{}_{}",
        tag,
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    ))
    .unwrap()
}

/// Attaches a producer on its own thread and publishes `values`, reporting
/// every result.
fn spawn_publisher(
    names: &ResourceNames,
    values: Vec<u64>,
    tx: mpsc::Sender<(u64, Publish)>,
) -> thread::JoinHandle<()> {
    let names = names.clone();
    thread::spawn(move || {
        let producer = Producer::<u64>::attach(&names).unwrap();
        let cancel = CancelToken::new();
        for value in values {
            let outcome = producer.publish(&value, &cancel).unwrap();
            tx.send((value, outcome)).unwrap();
            if outcome == Publish::Stop {
                break;
            }
        }
    })
}

#[test]
fn test_full_ring_blocks_until_consume() {
    let names = names("full");
    let mut ring = RingBuffer::<u64>::create(&names, RingConfig::new(4, 2)).unwrap();
    let cancel = CancelToken::new();
    let (tx, rx) = mpsc::channel();

    let handle = spawn_publisher(&names, (0..5).collect(), tx);
    for expected in 0..4 {
        assert_eq!(rx.recv_timeout(RECV_TIMEOUT).unwrap(), (expected, Publish::Published));
    }

    // The fifth publish waits for a free slot.
    thread::sleep(SETTLE);
    assert!(rx.try_recv().is_err(), "publish on a full ring must block");
    assert_eq!(ring.len(), 4);

    assert_eq!(ring.consume(&cancel).unwrap(), Consume::Item(0));
    assert_eq!(rx.recv_timeout(RECV_TIMEOUT).unwrap(), (4, Publish::Published));
    handle.join().unwrap();

    for expected in 1..5 {
        assert_eq!(ring.consume(&cancel).unwrap(), Consume::Item(expected));
    }
    assert!(ring.is_empty());
}

#[test]
fn test_race_for_last_slot() {
    let names = names("race");
    let mut ring = RingBuffer::<u64>::create(&names, RingConfig::new(2, 3)).unwrap();
    let cancel = CancelToken::new();

    let first = Producer::<u64>::attach(&names).unwrap();
    assert_eq!(first.publish(&100, &cancel).unwrap(), Publish::Published);

    let (tx, rx) = mpsc::channel();
    let a = spawn_publisher(&names, vec![1], tx.clone());
    let b = spawn_publisher(&names, vec![2], tx);

    let (winner, outcome) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(outcome, Publish::Published);
    thread::sleep(SETTLE);
    assert!(rx.try_recv().is_err(), "only one producer fits in the last slot");

    assert_eq!(ring.consume(&cancel).unwrap(), Consume::Item(100));
    let (loser, outcome) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(outcome, Publish::Published);
    assert_ne!(winner, loser);

    assert_eq!(ring.consume(&cancel).unwrap(), Consume::Item(winner));
    assert_eq!(ring.consume(&cancel).unwrap(), Consume::Item(loser));
    a.join().unwrap();
    b.join().unwrap();
}

#[test]
fn test_shutdown_wakes_blocked_producers() {
    let names = names("wake");
    let mut ring = RingBuffer::<u64>::create(&names, RingConfig::new(1, 3)).unwrap();
    let cancel = CancelToken::new();

    let first = Producer::<u64>::attach(&names).unwrap();
    assert_eq!(first.publish(&7, &cancel).unwrap(), Publish::Published);

    let (tx, rx) = mpsc::channel();
    let handles: Vec<_> = (0..2)
        .map(|i| spawn_publisher(&names, vec![10 + i], tx.clone()))
        .collect();
    let third = {
        let tx = tx.clone();
        thread::spawn(move || {
            // Reuses the producer registered on the main thread.
            let outcome = first.publish(&12, &CancelToken::new()).unwrap();
            tx.send((12, outcome)).unwrap();
        })
    };
    drop(tx);

    thread::sleep(SETTLE);
    assert!(rx.try_recv().is_err(), "all three producers must be blocked");
    assert_eq!(ring.phase(), ShutdownPhase::Running);

    ring.request_shutdown().unwrap();
    for _ in 0..3 {
        let (_, outcome) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
        assert_eq!(outcome, Publish::Stop);
    }
    for handle in handles {
        handle.join().unwrap();
    }
    third.join().unwrap();

    // Nothing was written after the flag.
    assert_eq!(ring.metrics().published, 1);
    assert_eq!(ring.consume(&cancel).unwrap(), Consume::Item(7));
    assert!(ring.try_consume().unwrap().is_none());
}

#[test]
fn test_every_publishing_thread_is_counted_for_shutdown() {
    let names = names("perthread");
    let ring = RingBuffer::<u64>::create(&names, RingConfig::new(1, 2)).unwrap();

    let first = Producer::<u64>::attach(&names).unwrap();
    assert_eq!(first.publish(&1, &CancelToken::new()).unwrap(), Publish::Published);

    let (tx, rx) = mpsc::channel();
    let moved = {
        let tx = tx.clone();
        thread::spawn(move || {
            let outcome = first.publish(&2, &CancelToken::new()).unwrap();
            tx.send((2, outcome)).unwrap();
        })
    };
    let second = spawn_publisher(&names, vec![3], tx);

    thread::sleep(SETTLE);
    assert!(rx.try_recv().is_err(), "both threads must be blocked");
    assert_eq!(ring.attached(), 2);

    // A third blocked thread would need its own registration, which the
    // burst accounts for; here the limit refuses it.
    assert!(matches!(
        Producer::<u64>::attach(&names),
        Err(RingError::TooManyProducers { max: 2 })
    ));

    ring.request_shutdown().unwrap();
    for _ in 0..2 {
        let (_, outcome) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
        assert_eq!(outcome, Publish::Stop);
    }
    moved.join().unwrap();
    second.join().unwrap();
    assert_eq!(ring.metrics().published, 1);
}

#[test]
fn test_consume_blocks_until_publish() {
    let names = names("empty");
    let mut ring = RingBuffer::<u64>::create(&names, RingConfig::new(4, 1)).unwrap();
    let producer = Producer::<u64>::attach(&names).unwrap();
    let (tx, rx) = mpsc::channel();

    let consumer = thread::spawn(move || {
        let outcome = ring.consume(&CancelToken::new()).unwrap();
        tx.send(outcome).unwrap();
        ring
    });

    thread::sleep(SETTLE);
    assert!(rx.try_recv().is_err(), "consume on an empty ring must block");

    producer.publish(&99, &CancelToken::new()).unwrap();
    assert_eq!(rx.recv_timeout(RECV_TIMEOUT).unwrap(), Consume::Item(99));

    let mut ring = consumer.join().unwrap();
    assert!(ring.is_empty());
    assert!(ring.try_consume().unwrap().is_none());
}

#[test]
fn test_fifo_multi_producer() {
    const N_PRODUCERS: u64 = 4;
    const ITEMS_PER_PRODUCER: u64 = 500;

    let names = names("fifo");
    let mut ring = RingBuffer::<u64>::create(&names, RingConfig::new(8, 4)).unwrap();
    let cancel = CancelToken::new();

    let handles: Vec<_> = (0..N_PRODUCERS)
        .map(|id| {
            let names = names.clone();
            thread::spawn(move || {
                let producer = Producer::<u64>::attach(&names).unwrap();
                let cancel = CancelToken::new();
                for seq in 0..ITEMS_PER_PRODUCER {
                    let outcome = producer.publish(&((id << 32) | seq), &cancel).unwrap();
                    assert_eq!(outcome, Publish::Published);
                }
            })
        })
        .collect();

    let mut next_seq = vec![0u64; N_PRODUCERS as usize];
    for _ in 0..N_PRODUCERS * ITEMS_PER_PRODUCER {
        let value = ring.consume(&cancel).unwrap().into_item().unwrap();
        let (id, seq) = ((value >> 32) as usize, value & 0xffff_ffff);
        assert_eq!(
            seq, next_seq[id],
            "FIFO violation for producer {}: expected {}, got {}",
            id, next_seq[id], seq
        );
        next_seq[id] += 1;
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(next_seq.iter().all(|&n| n == ITEMS_PER_PRODUCER));
    let metrics = ring.metrics();
    assert_eq!(metrics.published, N_PRODUCERS * ITEMS_PER_PRODUCER);
    assert_eq!(metrics.consumed, metrics.published);
    assert_eq!(ring.slot_counts().unwrap().free, 8);
}

#[test]
fn test_candidate_payload() {
    let names = names("candidate");
    let mut ring = RingBuffer::<Candidate>::create(&names, RingConfig::new(2, 1)).unwrap();
    let producer = Producer::<Candidate>::attach(&names).unwrap();
    let cancel = CancelToken::new();

    let candidate = Candidate::from_edges(&[Edge::new(0, 1), Edge::new(3, 2)]).unwrap();
    producer.publish(&candidate, &cancel).unwrap();
    producer.publish(&Candidate::new(), &cancel).unwrap();

    let received = ring.consume(&cancel).unwrap().into_item().unwrap();
    assert_eq!(received, candidate);
    assert_eq!(received.to_string(), "0-1 3-2");
    assert!(ring.consume(&cancel).unwrap().into_item().unwrap().is_empty());
}

#[test]
fn test_request_shutdown_is_idempotent() {
    let names = names("idem");
    let ring = RingBuffer::<u64>::create(&names, RingConfig::new(4, 3)).unwrap();

    ring.request_shutdown().unwrap();
    ring.request_shutdown().unwrap();
    assert!(ring.is_shutdown());

    let counts = ring.slot_counts().unwrap();
    assert_eq!(counts.free, 4 + 3, "the wake-up burst is posted once");
    assert_eq!(counts.used, 0);
}

#[test]
fn test_publish_after_shutdown_stops() {
    let names = names("late");
    let mut ring = RingBuffer::<u64>::create(&names, RingConfig::new(4, 1)).unwrap();
    let producer = Producer::<u64>::attach(&names).unwrap();
    let cancel = CancelToken::new();

    ring.request_shutdown().unwrap();
    assert!(producer.is_shutdown());
    assert_eq!(producer.publish(&1, &cancel).unwrap(), Publish::Stop);
    assert_eq!(ring.metrics().published, 0);
    assert!(ring.try_consume().unwrap().is_none());
}

#[test]
fn test_cancelled_publish_keeps_capacity() {
    let names = names("cancel");
    let ring = RingBuffer::<u64>::create(&names, RingConfig::new(2, 1)).unwrap();
    let producer = Producer::<u64>::attach(&names).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();

    assert_eq!(producer.publish(&1, &cancel).unwrap(), Publish::Stop);
    assert_eq!(ring.slot_counts().unwrap().free, 2);
}

#[test]
fn test_consume_timeout_on_empty_ring() {
    let names = names("timeout");
    let mut ring = RingBuffer::<u64>::create(&names, RingConfig::new(2, 1)).unwrap();
    let outcome = ring
        .consume_timeout(Duration::from_millis(20), &CancelToken::new())
        .unwrap();
    assert_eq!(outcome, Consume::TimedOut);
}

#[test]
fn test_too_many_producers() {
    let names = names("limit");
    let ring = RingBuffer::<u64>::create(&names, RingConfig::new(2, 2)).unwrap();

    let a = Producer::<u64>::attach(&names).unwrap();
    let _b = Producer::<u64>::attach(&names).unwrap();
    assert_eq!(ring.attached(), 2);

    match Producer::<u64>::attach(&names) {
        Err(RingError::TooManyProducers { max }) => assert_eq!(max, 2),
        other => panic!("expected TooManyProducers, got {:?}", other.map(|_| ())),
    }

    drop(a);
    assert_eq!(ring.attached(), 1);
    assert!(Producer::<u64>::attach(&names).is_ok());
}

#[test]
fn test_create_twice_fails() {
    let names = names("twice");
    let _ring = RingBuffer::<u64>::create(&names, RingConfig::new(2, 1)).unwrap();
    let err = RingBuffer::<u64>::create(&names, RingConfig::new(2, 1))
        .err()
        .unwrap();
    assert!(err.is_stale_resource(), "unexpected error: {err}");
}

#[test]
fn test_attach_without_supervisor() {
    let names = names("missing");
    let err = Producer::<u64>::attach(&names).err().unwrap();
    assert!(err.is_not_found(), "unexpected error: {err}");
}

#[test]
fn test_attach_with_other_payload_type() {
    let names = names("layout");
    let _ring = RingBuffer::<u64>::create(&names, RingConfig::new(2, 1)).unwrap();
    let err = Producer::<Candidate>::attach(&names).err().unwrap();
    assert!(matches!(err, RingError::Layout { .. }), "unexpected error: {err}");
}

#[test]
fn test_invalid_config_rejected() {
    let names = names("config");
    for config in [RingConfig::new(0, 1), RingConfig::new(1, 0)] {
        let err = RingBuffer::<u64>::create(&names, config).err().unwrap();
        assert!(matches!(err, RingError::InvalidConfig(_)));
    }
    // Nothing was left behind.
    assert!(RingBuffer::<u64>::create(&names, RingConfig::new(1, 1)).is_ok());
}

#[test]
fn test_drain_waits_for_producers() {
    let names = names("drain");
    let ring = RingBuffer::<u64>::create(&names, RingConfig::new(1, 2)).unwrap();
    let (tx, rx) = mpsc::channel();

    // The second publish blocks on the full ring until the burst.
    let handle = spawn_publisher(&names, vec![1, 2], tx);
    assert_eq!(rx.recv_timeout(RECV_TIMEOUT).unwrap(), (1, Publish::Published));
    thread::sleep(SETTLE);
    assert!(rx.try_recv().is_err());

    let report = ring.drain(Duration::from_secs(5)).unwrap();
    assert_eq!(rx.recv_timeout(RECV_TIMEOUT).unwrap(), (2, Publish::Stop));
    handle.join().unwrap();

    assert!(report.detached);
    assert_eq!(report.still_attached, 0);
    assert_eq!(report.phase, ShutdownPhase::Drained);
    assert_eq!(report.metrics.published, 1);
    assert_eq!(report.metrics.consumed, 0);
    assert!(Producer::<u64>::attach(&names).err().unwrap().is_not_found());
}

#[test]
fn test_drain_times_out_on_stuck_producer() {
    let names = names("stuck");
    let ring = RingBuffer::<u64>::create(&names, RingConfig::new(1, 2)).unwrap();
    let producer = Producer::<u64>::attach(&names).unwrap();

    let report = ring.drain(Duration::from_millis(50)).unwrap();
    assert!(!report.detached);
    assert_eq!(report.still_attached, 1);

    // The producer keeps its mapping and sees the flag.
    assert!(producer.is_shutdown());
    assert_eq!(producer.publish(&1, &CancelToken::new()).unwrap(), Publish::Stop);
}
