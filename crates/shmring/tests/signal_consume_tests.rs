//! SIGTERM interrupting a blocked `consume`.
//!
//! The signal token is process-wide and never reset, so each signal test
//! runs in its own binary.

mod common;

use common::{interrupt_until_done, names, SETTLE};
use shmring::{install_signal_handlers, Consume, RingBuffer, RingConfig};
use std::thread;

#[test]
fn test_signal_terminates_blocked_consume() {
    let cancel = install_signal_handlers().unwrap();
    assert!(!cancel.is_cancelled());
    let names = names("consume");
    let mut ring = RingBuffer::<u64>::create(&names, RingConfig::new(2, 1)).unwrap();

    let consumer = thread::spawn(move || {
        let outcome = ring.consume(&cancel).unwrap();
        (outcome, ring)
    });
    thread::sleep(SETTLE);
    assert!(!consumer.is_finished(), "consume on an empty ring must block");

    let (outcome, ring) = interrupt_until_done(consumer, libc::SIGTERM);
    assert_eq!(outcome, Consume::Terminated);
    assert!(ring.is_empty());
}
