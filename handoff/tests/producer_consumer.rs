//! Cross-thread integration tests for the blocking queue.
//!
//! These tests exercise the handoff path end to end: producers and
//! consumers on separate threads, blocking on a full or empty queue and
//! being released by the opposite side.
//!
//! # Running with tracing
//!
//! To see full debug output, run with the tracing feature and no capture:
//! ```bash
//! RUST_LOG=handoff=trace cargo test --features tracing -- --nocapture
//! ```

use std::sync::{Arc, Once};
use std::thread;
use std::time::{Duration, Instant};

use handoff::{BlockingQueue, Full, ShutdownSignal};

static INIT_TRACING: Once = Once::new();

/// Initialize tracing for tests (only once).
fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        handoff::init_tracing();
    });
}

#[test]
fn fifo_order_across_threads() {
    init_test_tracing();

    let queue = Arc::new(BlockingQueue::<u32, 4>::new());
    let shutdown = ShutdownSignal::new();

    let producer = thread::spawn({
        let queue = Arc::clone(&queue);
        let shutdown = shutdown.clone();
        move || {
            for i in 0..500 {
                queue.push(i, &shutdown, None).expect("push cancelled");
            }
        }
    });

    for i in 0..500 {
        assert_eq!(queue.pop(&shutdown, None), Ok(i));
    }

    producer.join().unwrap();
    assert!(queue.is_empty());
}

#[test]
fn capacity_accepted_without_blocking() {
    init_test_tracing();

    let queue = BlockingQueue::<u32, 3>::new();
    let shutdown = ShutdownSignal::new();

    // From empty, exactly N blocking pushes complete with no consumer.
    let start = Instant::now();
    for i in 0..3 {
        queue.push(i, &shutdown, None).expect("push blocked unexpectedly");
    }
    assert!(start.elapsed() < Duration::from_millis(250));
    assert_eq!(queue.try_push(3), Err(Full));
}

#[test]
fn blocked_push_released_by_pop() {
    init_test_tracing();

    let queue = Arc::new(BlockingQueue::<u32, 2>::new());
    let shutdown = ShutdownSignal::new();

    queue.try_push(1).unwrap();
    queue.try_push(2).unwrap();
    assert!(queue.is_full());

    let popper = thread::spawn({
        let queue = Arc::clone(&queue);
        let shutdown = shutdown.clone();
        move || {
            thread::sleep(Duration::from_millis(100));
            queue.pop(&shutdown, None).expect("pop cancelled")
        }
    });

    // The third push has to wait for the popper to free a slot.
    let start = Instant::now();
    queue.push(3, &shutdown, None).expect("push cancelled");
    assert!(start.elapsed() >= Duration::from_millis(50));

    assert_eq!(popper.join().unwrap(), 1);
    assert_eq!(queue.pop(&shutdown, None), Ok(2));
    assert_eq!(queue.pop(&shutdown, None), Ok(3));
}

#[test]
fn blocked_pop_released_by_push() {
    init_test_tracing();

    let queue = Arc::new(BlockingQueue::<u32, 2>::new());
    let shutdown = ShutdownSignal::new();

    let pusher = thread::spawn({
        let queue = Arc::clone(&queue);
        let shutdown = shutdown.clone();
        move || {
            thread::sleep(Duration::from_millis(100));
            queue.push(77, &shutdown, None).expect("push cancelled");
        }
    });

    let start = Instant::now();
    assert_eq!(queue.pop(&shutdown, None), Ok(77));
    assert!(start.elapsed() >= Duration::from_millis(50));

    pusher.join().unwrap();
}

#[test]
fn mpmc_every_value_delivered_exactly_once() {
    init_test_tracing();

    const PRODUCERS: usize = 4;
    const CONSUMERS: usize = 4;
    const PER_PRODUCER: usize = 250;

    let queue = Arc::new(BlockingQueue::<u32, 8>::new());
    let shutdown = ShutdownSignal::new();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = Arc::clone(&queue);
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    let value = (p * PER_PRODUCER + i) as u32;
                    queue.push(value, &shutdown, None).expect("push cancelled");
                }
            })
        })
        .collect();

    // Consumers drain until shutdown releases them.
    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Ok(value) = queue.pop(&shutdown, None) {
                    seen.push(value);
                }
                seen
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    while !queue.is_empty() {
        thread::sleep(Duration::from_millis(1));
    }
    shutdown.raise();

    let mut all: Vec<u32> = consumers
        .into_iter()
        .flat_map(|consumer| consumer.join().unwrap())
        .collect();
    all.sort_unstable();

    let expected: Vec<u32> = (0..(PRODUCERS * PER_PRODUCER) as u32).collect();
    assert_eq!(all, expected);
}
