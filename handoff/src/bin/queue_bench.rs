//! Blocking queue throughput and round-trip benchmark.
//!
//! Usage:
//!     cargo run --release --bin queue_bench
//!
//! Environment variables:
//!     PRODUCER_CPU=0  Pin producer to CPU 0 (default: 0)
//!     CONSUMER_CPU=2  Pin consumer to CPU 2 (default: 2)

use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use minstant::Instant;

use handoff::{BlockingQueue, ShutdownSignal};

const QUEUE_SIZE: usize = 1 << 12;
const ITERATIONS: usize = 1 << 20;
const RTT_QUEUE_SIZE: usize = 8;
const RTT_ITERATIONS: usize = 1 << 16;

type Payload = i32;

fn get_cpu_affinity() -> (Option<usize>, Option<usize>) {
    let producer_cpu = env::var("PRODUCER_CPU")
        .ok()
        .and_then(|s| s.parse().ok())
        .or(Some(0));
    let consumer_cpu = env::var("CONSUMER_CPU")
        .ok()
        .and_then(|s| s.parse().ok())
        .or(Some(2));
    (producer_cpu, consumer_cpu)
}

fn pin_to_cpu(cpu: Option<usize>) {
    if let Some(id) = cpu {
        core_affinity::set_for_current(core_affinity::CoreId { id });
    }
}

fn bench_throughput(producer_cpu: Option<usize>, consumer_cpu: Option<usize>) {
    let queue = Arc::new(BlockingQueue::<Payload, QUEUE_SIZE>::new());
    let shutdown = ShutdownSignal::new();

    let ready = Arc::new(AtomicBool::new(false));
    let ready_clone = ready.clone();

    // Consumer thread
    let consumer_thread = std::thread::spawn({
        let queue = Arc::clone(&queue);
        let shutdown = shutdown.clone();
        move || {
            pin_to_cpu(consumer_cpu);

            // Signal ready
            ready_clone.store(true, Ordering::Release);

            for expected in 0..ITERATIONS as Payload {
                let value = queue.pop(&shutdown, None).expect("pop cancelled");
                if value != expected {
                    panic!("Data corruption: expected {expected}, got {value}");
                }
            }
        }
    });

    // Wait for consumer to be ready
    while !ready.load(Ordering::Acquire) {
        std::hint::spin_loop();
    }

    pin_to_cpu(producer_cpu);

    let start = Instant::now();

    for i in 0..ITERATIONS as Payload {
        queue.push(i, &shutdown, None).expect("push cancelled");
    }

    consumer_thread.join().unwrap();
    let elapsed = start.elapsed();

    let ops_per_ms = ITERATIONS as u128 * 1_000_000 / elapsed.as_nanos();
    println!("throughput: {ops_per_ms} ops/ms");
}

fn bench_rtt(producer_cpu: Option<usize>, consumer_cpu: Option<usize>) {
    let ping = Arc::new(BlockingQueue::<Payload, RTT_QUEUE_SIZE>::new());
    let pong = Arc::new(BlockingQueue::<Payload, RTT_QUEUE_SIZE>::new());
    let shutdown = ShutdownSignal::new();

    let ready = Arc::new(AtomicBool::new(false));
    let ready_clone = ready.clone();

    // Responder thread
    let responder = std::thread::spawn({
        let ping = Arc::clone(&ping);
        let pong = Arc::clone(&pong);
        let shutdown = shutdown.clone();
        move || {
            pin_to_cpu(consumer_cpu);

            // Signal ready
            ready_clone.store(true, Ordering::Release);

            for _ in 0..RTT_ITERATIONS {
                let value = ping.pop(&shutdown, None).expect("ping cancelled");
                pong.push(value, &shutdown, None).expect("pong cancelled");
            }
        }
    });

    // Wait for responder to be ready
    while !ready.load(Ordering::Acquire) {
        std::hint::spin_loop();
    }

    pin_to_cpu(producer_cpu);

    let start = Instant::now();

    for i in 0..RTT_ITERATIONS as Payload {
        ping.push(i, &shutdown, None).expect("push cancelled");
        let echoed = pong.pop(&shutdown, None).expect("pop cancelled");
        assert_eq!(echoed, i);
    }

    responder.join().unwrap();
    let elapsed = start.elapsed();

    let ns_per_rtt = elapsed.as_nanos() / RTT_ITERATIONS as u128;
    println!("round-trip: {ns_per_rtt} ns avg");
}

fn main() {
    handoff::init_tracing();

    let (producer_cpu, consumer_cpu) = get_cpu_affinity();
    println!("producer cpu: {producer_cpu:?}, consumer cpu: {consumer_cpu:?}");

    bench_throughput(producer_cpu, consumer_cpu);
    bench_rtt(producer_cpu, consumer_cpu);
}
