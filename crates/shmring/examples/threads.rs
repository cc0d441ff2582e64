use shmring::{CancelToken, Consume, Producer, Publish, ResourceNames, RingBuffer, SMALL_CONFIG};
use std::thread;
use std::time::{Duration, Instant};

fn main() -> Result<(), shmring::RingError> {
    println!("shmring Threads Example");
    println!("=======================\n");

    const N_PRODUCERS: u64 = 4;
    const ITEMS_PER_PRODUCER: u64 = 10_000;

    let names = ResourceNames::from_prefix(&format!("shmring_example_{}", std::process::id()))?;
    let mut ring = RingBuffer::<u64>::create(&names, SMALL_CONFIG)?;

    println!("Configuration:");
    println!("  Segment: {}", names.shm);
    println!("  Ring capacity: {} slots", ring.capacity());
    println!("  Max producers: {}", ring.max_producers());
    println!("  Producers: {}", N_PRODUCERS);
    println!("  Total items: {}\n", N_PRODUCERS * ITEMS_PER_PRODUCER);

    let start = Instant::now();

    // Threads stand in for generator processes; they attach by name.
    let handles: Vec<_> = (0..N_PRODUCERS)
        .map(|id| {
            let names = names.clone();
            thread::spawn(move || -> Result<u64, shmring::RingError> {
                let producer = Producer::<u64>::attach(&names)?;
                let cancel = CancelToken::new();
                let mut sent = 0;
                for i in 0..ITEMS_PER_PRODUCER {
                    if producer.publish(&(id * ITEMS_PER_PRODUCER + i), &cancel)? == Publish::Stop {
                        break;
                    }
                    sent += 1;
                }
                Ok(sent)
            })
        })
        .collect();

    let cancel = CancelToken::new();
    let mut sum = 0u64;
    for _ in 0..N_PRODUCERS * ITEMS_PER_PRODUCER {
        if let Consume::Item(value) = ring.consume(&cancel)? {
            sum += value;
        }
    }

    for handle in handles {
        if let Ok(sent) = handle.join() {
            println!("  producer sent {} items", sent?);
        }
    }

    let elapsed = start.elapsed();
    let total = N_PRODUCERS * ITEMS_PER_PRODUCER;
    println!("\nResults:");
    println!("  Checksum: {}", sum);
    println!("  Expected: {}", total * (total - 1) / 2);
    println!("  Duration: {:?}", elapsed);
    println!(
        "  Throughput: {:.2} K items/sec",
        total as f64 / elapsed.as_secs_f64() / 1_000.0
    );

    let report = ring.drain(Duration::from_secs(1))?;
    println!("  Drained: {} (published {})", report.detached, report.metrics.published);
    Ok(())
}
