//! Supervisor: owns the shared ring, reports the best candidate, shuts down
//! the generators.
//!
//! Run with: `cargo run -p solver --bin supervisor -- [-n LIMIT] [-w DELAY]`

use anyhow::{Context, Result};
use shmring::{
    install_signal_handlers, remove_stale_resources, CancelToken, Candidate, ResourceNames,
    RingBuffer,
};
use solver::args::{SupervisorArgs, SUPERVISOR_USAGE};
use solver::supervisor::{self, SupervisorOptions};
use std::io;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

/// How long generators get to detach after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Granularity of the `-w` delay, so a signal ends it promptly.
const DELAY_TICK: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    solver::init_tracing();

    let args = match SupervisorArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) if err.is_help() => {
            println!("{SUPERVISOR_USAGE}");
            return Ok(());
        }
        Err(err) => {
            eprintln!("{SUPERVISOR_USAGE}");
            return Err(err.into());
        }
    };

    let cancel = install_signal_handlers().context("failed to install signal handlers")?;
    let names = ResourceNames::from_prefix(&args.prefix)?;

    if args.cleanup {
        let removed = remove_stale_resources(&names)?;
        info!(removed, "cleanup finished");
    }

    let mut ring = RingBuffer::<Candidate>::create(&names, args.config)
        .with_context(|| format!("failed to create the ring `{}`", args.prefix))?;
    info!(
        problem = %args.problem,
        prefix = %args.prefix,
        capacity = ring.capacity(),
        max_producers = ring.max_producers(),
        "supervisor ready"
    );

    if !args.delay.is_zero() {
        info!(seconds = args.delay.as_secs(), "waiting before reading candidates");
        sleep_unless_cancelled(args.delay, &cancel);
    }

    let options = SupervisorOptions {
        limit: args.limit,
        ..SupervisorOptions::default()
    };
    let report = supervisor::run(
        &mut ring,
        args.problem,
        &options,
        &cancel,
        &mut io::stdout().lock(),
    )?;

    let drain = ring.drain(DRAIN_TIMEOUT)?;
    info!(
        outcome = ?report.outcome,
        received = report.received,
        published = drain.metrics.published,
        unread = drain.metrics.unread(),
        generators_left = drain.still_attached,
        "supervisor exiting"
    );
    Ok(())
}

fn sleep_unless_cancelled(delay: Duration, cancel: &CancelToken) {
    let deadline = Instant::now() + delay;
    while !cancel.is_cancelled() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        thread::sleep(remaining.min(DELAY_TICK));
    }
}
