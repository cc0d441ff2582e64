//! Generator: attaches to the supervisor's ring and publishes random
//! candidates until the supervisor shuts down.
//!
//! Run with: `cargo run -p solver --bin generator -- 0-1 1-2 2-0`

use anyhow::{Context, Result};
use shmring::{install_signal_handlers, Candidate, Producer, ResourceNames};
use solver::args::{GeneratorArgs, GENERATOR_USAGE};
use solver::{generator, Graph};
use tracing::info;

fn main() -> Result<()> {
    solver::init_tracing();

    let args = match GeneratorArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) if err.is_help() => {
            println!("{GENERATOR_USAGE}");
            return Ok(());
        }
        Err(err) => {
            eprintln!("{GENERATOR_USAGE}");
            return Err(err.into());
        }
    };

    let graph = match Graph::parse(&args.edges) {
        Ok(graph) => graph,
        Err(err) => {
            eprintln!("{GENERATOR_USAGE}");
            return Err(err.into());
        }
    };

    let cancel = install_signal_handlers().context("failed to install signal handlers")?;
    let names = ResourceNames::from_prefix(&args.prefix)?;
    let producer = Producer::<Candidate>::attach(&names)
        .with_context(|| format!("failed to attach to the ring `{}`", args.prefix))?;
    info!(
        problem = %args.problem,
        vertices = graph.vertex_count(),
        edges = graph.edges().len(),
        "generator attached"
    );

    let mut problem = args.problem.solver(graph);
    let mut rng = rand::thread_rng();
    generator::run(&producer, problem.as_mut(), &mut rng, &cancel)?;
    Ok(())
}
