use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use hive::bag::{BagReader, HandlerError};
use hive::msg::{ViveLight, TOPIC_LIGHT};
use hive::solver::Solver;

#[derive(Parser, Debug)]
#[command(name = "hive-solve", version, about = "Feed recorded light sweeps to the solver")]
struct Args {
    /// Bag directory to read
    bag: PathBuf,

    /// Topic carrying the light sweeps
    #[arg(long, default_value = TOPIC_LIGHT)]
    topic: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let reader = BagReader::open(&args.bag)?;
    info!("Bag: {}", args.bag.display());
    info!("Topic: {} ({} records)", args.topic, reader.message_count(&args.topic)?);

    let mut solver = Solver::new();
    let mut dispatched = 0u64;
    reader
        .read(
            &args.topic,
            &mut |light: ViveLight, ctx: &mut ()| -> std::result::Result<(), HandlerError> {
                solver.update(&light, ctx)?;
                dispatched += 1;
                Ok(())
            },
            &mut (),
        )
        .with_context(|| format!("failed to read {}", args.topic))?;

    info!("Dispatched {dispatched} records to the solver");
    Ok(())
}
