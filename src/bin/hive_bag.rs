use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use hive::bag::{BagReader, TopicFilter};
use hive::msg::{Imu, Message, ViveLight};

#[derive(Parser)]
#[command(name = "hive-bag", version, about = "Bag inspection tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print connections, message counts and the recorded time range
    Info { bag: PathBuf },
    /// Print the records of one topic
    Echo {
        bag: PathBuf,
        #[arg(long = "topic")]
        topic: String,
        #[arg(long = "limit")]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let mut out = io::BufWriter::new(io::stdout());
    match cli.command {
        Commands::Info { bag } => cmd_info(&bag, &mut out)?,
        Commands::Echo { bag, topic, limit } => cmd_echo(&bag, &topic, limit, &mut out)?,
    }
    out.flush()?;
    Ok(())
}

fn cmd_info(bag: &Path, out: &mut dyn Write) -> Result<()> {
    let reader = BagReader::open(bag)?;
    let index = reader.index()?;
    writeln!(out, "bag={}", bag.display())?;
    writeln!(
        out,
        "version={} chunks={} messages={}",
        index.version,
        reader.chunk_ids()?.len(),
        index.message_count()
    )?;
    match (index.time_range(), index.duration_ns()) {
        (Some((start, end)), Some(duration_ns)) => writeln!(
            out,
            "start_ns={start} end_ns={end} duration_s={:.3}",
            duration_ns as f64 / 1e9
        )?,
        _ => writeln!(out, "start_ns=- end_ns=-")?,
    }
    for conn in &index.connections {
        writeln!(
            out,
            "connection id={} topic={} type={} messages={}",
            conn.id, conn.topic, conn.msg_type, conn.message_count
        )?;
    }
    Ok(())
}

fn cmd_echo(bag: &Path, topic: &str, limit: Option<usize>, out: &mut dyn Write) -> Result<()> {
    let reader = BagReader::open(bag)?;
    let mut cursor = reader.cursor(TopicFilter::topic(topic))?;
    let mut printed = 0usize;
    while let Some(record) = cursor.next()? {
        if limit.is_some_and(|limit| printed >= limit) {
            break;
        }
        write!(out, "seq={} ts={} ", record.seq, record.timestamp_ns)?;
        let msg_type = record.msg_type();
        if msg_type == ViveLight::TYPE_NAME {
            let light: ViveLight = record.decode()?;
            writeln!(
                out,
                "tracker={} lighthouse={} axis={} samples={}",
                light.header.frame_id,
                light.lighthouse,
                light.axis,
                light.samples.len()
            )?;
            for sample in &light.samples {
                writeln!(
                    out,
                    "  sensor={} angle={:.6} length={:.3}",
                    sample.sensor, sample.angle, sample.length
                )?;
            }
        } else if msg_type == Imu::TYPE_NAME {
            let imu: Imu = record.decode()?;
            writeln!(
                out,
                "tracker={} acc={:?} gyr={:?}",
                imu.header.frame_id, imu.linear_acceleration, imu.angular_velocity
            )?;
        } else {
            writeln!(out, "type={msg_type} payload_bytes={}", record.payload.len())?;
        }
        printed += 1;
    }
    Ok(())
}
