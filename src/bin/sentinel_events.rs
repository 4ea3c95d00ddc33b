//! sentinel_events - query the detection event log.

use anyhow::Result;
use chrono::{Duration, Local};
use clap::Parser;

use sentinel_cam::{EventLogStore, JsonFileEventLog, PersonType};

#[derive(Parser, Debug)]
#[command(name = "sentinel_events", about = "Query the sentinel detection log")]
struct Args {
    /// Path to the JSON event log
    #[arg(long, default_value = "security_log.json", env = "SENTINEL_LOG_PATH")]
    log_path: String,

    /// Print at most this many events, most recent first
    #[arg(long, default_value_t = 100)]
    limit: usize,

    /// Filter by verdict ("known" or "unknown")
    #[arg(long = "type", value_name = "TYPE")]
    type_filter: Option<PersonType>,

    /// Look up one event by id
    #[arg(long)]
    id: Option<u64>,

    /// Print 24-hour known/unknown counts instead of events
    #[arg(long)]
    last_24h: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log = JsonFileEventLog::open(&args.log_path)?;

    if let Some(id) = args.id {
        match log.by_id(id) {
            Some(event) => println!("{}", serde_json::to_string_pretty(&event)?),
            None => anyhow::bail!("no event with id {}", id),
        }
        return Ok(());
    }

    if args.last_24h {
        let counts = log.counts_since(Local::now() - Duration::hours(24));
        println!("{}", serde_json::to_string_pretty(&counts)?);
        return Ok(());
    }

    let events = log.recent(args.limit, args.type_filter);
    println!("{}", serde_json::to_string_pretty(&events)?);
    Ok(())
}
