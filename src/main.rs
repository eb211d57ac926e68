use std::error::Error;
use std::time::Instant;
use clap::Parser;
use log::{error, info};
use ringbuffer::config::load_config;
use ringbuffer::pump::Pump;

/// Stream bytes from configured sources through a shared ring buffer.
#[derive(Debug, Parser)]
#[command(name = "ringpump", version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<String>,

    /// Override the buffer capacity in bytes
    #[arg(long)]
    capacity: Option<usize>,

    /// Override the number of bytes to consume
    #[arg(long)]
    bytes: Option<u64>,
}

fn get_config_path() -> String {
    if let Ok(home) = std::env::var("HOME") {
        format!("{}/.config/ringpump/config.toml", home)
    } else {
        "/etc/ringpump/config.toml".to_string()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(get_config_path);
    let mut cfg = load_config(&config_path).map_err(|e| {
        error!("Failed to load config: {}", e);
        e
    })?;
    if let Some(capacity) = args.capacity {
        if capacity == 0 {
            return Err("--capacity must be greater than zero".into());
        }
        cfg.capacity = capacity;
    }
    if let Some(bytes) = args.bytes {
        cfg.total_bytes = bytes;
    }

    let pump = Pump::from_config(cfg);
    let started = Instant::now();
    let stats = pump.run().await?;
    let elapsed = started.elapsed();

    for (id, produced) in &stats.per_source {
        info!("Source '{}' produced {} bytes", id, produced);
    }
    info!(
        "Consumed {} bytes in {:?} ({} full, {} empty events, {} bytes left buffered)",
        stats.consumed,
        elapsed,
        stats.full_events,
        stats.empty_events,
        pump.buffer().length()
    );

    Ok(())
}
