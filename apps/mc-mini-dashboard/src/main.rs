mod board;
mod simulate;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mc_core::store::{MemoryRowStore, SqliteRowStore};
use mc_core::{load_config, write_schema_file, Config, RowStore};
use mc_events::{Bus, BusSource, NotificationSource};
use tracing::{info, warn};

use crate::board::{render, Board};
use crate::simulate::Simulator;

#[derive(Debug, Parser)]
#[command(
    name = "mc-mini-dashboard",
    version,
    about = "Terminal watcher for mission-control live collections"
)]
struct Args {
    /// TOML config with bus and per-collection overrides
    #[arg(long, env = "MC_CONFIG")]
    config: Option<String>,
    /// SQLite row store to seed from (in-memory and empty when omitted)
    #[arg(long, env = "MC_DB")]
    db: Option<PathBuf>,
    /// Print the summary as JSON on every update instead of a one-line summary
    #[arg(long, default_value_t = false)]
    json: bool,
    /// Emit only the initial summary and exit
    #[arg(long, default_value_t = false)]
    once: bool,
    /// Publish this many synthetic changes, then exit
    #[arg(long, default_value_t = 0)]
    simulate: u64,
    /// Delay between synthetic changes
    #[arg(long, default_value_t = 500)]
    interval_ms: u64,
    /// Write the config JSON schema to this path and exit
    #[arg(long)]
    print_schema: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    mc_otel::init();
    let args = Args::parse();

    if let Some(path) = args.print_schema.as_deref() {
        write_schema_file(path).with_context(|| format!("writing schema to {path}"))?;
        println!("wrote {path}");
        return Ok(());
    }

    let config = match args.config.as_deref() {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    let sqlite = match args.db.as_deref() {
        Some(path) => Some(
            SqliteRowStore::open(path)
                .with_context(|| format!("opening row store {}", path.display()))?,
        ),
        None => None,
    };
    let store: Arc<dyn RowStore> = match &sqlite {
        Some(store) => Arc::new(store.clone()),
        None => Arc::new(MemoryRowStore::new()),
    };

    let bus = Bus::new(config.bus_capacity());
    let source: Arc<dyn NotificationSource> = Arc::new(BusSource::new(bus.clone()));
    let mut board = Board::subscribe(&config, source);
    let skipped = board.seed(store.as_ref()).await?;
    if skipped > 0 {
        warn!(target: "mc.live", skipped, "some snapshot rows could not be decoded");
    }
    render(&board, args.json);
    if args.once {
        return Ok(());
    }

    let total = args.simulate;
    let interval = Duration::from_millis(args.interval_ms.max(1));
    let simulator = (total > 0).then(|| {
        let mut sim = Simulator::new(bus.clone(), sqlite.clone());
        tokio::spawn(async move {
            for _ in 0..total {
                sim.step().await?;
                tokio::time::sleep(interval).await;
            }
            anyhow::Ok(())
        })
    });
    let simulation = async move {
        match simulator {
            Some(handle) => handle.await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(simulation);

    loop {
        tokio::select! {
            report = board.next_change() => match report {
                Some(report) if report.changed() => render(&board, args.json),
                Some(_) => {}
                None => break,
            },
            done = &mut simulation => {
                done.context("simulator task")??;
                if board.pump().changed() {
                    render(&board, args.json);
                }
                info!(target: "mc.live", changes = total, "simulation finished");
                break;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
