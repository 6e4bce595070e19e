//! Garage Controller - Main Entry Point
//!
//! Runs the controller on a host with a simulated range sensor whose
//! target alternates between a parked car and an open door.

use anyhow::Context;
use controller::{init_logging, DeviceContext, MockSensor, RuntimeConfig};
use option_store::OptionId;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Echo width of a closed door with a car below (about 2m)
const ECHO_CLOSED_US: u32 = 12_000;
/// Echo width of a raised door panel (about 50cm)
const ECHO_OPEN_US: u32 = 2_900;
/// Readings between simulated door movements
const READINGS_PER_MOVE: u32 = 6;

fn unix_seconds() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_file = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("garage.toml"));
    let config = RuntimeConfig::load(Some(&config_file)).context("loading runtime config")?;
    init_logging(&config.log_level).context("installing tracing subscriber")?;

    info!("=== Garage Controller v{} ===", env!("CARGO_PKG_VERSION"));

    let mut ctx = DeviceContext::open(&config).context("opening device context")?;
    let sensor = MockSensor::new(ctx.sampler().clone(), ECHO_CLOSED_US);
    let echo = sensor.echo_control();
    let (handle, task) = ctx
        .start_scheduler(sensor, config.scheduler_config())
        .context("starting trigger scheduler")?;

    let read_interval = ctx.options().int(OptionId::ReadInterval).unwrap_or(1).max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs(u64::from(read_interval)));
    let mut readings = 0u32;
    info!("Reading distance every {}s, Ctrl-C to stop", read_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(record) = ctx.record_reading(unix_seconds()) {
                    info!("Logged {:?}", record);
                }
                readings += 1;
                if readings % READINGS_PER_MOVE == 0 {
                    let width = match echo.load(Ordering::Relaxed) {
                        ECHO_CLOSED_US => ECHO_OPEN_US,
                        _ => ECHO_CLOSED_US,
                    };
                    echo.store(width, Ordering::Relaxed);
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Signal handler failed: {}", e);
                }
                break;
            }
        }
    }

    handle.stop();
    let scheduler = task.await.context("joining trigger scheduler")?;
    info!("Scheduler issued {} pulses", scheduler.fired());

    for record in ctx.log().chronological().context("reading event log")? {
        info!(
            "t={} door={} distance={}cm vehicle={}",
            record.timestamp, record.status, record.distance, record.secondary
        );
    }

    Ok(())
}
