// Synthetic host for the driftmap engine: fabricates a fleet of
// tracker devices, plays the full event lifecycle against a
// tracing-backed surface, and logs everything the engine pushes back.

mod surface;

use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

use driftmap_core::{
    DeviceId, DeviceMetrics, DevicePayload, InboundEvent, LngLat, MapSession, SessionConfig,
};

use crate::surface::TracingSurface;

// San Francisco bay.
const CENTER: LngLat = LngLat {
    lon: -122.41919,
    lat: 37.77115,
};

#[derive(Debug, Parser)]
#[command(name = "driftmap-sim", about, version)]
struct Cli {
    /// Number of synthetic devices.
    #[arg(short = 'n', long, default_value_t = 5)]
    devices: usize,

    /// Incremental update rounds to play after the initial batch.
    #[arg(short, long, default_value_t = 5)]
    rounds: u32,

    /// Seconds between update rounds.
    #[arg(long, default_value_t = 2)]
    round_secs: u64,

    /// RNG seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,

    /// Increase log verbosity (-v, -vv, ...).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(cli).await
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut rng = match cli.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };

    let (session, mut outbound) = MapSession::new(SessionConfig::default(), TracingSurface::new());

    // Log everything the engine pushes toward its host.
    let echo = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            info!(?event, "outbound");
        }
    });

    session.surface_ready().await;

    // Initial batch: the full fleet.
    let fleet: Vec<DevicePayload> = (0..cli.devices)
        .map(|i| synthetic_device(i, &mut rng))
        .collect();
    session
        .handle(InboundEvent::InitialBatch { devices: fleet })
        .await;
    info!(devices = session.device_count().await, "fleet initialized");

    // Incremental rounds: one random device drifts per round.
    for round in 0..cli.rounds {
        tokio::time::sleep(Duration::from_secs(cli.round_secs)).await;
        let index = rng.gen_range(0..cli.devices.max(1));
        let moved = synthetic_device(index, &mut rng);
        session
            .handle(InboundEvent::IncrementalUpdate {
                devices: vec![moved],
            })
            .await;
        info!(round, index, "incremental update applied");
    }

    // Detail flow on device 0: highlight, trail, teardown.
    let focus = DeviceId::new(device_name(0));
    session
        .handle(InboundEvent::Highlight {
            device_id: Some(focus.clone()),
        })
        .await;
    session
        .handle(InboundEvent::TrailUpdate {
            device_id: focus.clone(),
            trail: synthetic_trail(&session.marker(&focus).await, &mut rng),
        })
        .await;
    tokio::time::sleep(Duration::from_secs(cli.round_secs)).await;
    session.handle(InboundEvent::ClearTrail).await;
    session
        .handle(InboundEvent::Highlight { device_id: None })
        .await;

    session.shutdown().await;
    drop(session);
    echo.await?;
    info!("simulation complete");
    Ok(())
}

fn device_name(index: usize) -> String {
    format!("buoy-{index:03}")
}

fn synthetic_device(index: usize, rng: &mut SmallRng) -> DevicePayload {
    DevicePayload {
        device_id: DeviceId::new(device_name(index)),
        lon: Some(CENTER.lon + rng.gen_range(-0.2..0.2)),
        lat: Some(CENTER.lat + rng.gen_range(-0.2..0.2)),
        name: Some(format!("Buoy {index}")),
        hotspot: None,
        metrics: DeviceMetrics {
            avg_speed: Some(rng.gen_range(0.0..4.0)),
            elevation: Some(rng.gen_range(-1.0..3.0)),
            voltage: Some(rng.gen_range(3.2..4.2)),
            rssi: Some(rng.gen_range(-120.0..-60.0)),
            snr: Some(rng.gen_range(-10.0..10.0)),
        },
    }
}

/// Fabricate a most-recent-first position history ending at the
/// device's current position.
fn synthetic_trail(
    marker: &Option<driftmap_core::MarkerState>,
    rng: &mut SmallRng,
) -> Vec<LngLat> {
    let head = marker.as_ref().map_or(CENTER, |m| m.displayed);
    let mut trail = vec![head];
    let mut cursor = head;
    for _ in 0..10 {
        cursor = LngLat::new(
            cursor.lon + rng.gen_range(-0.01..0.01),
            cursor.lat + rng.gen_range(-0.01..0.01),
        );
        trail.push(cursor);
    }
    trail
}
