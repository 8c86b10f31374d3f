// src/main.rs
//
// Replays recorded detection logs through the occupancy engine.
//
//   zone-occupancy [config.yaml]
//
// The config path may also come from ZONE_OCCUPANCY_CONFIG. A missing
// config file means defaults.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use zone_occupancy::replay::ReplayProcessor;
use zone_occupancy::{load_zones, Config};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ZONE_OCCUPANCY_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let (config, config_found) = if Path::new(&config_path).exists() {
        let config = Config::load(&config_path)
            .with_context(|| format!("loading config {}", config_path))?;
        (config, true)
    } else {
        (Config::default(), false)
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Zone occupancy replay starting");
    if config_found {
        info!("✓ Configuration loaded from {}", config_path);
    } else {
        warn!("{} not found, using defaults", config_path);
    }

    let zones = load_zones(&config.replay.zones_path)
        .with_context(|| format!("loading zones {}", config.replay.zones_path))?;
    info!(
        "Seating: v_thr={:.0}px/s, sit={:.1}s, stability={:.1}s, ttl_lost={:.0}s, hist={}",
        config.engine.seating.v_thr_px_s,
        config.engine.seating.sit_seconds,
        config.engine.seating.min_stability_time,
        config.engine.seating.ttl_lost,
        config.engine.seating.hist_frames
    );

    let processor = ReplayProcessor::new(&config, zones);
    let logs = processor.find_detection_logs()?;
    if logs.is_empty() {
        error!("No detection logs found in {}", config.replay.input_dir);
        return Ok(());
    }

    for (idx, path) in logs.iter().enumerate() {
        info!("========================================");
        info!("Replay {}/{}: {}", idx + 1, logs.len(), path.display());

        match processor.replay_file(path) {
            Ok(summary) => {
                let m = &summary.metrics;
                info!("✓ Replay finished");
                info!("  Frames: {}", summary.frames);
                info!(
                    "  Detections: {} in, {} rejected",
                    m.detections_in, m.detections_rejected
                );
                info!(
                    "  Fusion: {} refined, {} discovered",
                    m.fusion_refined, m.fusion_discovered
                );
                info!("  Tracks created: {}", m.tracks_created);
                info!("  Partial bodies dropped: {}", m.partial_bodies_dropped);
                info!("  Seats confirmed: {}", m.seats_confirmed);
                info!("  Occupancy changes: {}", m.occupancy_changes);
                info!("  Max people seated: {}", summary.max_people_seated);
                info!("  Events written: {}", summary.events);
                info!("  Zone rows: {}", summary.rows_path.display());
                info!("  Processing speed: {:.1} FPS", m.fps);
                match serde_json::to_string(m) {
                    Ok(json) => info!("  Metrics: {}", json),
                    Err(e) => warn!("  Could not serialize metrics: {}", e),
                }
            }
            Err(e) => {
                error!("Failed to replay {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(())
}
