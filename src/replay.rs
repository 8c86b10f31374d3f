// src/replay.rs
//
// Offline driver: replays recorded detection logs through a fresh engine
// per file and writes per-frame zone rows plus occupancy events.
//
// Input: one JSON object per line,
//   {"frame": 12, "time": 0.4, "global": [{"bbox": [x1,y1,x2,y2], "confidence": 0.8}], "zone": [...]}
// Every field is optional. Missing `time` falls back to frame / fps. Output
// rows and events carry the recorded `frame` when present, else the engine's
// 1-based frame counter.

use crate::config::ZoneFile;
use crate::detection::NoBodyAnalyzer;
use crate::pipeline::{EngineConfig, FrameInput, MetricsSummary, OccupancyEngine};
use crate::types::{Config, Detection};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub zones_path: String,
    pub frame_width: f32,
    pub frame_height: f32,
    /// Used to derive timestamps for frames recorded without one
    pub fps: f64,
    /// Log progress every N frames
    pub progress_interval: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            input_dir: "data/detections".to_string(),
            output_dir: "data/output".to_string(),
            zones_path: "data/rois.yaml".to_string(),
            frame_width: 1920.0,
            frame_height: 1080.0,
            fps: 30.0,
            progress_interval: 300,
        }
    }
}

/// One recorded frame of detections.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecordedFrame {
    pub frame: Option<u64>,
    pub time: Option<f64>,
    pub global: Vec<Detection>,
    pub zone: Vec<Detection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub input: PathBuf,
    pub rows_path: PathBuf,
    pub events_path: PathBuf,
    pub frames: u64,
    pub events: usize,
    pub max_people_seated: usize,
    pub metrics: MetricsSummary,
}

pub struct ReplayProcessor {
    config: ReplayConfig,
    engine_config: EngineConfig,
    zones: ZoneFile,
}

impl ReplayProcessor {
    pub fn new(config: &Config, zones: ZoneFile) -> Self {
        Self {
            config: config.replay.clone(),
            engine_config: config.engine.clone(),
            zones,
        }
    }

    pub fn find_detection_logs(&self) -> Result<Vec<PathBuf>> {
        let mut logs: Vec<PathBuf> = WalkDir::new(&self.config.input_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|ext| ext.to_str())
                        .map_or(false, |ext| ext.eq_ignore_ascii_case("jsonl"))
            })
            .collect();
        logs.sort();

        info!(
            "Found {} detection logs under {}",
            logs.len(),
            self.config.input_dir
        );
        Ok(logs)
    }

    pub fn replay_file(&self, path: &Path) -> Result<ReplaySummary> {
        info!("Replaying {}", path.display());

        let reader = BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        );

        fs::create_dir_all(&self.config.output_dir)
            .with_context(|| format!("creating {}", self.config.output_dir))?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("replay");
        let out_dir = PathBuf::from(&self.config.output_dir);
        let rows_path = out_dir.join(format!("{}_zones.jsonl", stem));
        let events_path = out_dir.join(format!("{}_events.jsonl", stem));
        let mut rows_out = BufWriter::new(
            File::create(&rows_path).with_context(|| format!("creating {}", rows_path.display()))?,
        );
        let mut events_out = BufWriter::new(
            File::create(&events_path)
                .with_context(|| format!("creating {}", events_path.display()))?,
        );

        let mut engine = OccupancyEngine::new(
            self.engine_config.clone(),
            self.zones.zones.clone(),
            self.zones.exclusions.clone(),
            self.config.frame_width,
            self.config.frame_height,
        );

        let fps = if self.config.fps > 0.0 { self.config.fps } else { 30.0 };
        let mut frame_index = 0u64;
        let mut event_count = 0usize;
        let mut max_people_seated = 0usize;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("reading {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let recorded: RecordedFrame = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}: invalid frame record", path.display(), line_no + 1))?;

            let index = recorded.frame.unwrap_or(frame_index);
            let timestamp = recorded.time.unwrap_or(index as f64 / fps);
            frame_index += 1;

            let ctx = engine.step(
                FrameInput {
                    global_detections: &recorded.global,
                    zone_detections: &recorded.zone,
                    frame: None,
                    timestamp,
                },
                &NoBodyAnalyzer,
            );
            max_people_seated = max_people_seated.max(ctx.total_seated());

            // Output lines up with the source video when the log numbers its frames
            let source_frame = recorded.frame.unwrap_or(ctx.frame_id);
            for mut row in ctx.rows() {
                row.frame = source_frame;
                serde_json::to_writer(&mut rows_out, &row)?;
                rows_out.write_all(b"\n")?;
            }
            for mut event in engine.drain_events() {
                event.frame_id = source_frame;
                serde_json::to_writer(&mut events_out, &event)?;
                events_out.write_all(b"\n")?;
                event_count += 1;
            }

            if self.config.progress_interval > 0 && frame_index % self.config.progress_interval == 0 {
                info!(
                    "{}: frame {} | {} tracks | {}/{} zones occupied",
                    stem,
                    frame_index,
                    ctx.tracks.len(),
                    ctx.occupied_count(),
                    ctx.zones.len()
                );
            }
        }

        rows_out.flush()?;
        events_out.flush()?;
        debug!("Wrote {} and {}", rows_path.display(), events_path.display());

        Ok(ReplaySummary {
            input: path.to_path_buf(),
            rows_path,
            events_path,
            frames: frame_index,
            events: event_count,
            max_people_seated,
            metrics: engine.metrics().summary(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ZoneConfig;
    use crate::geometry::Polygon;
    use tempfile::tempdir;

    fn processor(input_dir: &Path, output_dir: &Path) -> ReplayProcessor {
        let mut config = Config::default();
        config.replay.input_dir = input_dir.display().to_string();
        config.replay.output_dir = output_dir.display().to_string();
        config.replay.frame_width = 1000.0;
        config.replay.frame_height = 1000.0;
        config.replay.fps = 10.0;
        let zones = ZoneFile {
            zones: vec![ZoneConfig::new(
                "T1",
                Polygon::from_coords(&[(300.0, 300.0), (500.0, 300.0), (500.0, 500.0), (300.0, 500.0)]),
            )],
            exclusions: Vec::new(),
        };
        ReplayProcessor::new(&config, zones)
    }

    #[test]
    fn test_find_detection_logs_recurses_and_filters() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("cam1")).unwrap();
        fs::write(dir.path().join("cam1/a.jsonl"), "").unwrap();
        fs::write(dir.path().join("b.JSONL"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let out = tempdir().unwrap();
        let logs = processor(dir.path(), out.path()).find_detection_logs().unwrap();
        assert_eq!(logs.len(), 2);
    }

    #[test]
    fn test_replay_seats_still_person() {
        let dir = tempdir().unwrap();
        let out = tempdir().unwrap();
        let line = r#"{"global": [{"bbox": [350, 250, 450, 350], "confidence": 0.9}]}"#;
        let log: String = (0..40).map(|_| format!("{}\n", line)).collect();
        let input = dir.path().join("session.jsonl");
        fs::write(&input, log).unwrap();

        let summary = processor(dir.path(), out.path()).replay_file(&input).unwrap();
        assert_eq!(summary.frames, 40);
        assert_eq!(summary.max_people_seated, 1);
        assert!(summary.events >= 2);

        let rows = fs::read_to_string(&summary.rows_path).unwrap();
        let last: serde_json::Value =
            serde_json::from_str(rows.lines().last().unwrap()).unwrap();
        assert_eq!(last["zone_id"], "T1");
        assert_eq!(last["frame"], 40);
        assert_eq!(last["occupied"], true);
        assert_eq!(last["people_seated"], 1);
        // 40th line, index 39 at 10 fps
        assert!((last["time"].as_f64().unwrap() - 3.9).abs() < 1e-9);

        let events = fs::read_to_string(&summary.events_path).unwrap();
        assert!(events.contains("\"type\":\"track_seated\""));
    }

    #[test]
    fn test_rows_keep_recorded_frame_numbers() {
        let dir = tempdir().unwrap();
        let out = tempdir().unwrap();
        let input = dir.path().join("clip.jsonl");
        // Log starts mid-video and skips a frame
        fs::write(&input, "{\"frame\": 500}\n{\"frame\": 502}\n{\"frame\": 503}\n").unwrap();

        let summary = processor(dir.path(), out.path()).replay_file(&input).unwrap();
        let rows = fs::read_to_string(&summary.rows_path).unwrap();
        let frames: Vec<u64> = rows
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["frame"].as_u64().unwrap())
            .collect();
        assert_eq!(frames, vec![500, 502, 503]);

        let first: serde_json::Value = serde_json::from_str(rows.lines().next().unwrap()).unwrap();
        assert!((first["time"].as_f64().unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_bad_line_reports_location() {
        let dir = tempdir().unwrap();
        let out = tempdir().unwrap();
        let input = dir.path().join("broken.jsonl");
        fs::write(&input, "{}\nnot json\n").unwrap();

        let err = processor(dir.path(), out.path())
            .replay_file(&input)
            .unwrap_err();
        assert!(format!("{:#}", err).contains("broken.jsonl:2"));
    }
}
