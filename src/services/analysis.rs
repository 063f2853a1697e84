use crate::error::AppError;
use crate::models::detect_types::{AnalysisReport, Detection, PassCounters, Placement};
use crate::services::detector::inference::{self, DetectorParams};
use crate::services::detector::model_manager::DetectorManager;
use crate::services::zones::WaterZone;
use crate::services::{annotate, video};
use opencv::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct PassSettings {
    pub frame_cap: u64,
    pub params: DetectorParams,
    pub output_dir: PathBuf,
}

/// Bucket one detection by where its bottom-center anchor lands.
pub fn classify_detection(zone: &WaterZone, detection: &Detection) -> Placement {
    let (ax, ay) = detection.bbox.anchor();
    if zone.contains(ax as f64, ay as f64) {
        Placement::Water
    } else {
        Placement::Beach
    }
}

/// One sequential pass over the source: read a frame, detect, classify each
/// detection against the water polygon, draw, count, write the annotated
/// frame. Stops at source exhaustion, the frame cap, or the cancel flag; any
/// read or inference error aborts the whole pass.
pub fn run_pass(
    manager: &DetectorManager,
    zone: &WaterZone,
    source: &str,
    settings: &PassSettings,
) -> Result<AnalysisReport, AppError> {
    let mut reader = video::open_source(source)?;
    let (mut writer, output_path) = video::create_writer(
        &settings.output_dir,
        source,
        reader.width,
        reader.height,
        reader.fps,
    )?;

    let session_lock = manager.session();
    let mut counters = PassCounters::default();

    while under_frame_cap(&counters, settings.frame_cap) {
        if manager.is_cancelled() {
            info!("Pass cancelled after {} frames", counters.frames);
            break;
        }

        let Some(mut frame) = reader.read_frame()? else {
            break;
        };

        let rgb = video::mat_to_rgb_image(&frame)?;
        let detections = {
            let mut guard = session_lock
                .lock()
                .map_err(|_| AppError::from("Detector session lock poisoned"))?;
            let session = guard
                .as_mut()
                .ok_or_else(|| AppError::from("Detector not loaded"))?;
            inference::run_detection(session, &rgb, &settings.params)?
        };

        annotate::draw_zone(&mut frame, zone)?;
        for detection in &detections {
            let placement = classify_detection(zone, detection);
            counters.record(placement);
            annotate::draw_detection(&mut frame, detection, placement)?;
        }
        counters.frames += 1;
        annotate::draw_counters(&mut frame, &counters)?;
        writer.write(&frame)?;

        if counters.frames % 50 == 0 {
            debug!(
                "Frame {}: {:.1}% | water {} | beach {}",
                counters.frames,
                reader.progress(),
                counters.water,
                counters.beach
            );
        }
    }

    writer.release()?;
    info!(
        "Pass finished: {} frames, {} in water, {} on beach",
        counters.frames, counters.water, counters.beach
    );

    Ok(AnalysisReport {
        counters,
        label: verdict_label(&counters),
        output_path: output_path.to_string_lossy().to_string(),
    })
}

/// Run the blocking pass off the async surface, the way classification runs
/// behind the command layer.
pub async fn run_pass_blocking(
    manager: DetectorManager,
    zone: WaterZone,
    source: String,
    settings: PassSettings,
) -> Result<AnalysisReport, AppError> {
    manager.reset_cancel_flag();
    tokio::task::spawn_blocking(move || run_pass(&manager, &zone, &source, &settings))
        .await
        .map_err(|e| AppError {
            message: format!("Task join failed: {}", e),
        })?
}

/// The cap bounds processed frames exactly: once `frames` reaches it, the
/// loop stops before reading another frame.
fn under_frame_cap(counters: &PassCounters, cap: u64) -> bool {
    counters.frames < cap
}

fn verdict_label(counters: &PassCounters) -> String {
    if counters.water > 0 {
        format!("{} in water / {} on beach", counters.water, counters.beach)
    } else {
        format!("nobody in water / {} on beach", counters.beach)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::detect_types::BBox;
    use crate::services::zones::Point;

    fn shore_zone() -> WaterZone {
        // Water is the upper band of a 100x100 frame.
        WaterZone::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 40.0),
            Point::new(0.0, 40.0),
        ])
        .unwrap()
    }

    fn person_at(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection {
            bbox: BBox { x1, y1, x2, y2 },
            class_id: 0,
            confidence: 0.9,
        }
    }

    #[test]
    fn anchor_decides_the_bucket() {
        let zone = shore_zone();
        // Head in the water band but feet on the beach: beach.
        let wader = person_at(45.0, 30.0, 55.0, 70.0);
        assert_eq!(classify_detection(&zone, &wader), Placement::Beach);
        // Fully inside the band: water.
        let swimmer = person_at(45.0, 10.0, 55.0, 35.0);
        assert_eq!(classify_detection(&zone, &swimmer), Placement::Water);
    }

    #[test]
    fn anchor_on_the_water_edge_counts_as_water() {
        let zone = shore_zone();
        let on_the_line = person_at(45.0, 10.0, 55.0, 40.0);
        assert_eq!(classify_detection(&zone, &on_the_line), Placement::Water);
    }

    #[test]
    fn counts_are_frame_additive() {
        // A stationary swimmer visible across 30 processed frames adds 30;
        // nothing dedups by identity.
        let zone = shore_zone();
        let swimmer = person_at(45.0, 10.0, 55.0, 35.0);
        let mut counters = PassCounters::default();
        for _ in 0..30 {
            counters.record(classify_detection(&zone, &swimmer));
            counters.frames += 1;
        }
        assert_eq!(counters.water, 30);
        assert_eq!(counters.beach, 0);
        assert_eq!(counters.frames, 30);
    }

    #[test]
    fn frame_cap_bounds_processing_exactly() {
        let mut counters = PassCounters::default();
        let cap = 5;
        while under_frame_cap(&counters, cap) {
            counters.frames += 1;
        }
        assert_eq!(counters.frames, cap);
        assert!(!under_frame_cap(&counters, cap));
    }

    #[test]
    fn verdict_label_reflects_counts() {
        let mut counters = PassCounters::default();
        counters.beach = 3;
        assert_eq!(verdict_label(&counters), "nobody in water / 3 on beach");
        counters.water = 2;
        assert_eq!(verdict_label(&counters), "2 in water / 3 on beach");
    }
}
