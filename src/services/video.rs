use crate::error::AppError;
use opencv::core::{AlgorithmHint, Mat, Size};
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture, VideoWriter};
use opencv::imgproc;
use std::path::{Path, PathBuf};
use tracing::info;

const FALLBACK_FPS: f64 = 25.0;

pub struct VideoReader {
    cap: VideoCapture,
    pub fps: f64,
    pub total_frames: i64,
    pub width: i32,
    pub height: i32,
    pub current_frame: u64,
}

/// Open a local file or network stream URL for reading.
pub fn open_source(source: &str) -> Result<VideoReader, AppError> {
    info!("Opening video source: {}", source);
    let cap = VideoCapture::from_file(source, videoio::CAP_ANY)?;
    if !cap.is_opened()? {
        return Err(format!("Failed to open video source {}", source).into());
    }

    let mut fps = cap.get(videoio::CAP_PROP_FPS)?;
    if !fps.is_finite() || fps <= 0.0 {
        fps = FALLBACK_FPS;
    }
    let total_frames = cap.get(videoio::CAP_PROP_FRAME_COUNT)? as i64;
    let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
    let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;

    Ok(VideoReader {
        cap,
        fps,
        total_frames,
        width,
        height,
        current_frame: 0,
    })
}

impl VideoReader {
    /// Next frame in BGR, or None once the source is exhausted.
    pub fn read_frame(&mut self) -> Result<Option<Mat>, AppError> {
        let mut mat = Mat::default();
        if !self.cap.read(&mut mat)? || mat.empty() {
            return Ok(None);
        }
        self.current_frame += 1;
        Ok(Some(mat))
    }

    pub fn progress(&self) -> f32 {
        if self.total_frames <= 0 {
            return 0.0;
        }
        (self.current_frame as f32 / self.total_frames as f32) * 100.0
    }
}

/// Create the annotated-output writer next to a deterministic name derived
/// from the source. Returns the writer together with the output path.
pub fn create_writer(
    output_dir: &Path,
    source: &str,
    width: i32,
    height: i32,
    fps: f64,
) -> Result<(VideoWriter, PathBuf), AppError> {
    std::fs::create_dir_all(output_dir).map_err(|e| AppError {
        message: format!(
            "Failed to create output directory {}: {}",
            output_dir.display(),
            e
        ),
    })?;

    let stem = Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("stream");
    let output_path = output_dir.join(format!("{}_annotated.mp4", stem));

    let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
    let writer = VideoWriter::new(
        &output_path.to_string_lossy(),
        fourcc,
        fps,
        Size::new(width, height),
        true,
    )?;
    if !writer.is_opened()? {
        return Err(format!(
            "Failed to open video writer at {}",
            output_path.display()
        )
        .into());
    }
    Ok((writer, output_path))
}

/// Convert a BGR frame to an owned RGB image for the detector.
pub fn mat_to_rgb_image(mat: &Mat) -> Result<image::RgbImage, AppError> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(
        mat,
        &mut rgb,
        imgproc::COLOR_BGR2RGB,
        0,
        AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;
    let width = rgb.cols() as u32;
    let height = rgb.rows() as u32;
    let data = rgb.data_bytes()?.to_vec();
    image::RgbImage::from_vec(width, height, data)
        .ok_or_else(|| "Failed to convert frame buffer".into())
}
