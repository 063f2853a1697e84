use crate::error::AppError;
use crate::models::detect_types::{BBox, Detection};
use image::RgbImage;
use ndarray::Array4;
use ort::value::Value;
use ort::session::Session;

pub const DEFAULT_INPUT_SIZE: u32 = 640;

// Padding gray used by the YOLO reference preprocessing.
const PAD_VALUE: f32 = 114.0;

#[derive(Debug, Clone)]
pub struct DetectorParams {
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Only detections of this class survive the pass.
    pub target_class: usize,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            target_class: 0,
        }
    }
}

/// How a frame was scaled and padded into the square model input; needed to
/// map boxes back to frame coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

pub fn letterbox_params(frame_w: u32, frame_h: u32, input_size: u32) -> Letterbox {
    let scale = (input_size as f32 / frame_w as f32).min(input_size as f32 / frame_h as f32);
    let new_w = (frame_w as f32 * scale).round();
    let new_h = (frame_h as f32 * scale).round();
    Letterbox {
        scale,
        pad_x: (input_size as f32 - new_w) / 2.0,
        pad_y: (input_size as f32 - new_h) / 2.0,
    }
}

/// Scale the frame into the square model input preserving aspect ratio, pad
/// the rest, normalize to [0,1] NCHW.
pub fn preprocess_frame(
    frame: &RgbImage,
    input_size: u32,
) -> Result<(Array4<f32>, Letterbox), AppError> {
    let (w, h) = frame.dimensions();
    let letterbox = letterbox_params(w, h, input_size);
    let new_w = ((w as f32 * letterbox.scale).round() as u32).max(1);
    let new_h = ((h as f32 * letterbox.scale).round() as u32).max(1);
    let resized = image::imageops::resize(frame, new_w, new_h, image::imageops::FilterType::Triangle);

    let side = input_size as usize;
    let hw = side * side;
    let mut data = vec![PAD_VALUE / 255.0; 3 * hw];

    let off_x = letterbox.pad_x as usize;
    let off_y = letterbox.pad_y as usize;
    for (x, y, pixel) in resized.enumerate_pixels() {
        let idx = (y as usize + off_y) * side + (x as usize + off_x);
        data[idx] = pixel[0] as f32 / 255.0;
        data[hw + idx] = pixel[1] as f32 / 255.0;
        data[2 * hw + idx] = pixel[2] as f32 / 255.0;
    }

    let tensor = Array4::from_shape_vec((1, 3, side, side), data).map_err(|e| AppError {
        message: format!("Failed to create tensor: {}", e),
    })?;
    Ok((tensor, letterbox))
}

/// Run the detector on one frame and return the surviving detections of the
/// configured class, in frame coordinates.
pub fn run_detection(
    session: &mut Session,
    frame: &RgbImage,
    params: &DetectorParams,
) -> Result<Vec<Detection>, AppError> {
    let (frame_w, frame_h) = frame.dimensions();
    let (tensor, letterbox) = preprocess_frame(frame, params.input_size)?;

    // Get the input name from the model (assuming single input)
    let input_name = session.inputs()[0].name().to_string();

    let input_tensor = Value::from_array(tensor).map_err(|e| AppError {
        message: format!("Failed to create tensor value: {}", e),
    })?;

    let outputs = session
        .run(ort::inputs![input_name.as_str() => input_tensor])
        .map_err(|e| AppError {
            message: format!("Inference failed: {}", e),
        })?;

    let output_value = outputs.values().next().ok_or_else(|| AppError {
        message: "Model produced no outputs".to_string(),
    })?;

    let (shape, data) = output_value
        .try_extract_tensor::<f32>()
        .map_err(|e| AppError {
            message: format!("Failed to extract output tensor: {}", e),
        })?;

    let dims: Vec<usize> = shape.iter().map(|d| *d as usize).collect();
    let candidates = decode_output(&dims, data, &letterbox, frame_w, frame_h, params)?;
    Ok(nms(candidates, params.iou_threshold))
}

/// Decode a YOLOv8-style `[1, 4+classes, anchors]` output: pick the best
/// class per anchor, keep confident hits of the target class, and map the
/// xywh box back through the letterbox into frame coordinates.
pub fn decode_output(
    dims: &[usize],
    data: &[f32],
    letterbox: &Letterbox,
    frame_w: u32,
    frame_h: u32,
    params: &DetectorParams,
) -> Result<Vec<Detection>, AppError> {
    if dims.len() != 3 || dims[1] < 5 {
        return Err(format!("Unexpected detector output shape {:?}", dims).into());
    }
    let attrs = dims[1];
    let anchors = dims[2];
    let classes = attrs - 4;

    let mut detections = Vec::new();
    for a in 0..anchors {
        let mut best_class = 0;
        let mut best_score = f32::NEG_INFINITY;
        for c in 0..classes {
            let score = data[(4 + c) * anchors + a];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }
        if best_score < params.confidence_threshold || best_class != params.target_class {
            continue;
        }

        let cx = data[a];
        let cy = data[anchors + a];
        let w = data[2 * anchors + a];
        let h = data[3 * anchors + a];

        let x1 = ((cx - w / 2.0 - letterbox.pad_x) / letterbox.scale).clamp(0.0, frame_w as f32);
        let y1 = ((cy - h / 2.0 - letterbox.pad_y) / letterbox.scale).clamp(0.0, frame_h as f32);
        let x2 = ((cx + w / 2.0 - letterbox.pad_x) / letterbox.scale).clamp(0.0, frame_w as f32);
        let y2 = ((cy + h / 2.0 - letterbox.pad_y) / letterbox.scale).clamp(0.0, frame_h as f32);

        detections.push(Detection {
            bbox: BBox { x1, y1, x2, y2 },
            class_id: best_class,
            confidence: best_score,
        });
    }
    Ok(detections)
}

/// Greedy non-maximum suppression, highest confidence first.
pub fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::new();
    for det in detections {
        if kept.iter().all(|k| k.bbox.iou(&det.bbox) <= iou_threshold) {
            kept.push(det);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_letterbox() -> Letterbox {
        Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        }
    }

    fn det(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Detection {
        Detection {
            bbox: BBox { x1, y1, x2, y2 },
            class_id: 0,
            confidence,
        }
    }

    #[test]
    fn letterbox_of_wide_frame_pads_vertically() {
        let lb = letterbox_params(1280, 720, 640);
        assert!((lb.scale - 0.5).abs() < 1e-6);
        assert_eq!(lb.pad_x, 0.0);
        assert!((lb.pad_y - 140.0).abs() < 1e-6);
    }

    #[test]
    fn decode_keeps_target_class_and_maps_boxes() {
        // [1, 6, 2]: 4 box rows + 2 class rows, 2 anchors. Anchor 0 is a
        // confident person at the frame center, anchor 1 is another class.
        let dims = [1, 6, 2];
        let anchors = 2;
        let mut data = vec![0.0f32; 6 * anchors];
        // anchor 0: cx=320, cy=320, w=100, h=200, class0=0.9
        data[0] = 320.0;
        data[anchors] = 320.0;
        data[2 * anchors] = 100.0;
        data[3 * anchors] = 200.0;
        data[4 * anchors] = 0.9;
        // anchor 1: confident but class 1
        data[1] = 100.0;
        data[anchors + 1] = 100.0;
        data[2 * anchors + 1] = 50.0;
        data[3 * anchors + 1] = 50.0;
        data[5 * anchors + 1] = 0.8;

        let params = DetectorParams::default();
        let detections =
            decode_output(&dims, &data, &identity_letterbox(), 640, 640, &params).unwrap();
        assert_eq!(detections.len(), 1);
        let bbox = detections[0].bbox;
        assert!((bbox.x1 - 270.0).abs() < 1e-3);
        assert!((bbox.y1 - 220.0).abs() < 1e-3);
        assert!((bbox.x2 - 370.0).abs() < 1e-3);
        assert!((bbox.y2 - 420.0).abs() < 1e-3);
    }

    #[test]
    fn decode_undoes_the_letterbox() {
        let dims = [1, 5, 1];
        // One anchor, one class: box at input (320, 240), 64x64, score 0.7.
        let data = vec![320.0, 240.0, 64.0, 64.0, 0.7];
        let lb = letterbox_params(1280, 720, 640); // scale 0.5, pad_y 140
        let params = DetectorParams::default();
        let detections = decode_output(&dims, &data, &lb, 1280, 720, &params).unwrap();
        assert_eq!(detections.len(), 1);
        let bbox = detections[0].bbox;
        assert!((bbox.x1 - (320.0 - 32.0) * 2.0).abs() < 1e-3);
        assert!((bbox.y1 - (240.0 - 32.0 - 140.0) * 2.0).abs() < 1e-3);
    }

    #[test]
    fn low_confidence_anchors_are_dropped() {
        let dims = [1, 5, 1];
        let data = vec![320.0, 240.0, 64.0, 64.0, 0.1];
        let detections = decode_output(
            &dims,
            &data,
            &identity_letterbox(),
            640,
            640,
            &DetectorParams::default(),
        )
        .unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn unexpected_shape_is_an_error() {
        assert!(decode_output(
            &[1, 2],
            &[],
            &identity_letterbox(),
            640,
            640,
            &DetectorParams::default()
        )
        .is_err());
    }

    #[test]
    fn nms_suppresses_overlaps_keeps_best() {
        let detections = vec![
            det(0.0, 0.0, 100.0, 100.0, 0.8),
            det(5.0, 5.0, 105.0, 105.0, 0.9),
            det(300.0, 300.0, 400.0, 400.0, 0.5),
        ];
        let kept = nms(detections, 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.5);
    }
}
