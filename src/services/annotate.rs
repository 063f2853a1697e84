use crate::error::AppError;
use crate::models::detect_types::{Detection, PassCounters, Placement};
use crate::services::zones::WaterZone;
use opencv::core::{Mat, Point, Rect, Scalar, Vector};
use opencv::imgproc;

const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: f64 = 0.5;

// Colors are BGR.
fn placement_color(placement: Placement) -> Scalar {
    match placement {
        Placement::Water => Scalar::new(0.0, 0.0, 255.0, 0.0),
        Placement::Beach => Scalar::new(0.0, 200.0, 0.0, 0.0),
    }
}

fn zone_color() -> Scalar {
    Scalar::new(255.0, 160.0, 0.0, 0.0)
}

fn overlay_color() -> Scalar {
    Scalar::new(255.0, 255.0, 255.0, 0.0)
}

/// Outline the annotated water region.
pub fn draw_zone(frame: &mut Mat, zone: &WaterZone) -> Result<(), AppError> {
    let points: Vector<Point> = zone
        .points()
        .iter()
        .map(|p| Point::new(p.x as i32, p.y as i32))
        .collect();
    imgproc::polylines(
        frame,
        &points,
        true,
        zone_color(),
        BOX_THICKNESS,
        imgproc::LINE_8,
        0,
    )?;
    Ok(())
}

/// Box, anchor dot and label for one detection, colored by placement.
pub fn draw_detection(
    frame: &mut Mat,
    detection: &Detection,
    placement: Placement,
) -> Result<(), AppError> {
    let color = placement_color(placement);
    let bbox = &detection.bbox;
    let rect = Rect::new(
        bbox.x1 as i32,
        bbox.y1 as i32,
        bbox.width() as i32,
        bbox.height() as i32,
    );
    imgproc::rectangle(frame, rect, color, BOX_THICKNESS, imgproc::LINE_8, 0)?;

    let (ax, ay) = bbox.anchor();
    imgproc::circle(
        frame,
        Point::new(ax as i32, ay as i32),
        3,
        color,
        -1,
        imgproc::LINE_8,
        0,
    )?;

    let label = format!("{} {:.0}%", placement.as_str(), detection.confidence * 100.0);
    imgproc::put_text(
        frame,
        &label,
        Point::new(bbox.x1 as i32, (bbox.y1 as i32 - 6).max(12)),
        imgproc::FONT_HERSHEY_SIMPLEX,
        LABEL_SCALE,
        color,
        1,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}

/// Running water/beach totals in the top-left corner.
pub fn draw_counters(frame: &mut Mat, counters: &PassCounters) -> Result<(), AppError> {
    let text = format!(
        "in water: {}  on beach: {}",
        counters.water, counters.beach
    );
    imgproc::put_text(
        frame,
        &text,
        Point::new(10, 30),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.8,
        overlay_color(),
        2,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}
