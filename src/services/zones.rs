use crate::error::AppError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;

const WATER_LABEL: &str = "water";

// Tolerance for the on-edge test, in pixels.
const EDGE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The hand-annotated water region: an ordered polygon loaded once from a
/// CVAT-style XML file and never updated afterwards.
#[derive(Debug, Clone)]
pub struct WaterZone {
    points: Vec<Point>,
}

impl WaterZone {
    pub fn from_points(points: Vec<Point>) -> Result<Self, AppError> {
        if points.len() < 3 {
            return Err(format!(
                "water polygon needs at least 3 points, got {}",
                points.len()
            )
            .into());
        }
        Ok(Self { points })
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let xml = std::fs::read_to_string(path).map_err(|e| AppError {
            message: format!("Failed to read annotation file {}: {}", path.display(), e),
        })?;
        Self::from_xml(&xml)
    }

    /// Find the first `<polygon label="water" points="x,y;x,y;...">` element
    /// in a CVAT annotation document.
    pub fn from_xml(xml: &str) -> Result<Self, AppError> {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    if e.name().as_ref() != b"polygon" {
                        continue;
                    }
                    let mut label = None;
                    let mut points = None;
                    for attr in e.attributes() {
                        let attr = attr.map_err(|err| AppError {
                            message: format!("Malformed polygon attribute: {}", err),
                        })?;
                        let value = attr
                            .unescape_value()
                            .map_err(|err| AppError {
                                message: format!("Malformed polygon attribute value: {}", err),
                            })?
                            .into_owned();
                        match attr.key.as_ref() {
                            b"label" => label = Some(value),
                            b"points" => points = Some(value),
                            _ => {}
                        }
                    }
                    if label.as_deref() == Some(WATER_LABEL) {
                        let raw = points
                            .ok_or_else(|| AppError {
                                message: "water polygon has no points attribute".to_string(),
                            })?;
                        return Self::from_points(parse_points(&raw)?);
                    }
                }
                Ok(Event::Eof) => break,
                Err(err) => return Err(err.into()),
                _ => {}
            }
        }
        Err(format!("no polygon labeled \"{}\" in annotation file", WATER_LABEL).into())
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Even-odd ray-cast containment. The boundary is inclusive: a point
    /// exactly on an edge or vertex counts as inside, so a swimmer standing
    /// on the annotated waterline is still classified as in the water.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let pts = &self.points;
        let n = pts.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            if on_segment(x, y, pts[i], pts[j]) {
                return true;
            }
            if (pts[i].y > y) != (pts[j].y > y) {
                let x_cross = pts[i].x
                    + (y - pts[i].y) * (pts[j].x - pts[i].x) / (pts[j].y - pts[i].y);
                if x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

/// Parse a semicolon-separated list of comma pairs: "x1,y1;x2,y2;...".
fn parse_points(raw: &str) -> Result<Vec<Point>, AppError> {
    let mut points = Vec::new();
    for pair in raw.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (x, y) = pair.split_once(',').ok_or_else(|| AppError {
            message: format!("Malformed polygon point \"{}\"", pair),
        })?;
        let x: f64 = x.trim().parse().map_err(|_| AppError {
            message: format!("Malformed polygon coordinate \"{}\"", pair),
        })?;
        let y: f64 = y.trim().parse().map_err(|_| AppError {
            message: format!("Malformed polygon coordinate \"{}\"", pair),
        })?;
        points.push(Point::new(x, y));
    }
    Ok(points)
}

fn on_segment(x: f64, y: f64, a: Point, b: Point) -> bool {
    let cross = (b.x - a.x) * (y - a.y) - (b.y - a.y) * (x - a.x);
    if cross.abs() > EDGE_EPSILON * (b.x - a.x).hypot(b.y - a.y).max(1.0) {
        return false;
    }
    x >= a.x.min(b.x) - EDGE_EPSILON
        && x <= a.x.max(b.x) + EDGE_EPSILON
        && y >= a.y.min(b.y) - EDGE_EPSILON
        && y <= a.y.max(b.y) + EDGE_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANNOTATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<annotations>
  <image id="0" name="beach.png" width="1920" height="1080">
    <polygon label="sand" source="manual" occluded="0" points="0,0;10,0;10,10;0,10" z_order="0"/>
    <polygon label="water" source="manual" occluded="0" points="0,0;100,0;100,50;0,50" z_order="0"/>
  </image>
</annotations>"#;

    fn square() -> WaterZone {
        WaterZone::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ])
        .unwrap()
    }

    #[test]
    fn parses_the_water_polygon_not_the_first_one() {
        let zone = WaterZone::from_xml(ANNOTATION).unwrap();
        assert_eq!(zone.points().len(), 4);
        assert_eq!(zone.points()[1], Point::new(100.0, 0.0));
    }

    #[test]
    fn missing_water_polygon_is_an_error() {
        let xml = r#"<annotations><polygon label="sand" points="0,0;1,0;1,1"/></annotations>"#;
        let err = WaterZone::from_xml(xml).unwrap_err();
        assert!(err.message.contains("water"));
    }

    #[test]
    fn malformed_points_are_an_error() {
        assert!(parse_points("1,2;oops;3,4").is_err());
        assert!(parse_points("1;2").is_err());
    }

    #[test]
    fn fewer_than_three_points_is_an_error() {
        assert!(WaterZone::from_points(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]).is_err());
    }

    #[test]
    fn interior_and_exterior_points() {
        let zone = square();
        assert!(zone.contains(5.0, 5.0));
        assert!(!zone.contains(15.0, 5.0));
        assert!(!zone.contains(5.0, -0.1));
    }

    #[test]
    fn boundary_is_inclusive() {
        let zone = square();
        // edge midpoints
        assert!(zone.contains(5.0, 0.0));
        assert!(zone.contains(10.0, 5.0));
        assert!(zone.contains(5.0, 10.0));
        assert!(zone.contains(0.0, 5.0));
        // vertices
        assert!(zone.contains(0.0, 0.0));
        assert!(zone.contains(10.0, 10.0));
    }

    #[test]
    fn concave_polygon_notch_is_outside() {
        // A "U" shape: the notch between the arms is not water.
        let zone = WaterZone::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(7.0, 10.0),
            Point::new(7.0, 3.0),
            Point::new(3.0, 3.0),
            Point::new(3.0, 10.0),
            Point::new(0.0, 10.0),
        ])
        .unwrap();
        assert!(zone.contains(1.5, 8.0));
        assert!(zone.contains(8.5, 8.0));
        assert!(!zone.contains(5.0, 8.0));
        assert!(zone.contains(5.0, 1.5));
    }
}
