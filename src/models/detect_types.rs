use serde::Serialize;

/// Axis-aligned box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn intersection(&self, other: &BBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);
        (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
    }

    pub fn iou(&self, other: &BBox) -> f32 {
        let inter = self.intersection(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Bottom-center of the box: where a standing person touches the ground,
    /// which is the point tested against the water polygon.
    pub fn anchor(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, self.y2)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub bbox: BBox,
    pub class_id: usize,
    pub confidence: f32,
}

/// Where a detection's anchor landed relative to the water polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Placement {
    Water,
    Beach,
}

impl Placement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Placement::Water => "in water",
            Placement::Beach => "on beach",
        }
    }
}

/// Running totals across the pass. Frame-additive: the same person visible
/// in N processed frames contributes N, there is no identity dedup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassCounters {
    pub water: u64,
    pub beach: u64,
    pub frames: u64,
}

impl PassCounters {
    pub fn record(&mut self, placement: Placement) {
        match placement {
            Placement::Water => self.water += 1,
            Placement::Beach => self.beach += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub counters: PassCounters,
    pub label: String,
    pub output_path: String,
}

/// Result of one analysis. The canned variant is the original demo's fixed
/// label; it has no underlying model and none is invented here.
#[derive(Debug, Clone, Serialize)]
pub enum AnalysisOutcome {
    Canned { label: String },
    Detected(AnalysisReport),
}

pub const CANNED_LABEL: &str = "95% no-rip";

impl AnalysisOutcome {
    pub fn canned() -> Self {
        AnalysisOutcome::Canned {
            label: CANNED_LABEL.to_string(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            AnalysisOutcome::Canned { label } => label,
            AnalysisOutcome::Detected(report) => &report.label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_is_bottom_center() {
        let bbox = BBox {
            x1: 10.0,
            y1: 20.0,
            x2: 30.0,
            y2: 60.0,
        };
        assert_eq!(bbox.anchor(), (20.0, 60.0));
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BBox {
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
        };
        let b = BBox {
            x1: 20.0,
            y1: 20.0,
            x2: 30.0,
            y2: 30.0,
        };
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = BBox {
            x1: 5.0,
            y1: 5.0,
            x2: 15.0,
            y2: 25.0,
        };
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn counters_accumulate_per_record() {
        let mut counters = PassCounters::default();
        counters.record(Placement::Water);
        counters.record(Placement::Water);
        counters.record(Placement::Beach);
        assert_eq!(counters.water, 2);
        assert_eq!(counters.beach, 1);
    }
}
