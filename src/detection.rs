use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};

/// Single detector output: box in detector space plus the class label
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BBox<Ltrb>,
    pub label: String,
    #[serde(rename = "p")]
    pub confidence: f32,
}

impl Detection {
    pub fn new<S: Into<String>>(bbox: BBox<Ltrb>, label: S, confidence: f32) -> Self {
        Self {
            bbox,
            label: label.into(),
            confidence,
        }
    }

    #[inline]
    pub fn iou(&self, other: &Detection) -> f32 {
        self.bbox.iou(&other.bbox)
    }
}

/// Detection annotated with its track identity and ground-plane measurements
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrackedDetection {
    #[serde(flatten)]
    pub detection: Detection,
    pub id: Option<u32>,

    // meters from the camera foot point
    pub distance_m: Option<f64>,

    // smoothed, m/s
    pub speed_mps: Option<f64>,
}

impl TrackedDetection {
    pub fn new(detection: Detection, id: Option<u32>) -> Self {
        Self {
            detection,
            id,
            distance_m: None,
            speed_mps: None,
        }
    }
}
