use serde_derive::Serialize;

use crate::bbox::{BBox, Ltrb};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub id: u32,

    // exponentially smoothed box
    pub bbox: BBox<Ltrb>,

    // box before the last match, used for motion prediction
    pub prev_bbox: Option<BBox<Ltrb>>,
    pub last_seen_frame: u64,
    pub misses: u32,
}

impl Track {
    pub fn new(id: u32, bbox: BBox<Ltrb>, frame: u64) -> Self {
        Self {
            id,
            bbox,
            prev_bbox: None,
            last_seen_frame: frame,
            misses: 0,
        }
    }

    /// Linear extrapolation of the box to `frame`
    pub fn predict(&self, frame: u64) -> BBox<Ltrb> {
        match &self.prev_bbox {
            Some(prev) => {
                let gap = frame.saturating_sub(self.last_seen_frame).max(1);
                self.bbox.extrapolate(prev, gap as f32)
            }
            None => self.bbox,
        }
    }

    pub fn update(&mut self, bbox: &BBox<Ltrb>, smoothing: f32, frame: u64) {
        self.prev_bbox = Some(self.bbox);
        self.bbox = self.bbox.lerp(bbox, smoothing);
        self.last_seen_frame = frame;
        self.misses = 0;
    }

    /// Registers a frame without a match, returns the new miss count
    #[inline]
    pub fn mark_missed(&mut self) -> u32 {
        self.misses += 1;
        self.misses
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.bbox.area()
    }
}
