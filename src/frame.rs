use serde_derive::{Deserialize, Serialize};

use crate::detection::{Detection, TrackedDetection};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Frame {
    /// Dimensions of the detector output space the boxes are expressed in
    pub source_dims: (u32, u32),

    /// Dimensions of the camera image the calibration refers to
    pub image_dims: (u32, u32),
    pub detections: Vec<Detection>,
    pub timestamp_ms: u64,
    pub inference_time_ms: Option<u64>,
}

impl Frame {
    pub fn new(dims: (u32, u32), timestamp_ms: u64, detections: Vec<Detection>) -> Self {
        Self {
            source_dims: dims,
            image_dims: dims,
            detections,
            timestamp_ms,
            inference_time_ms: None,
        }
    }

    /// Per-axis factors mapping detector space onto image space
    #[inline]
    pub fn scale(&self) -> (f32, f32) {
        let (sw, sh) = self.source_dims;
        let (iw, ih) = self.image_dims;

        if sw == 0 || sh == 0 {
            return (1.0, 1.0);
        }

        (iw as f32 / sw as f32, ih as f32 / sh as f32)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FrameResult {
    pub timestamp_ms: u64,
    pub detections: Vec<TrackedDetection>,
    pub inference_time_ms: Option<u64>,
}

impl FrameResult {
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &TrackedDetection> {
        self.detections.iter()
    }

    pub fn by_id(&self, id: u32) -> Option<&TrackedDetection> {
        self.detections.iter().find(|d| d.id == Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale() {
        let mut frame = Frame::new((640, 480), 0, Vec::new());
        assert_eq!(frame.scale(), (1.0, 1.0));

        frame.image_dims = (1280, 1920);
        assert_eq!(frame.scale(), (2.0, 4.0));

        frame.source_dims = (0, 480);
        assert_eq!(frame.scale(), (1.0, 1.0));
    }
}
