pub mod assignment;
pub mod bbox;
pub mod calibration;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod history;
pub mod pipeline;
pub mod rolling_avg;
pub mod tracker;
pub mod transformer;

mod circular_queue;
mod track;

pub use config::Config;
pub use detection::{Detection, TrackedDetection};
pub use frame::{Frame, FrameResult};
pub use pipeline::{spawn_worker, Pipeline, Recalibrator, Worker};
pub use track::Track;
pub use tracker::{Tracker, TrackerConfig};
pub use transformer::GroundPlaneTransformer;

/// Anything that can assign identities to per-frame detections
pub trait Tracking {
    fn reset(&mut self);
    fn update(&mut self, detections: &[Detection]) -> Vec<u32>;
    fn tracks(&self) -> &[Track];
}

impl crate::Tracking for Tracker {
    #[inline]
    fn reset(&mut self) {
        Tracker::reset(self)
    }

    #[inline]
    fn update(&mut self, detections: &[Detection]) -> Vec<u32> {
        Tracker::update(self, detections)
    }

    #[inline]
    fn tracks(&self) -> &[Track] {
        Tracker::tracks(self)
    }
}
