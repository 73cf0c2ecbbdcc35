//! Pixel to ground-plane projection under a flat-ground pinhole camera model.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use nalgebra as na;
use tracing::{info, warn};

use crate::calibration::{Calibration, CalibrationParams};
use crate::error::Error;

impl Calibration {
    /// Projects pixel `(px, py)` onto the ground plane.
    ///
    /// Result is `(lateral, forward)` in meters, lateral positive to the right.
    pub fn project(&self, px: f64, py: f64) -> Result<na::Point2<f64>, Error> {
        let (hw, hh) = (self.half_width(), self.half_height());

        let norm_x = (px - hw) / hw;
        let norm_y = (py - hh) / hh;

        let alpha = norm_x * (self.fov_horizontal / 2.0);
        let beta = -norm_y * (self.fov_vertical / 2.0);

        // negative means below the camera horizontal, i.e. towards the ground
        let ray_elevation = beta - self.tilt_rad;

        if ray_elevation >= 0.0 || ray_elevation.is_nan() {
            return Err(Error::AboveHorizon { px, py });
        }

        let ground_distance = self.camera_height_m / ray_elevation.abs().tan();

        Ok(na::Point2::new(
            ground_distance * (alpha + self.pan_rad).tan(),
            ground_distance,
        ))
    }

    /// Pixel position of a ground point, inverse of [`Calibration::project`]
    pub fn unproject(&self, x: f64, y: f64) -> Result<(f64, f64), Error> {
        if y.is_nan() || y <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "forward_distance_m",
                value: y,
            });
        }

        let (hw, hh) = (self.half_width(), self.half_height());

        let ray_elevation = -(self.camera_height_m / y).atan();
        let beta = ray_elevation + self.tilt_rad;
        let alpha = (x / y).atan() - self.pan_rad;

        let norm_x = alpha / (self.fov_horizontal / 2.0);
        let norm_y = -beta / (self.fov_vertical / 2.0);

        Ok((norm_x * hw + hw, norm_y * hh + hh))
    }

    /// Image row of the horizon; rows above it never reach the ground
    pub fn horizon_row(&self) -> f64 {
        let norm_y = -self.tilt_rad / (self.fov_vertical / 2.0);

        norm_y * self.half_height() + self.half_height()
    }
}

/// Ground-plane transformer shared between the frame worker and whoever
/// feeds calibration updates.
///
/// The calibration lives behind an atomically swapped pointer: `calibrate`
/// publishes a complete snapshot in one store, and every projection works on
/// the single snapshot it loaded, so tilt and field of view can never be seen
/// from two different calibrations.
#[derive(Debug, Default)]
pub struct GroundPlaneTransformer {
    calibration: ArcSwapOption<Calibration>,
}

impl GroundPlaneTransformer {
    pub fn new() -> Self {
        Self {
            calibration: ArcSwapOption::empty(),
        }
    }

    pub fn with_params(params: &CalibrationParams) -> Result<Self, Error> {
        let transformer = Self::new();
        transformer.calibrate(params)?;

        Ok(transformer)
    }

    /// Validates `params` and swaps in the new calibration.
    ///
    /// On error the previous calibration, if any, stays in effect.
    pub fn calibrate(&self, params: &CalibrationParams) -> Result<Arc<Calibration>, Error> {
        let calibration = match Calibration::new(params) {
            Ok(c) => Arc::new(c),
            Err(err) => {
                warn!(%err, "calibration rejected");
                return Err(err);
            }
        };

        info!(
            height = params.camera_height_m,
            tilt = params.tilt_deg,
            pan = params.pan_deg,
            focal = params.focal_length_mm,
            width = params.image_width,
            height_px = params.image_height,
            "calibration applied"
        );

        self.calibration.store(Some(calibration.clone()));

        Ok(calibration)
    }

    #[inline]
    pub fn is_calibrated(&self) -> bool {
        self.calibration.load().is_some()
    }

    /// Current calibration snapshot
    #[inline]
    pub fn snapshot(&self) -> Option<Arc<Calibration>> {
        self.calibration.load_full()
    }

    #[inline]
    fn require(&self) -> Result<Arc<Calibration>, Error> {
        self.snapshot().ok_or(Error::NotCalibrated)
    }

    pub fn transform_point(&self, px: f64, py: f64) -> Result<na::Point2<f64>, Error> {
        self.require()?.project(px, py)
    }

    /// Projects a batch against a single calibration snapshot, the first
    /// failing point fails the whole batch
    pub fn transform_points(&self, points: &[(f64, f64)]) -> Result<Vec<na::Point2<f64>>, Error> {
        let calibration = self.require()?;

        points
            .iter()
            .map(|&(px, py)| calibration.project(px, py))
            .collect()
    }

    /// Ground distance in meters between two pixels
    pub fn calculate_distance(&self, p1: (f64, f64), p2: (f64, f64)) -> Result<f64, Error> {
        let calibration = self.require()?;

        let a = calibration.project(p1.0, p1.1)?;
        let b = calibration.project(p2.0, p2.1)?;

        Ok(na::distance(&a, &b))
    }

    pub fn horizon_line(&self) -> Result<f64, Error> {
        Ok(self.require()?.horizon_row())
    }

    pub fn ground_to_pixel(&self, x: f64, y: f64) -> Result<(f64, f64), Error> {
        self.require()?.unproject(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn params(tilt_deg: f64, w: u32, h: u32) -> CalibrationParams {
        CalibrationParams {
            camera_height_m: 1.5,
            tilt_deg,
            pan_deg: 0.0,
            focal_length_mm: 26.0,
            sensor_width_mm: 36.0,
            image_width: w,
            image_height: h,
        }
    }

    #[test]
    fn test_uncalibrated() {
        let t = GroundPlaneTransformer::new();

        assert!(!t.is_calibrated());
        assert!(matches!(t.transform_point(10.0, 10.0), Err(Error::NotCalibrated)));
        assert!(matches!(t.horizon_line(), Err(Error::NotCalibrated)));
        assert!(matches!(
            t.calculate_distance((0.0, 0.0), (1.0, 1.0)),
            Err(Error::NotCalibrated)
        ));
        assert!(matches!(t.transform_points(&[]), Err(Error::NotCalibrated)));
    }

    #[test]
    fn test_horizon_at_center_for_level_camera() {
        let t = GroundPlaneTransformer::with_params(&params(0.0, 3072, 4096)).unwrap();
        assert_abs_diff_eq!(t.horizon_line().unwrap(), 2048.0, epsilon = 1e-9);
    }

    #[test]
    fn test_horizon_moves_up_when_tilting_down() {
        let t = GroundPlaneTransformer::with_params(&params(10.0, 1920, 1080)).unwrap();
        assert!(t.horizon_line().unwrap() < 540.0);

        t.calibrate(&params(-10.0, 1920, 1080)).unwrap();
        assert!(t.horizon_line().unwrap() > 540.0);
    }

    #[test]
    fn test_above_horizon_is_rejected() {
        let t = GroundPlaneTransformer::with_params(&params(0.0, 3072, 4096)).unwrap();

        for py in [0.0, 1000.0, 2047.0, 2048.0] {
            assert!(matches!(
                t.transform_point(1536.0, py),
                Err(Error::AboveHorizon { .. })
            ));
        }

        assert!(t.transform_point(1536.0, 2049.0).is_ok());
    }

    #[test]
    fn test_straight_down_center() {
        let mut p = params(90.0, 1000, 1000);
        p.focal_length_mm = 18.0;
        let t = GroundPlaneTransformer::with_params(&p).unwrap();

        // Ray straight down hits the ground right below the camera
        let pt = t.transform_point(500.0, 500.0).unwrap();
        assert_abs_diff_eq!(pt.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pt.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_known_geometry() {
        // tilt 45 deg: the image center ray hits the ground at d == height
        let t = GroundPlaneTransformer::with_params(&params(45.0, 1280, 960)).unwrap();
        let pt = t.transform_point(640.0, 480.0).unwrap();

        assert_abs_diff_eq!(pt.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pt.y, 1.5, epsilon = 1e-9);

        // points to the right of center have positive lateral offset
        let right = t.transform_point(900.0, 480.0).unwrap();
        assert!(right.x > 0.0);
        assert_abs_diff_eq!(right.y, 1.5, epsilon = 1e-9);
    }

    #[test]
    fn test_pan_shifts_lateral_offset() {
        let mut p = params(45.0, 1280, 960);
        p.pan_deg = 45.0;
        let t = GroundPlaneTransformer::with_params(&p).unwrap();

        let pt = t.transform_point(640.0, 480.0).unwrap();
        assert_abs_diff_eq!(pt.x, 1.5, epsilon = 1e-9);
    }

    #[test]
    fn test_distance_symmetry() {
        let t = GroundPlaneTransformer::with_params(&params(8.0, 1920, 1080)).unwrap();

        let p1 = (300.0, 900.0);
        let p2 = (1500.0, 700.0);
        let d12 = t.calculate_distance(p1, p2).unwrap();
        let d21 = t.calculate_distance(p2, p1).unwrap();

        assert!(d12 > 0.0);
        assert_abs_diff_eq!(d12, d21, epsilon = 1e-12);
        assert_abs_diff_eq!(t.calculate_distance(p1, p1).unwrap(), 0.0);
    }

    #[test]
    fn test_distance_fails_above_horizon() {
        let t = GroundPlaneTransformer::with_params(&params(0.0, 1920, 1080)).unwrap();
        assert!(matches!(
            t.calculate_distance((960.0, 900.0), (960.0, 100.0)),
            Err(Error::AboveHorizon { .. })
        ));
    }

    #[test]
    fn test_invalid_calibration_keeps_previous() {
        let t = GroundPlaneTransformer::with_params(&params(0.0, 3072, 4096)).unwrap();
        let before = t.snapshot().unwrap();

        let mut bad = params(30.0, 1280, 720);
        bad.camera_height_m = -1.0;

        assert!(matches!(
            t.calibrate(&bad),
            Err(Error::InvalidParameter { name: "camera_height_m", .. })
        ));

        assert_eq!(*t.snapshot().unwrap(), *before);
        assert_abs_diff_eq!(t.horizon_line().unwrap(), 2048.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_first_calibration_stays_uncalibrated() {
        let t = GroundPlaneTransformer::new();
        assert!(t.calibrate(&params(120.0, 1280, 720)).is_err());
        assert!(!t.is_calibrated());
    }

    #[test]
    fn test_batch_projection() {
        let t = GroundPlaneTransformer::with_params(&params(10.0, 1280, 720)).unwrap();
        let pts = t.transform_points(&[(640.0, 700.0), (100.0, 600.0)]).unwrap();

        assert_eq!(pts.len(), 2);
        assert_eq!(pts[0], t.transform_point(640.0, 700.0).unwrap());
        assert!(t.transform_points(&[(640.0, 700.0), (640.0, 0.0)]).is_err());
    }

    #[test]
    fn test_ground_to_pixel_inverts_projection() {
        let mut p = params(-6.0, 1280, 960);
        p.pan_deg = 3.0;
        let t = GroundPlaneTransformer::with_params(&p).unwrap();

        let ground = t.transform_point(400.0, 800.0).unwrap();
        let (px, py) = t.ground_to_pixel(ground.x, ground.y).unwrap();

        assert_abs_diff_eq!(px, 400.0, epsilon = 1e-6);
        assert_abs_diff_eq!(py, 800.0, epsilon = 1e-6);

        assert!(t.ground_to_pixel(0.0, 0.0).is_err());
    }
}
