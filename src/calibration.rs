use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

pub const MIN_TILT_DEG: f64 = -45.0;
pub const MAX_TILT_DEG: f64 = 90.0;

/// Full-frame sensor width, used whenever the focal length is a 35mm equivalent
pub const FULL_FRAME_SENSOR_WIDTH_MM: f64 = 36.0;

/// Fallbacks for camera intrinsics the device could not report
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct IntrinsicDefaults {
    pub focal_length_mm: f64,
    pub sensor_width_mm: f64,
    pub tilt_deg: f64,
    pub pan_deg: f64,
}

impl Default for IntrinsicDefaults {
    fn default() -> Self {
        Self {
            focal_length_mm: 26.0,
            sensor_width_mm: FULL_FRAME_SENSOR_WIDTH_MM,
            tilt_deg: 0.0,
            pan_deg: 0.0,
        }
    }
}

/// Calibration input as it arrives from sensor fusion and the camera,
/// where every intrinsic may be missing
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRequest {
    pub camera_height_m: f64,
    pub tilt_deg: Option<f64>,
    pub pan_deg: Option<f64>,
    pub focal_length_mm: Option<f64>,
    pub sensor_width_mm: Option<f64>,
    pub image_width: u32,
    pub image_height: u32,
}

impl CalibrationRequest {
    pub fn new(camera_height_m: f64, image_width: u32, image_height: u32) -> Self {
        Self {
            camera_height_m,
            tilt_deg: None,
            pan_deg: None,
            focal_length_mm: None,
            sensor_width_mm: None,
            image_width,
            image_height,
        }
    }

    pub fn resolve(&self, defaults: &IntrinsicDefaults) -> CalibrationParams {
        CalibrationParams {
            camera_height_m: self.camera_height_m,
            tilt_deg: self.tilt_deg.unwrap_or(defaults.tilt_deg),
            pan_deg: self.pan_deg.unwrap_or(defaults.pan_deg),
            focal_length_mm: self.focal_length_mm.unwrap_or(defaults.focal_length_mm),
            sensor_width_mm: self.sensor_width_mm.unwrap_or(defaults.sensor_width_mm),
            image_width: self.image_width,
            image_height: self.image_height,
        }
    }
}

/// Fully resolved calibration input.
///
/// Tilt is in degrees, positive looks down (`90` is straight down), negative
/// looks up. Pan is in degrees, positive looks right.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CalibrationParams {
    pub camera_height_m: f64,
    pub tilt_deg: f64,
    pub pan_deg: f64,
    pub focal_length_mm: f64,
    pub sensor_width_mm: f64,
    pub image_width: u32,
    pub image_height: u32,
}

impl CalibrationParams {
    /// Uses the 35mm equivalent focal length when the EXIF block has one
    pub fn from_exif(
        camera_height_m: f64,
        tilt_deg: f64,
        focal_length_mm: f64,
        focal_length_35mm: Option<f64>,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        Self {
            camera_height_m,
            tilt_deg,
            pan_deg: 0.0,
            focal_length_mm: focal_length_35mm.unwrap_or(focal_length_mm),
            sensor_width_mm: FULL_FRAME_SENSOR_WIDTH_MM,
            image_width,
            image_height,
        }
    }

    /// Handheld phone at chest height, slightly tilted down
    pub fn smartphone(image_width: u32, image_height: u32) -> Self {
        Self {
            camera_height_m: 1.5,
            tilt_deg: 10.0,
            pan_deg: 0.0,
            focal_length_mm: 26.0,
            sensor_width_mm: FULL_FRAME_SENSOR_WIDTH_MM,
            image_width,
            image_height,
        }
    }

    /// Windshield-mounted camera
    pub fn dashcam(image_width: u32, image_height: u32) -> Self {
        Self {
            camera_height_m: 1.2,
            tilt_deg: 5.0,
            pan_deg: 0.0,
            focal_length_mm: 28.0,
            sensor_width_mm: FULL_FRAME_SENSOR_WIDTH_MM,
            image_width,
            image_height,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        fn check(ok: bool, name: &'static str, value: f64) -> Result<(), Error> {
            if ok {
                Ok(())
            } else {
                Err(Error::InvalidParameter { name, value })
            }
        }

        // Written so that NaN fails every check
        check(
            self.camera_height_m.is_finite() && self.camera_height_m > 0.0,
            "camera_height_m",
            self.camera_height_m,
        )?;
        check(
            self.tilt_deg >= MIN_TILT_DEG && self.tilt_deg <= MAX_TILT_DEG,
            "tilt_deg",
            self.tilt_deg,
        )?;
        check(
            self.focal_length_mm.is_finite() && self.focal_length_mm > 0.0,
            "focal_length_mm",
            self.focal_length_mm,
        )?;
        check(
            self.sensor_width_mm.is_finite() && self.sensor_width_mm > 0.0,
            "sensor_width_mm",
            self.sensor_width_mm,
        )?;
        check(self.pan_deg.is_finite(), "pan_deg", self.pan_deg)?;
        check(
            self.image_width > 0,
            "image_width",
            f64::from(self.image_width),
        )?;
        check(
            self.image_height > 0,
            "image_height",
            f64::from(self.image_height),
        )?;

        Ok(())
    }
}

/// Validated calibration with every derived quantity computed up front.
///
/// Never mutated after construction, which is what lets the transformer
/// publish it as a single atomic snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub camera_height_m: f64,
    pub tilt_rad: f64,
    pub pan_rad: f64,
    pub focal_length_mm: f64,
    pub sensor_width_mm: f64,
    pub sensor_height_mm: f64,
    pub fov_horizontal: f64,
    pub fov_vertical: f64,
    pub image_width: u32,
    pub image_height: u32,
}

impl Calibration {
    pub fn new(params: &CalibrationParams) -> Result<Self, Error> {
        params.validate()?;

        let w = f64::from(params.image_width);
        let h = f64::from(params.image_height);
        let f = params.focal_length_mm;

        let sensor_height_mm = params.sensor_width_mm * (h / w);

        Ok(Self {
            camera_height_m: params.camera_height_m,
            tilt_rad: params.tilt_deg.to_radians(),
            pan_rad: params.pan_deg.to_radians(),
            focal_length_mm: f,
            sensor_width_mm: params.sensor_width_mm,
            sensor_height_mm,
            fov_horizontal: 2.0 * (params.sensor_width_mm / (2.0 * f)).atan(),
            fov_vertical: 2.0 * (sensor_height_mm / (2.0 * f)).atan(),
            image_width: params.image_width,
            image_height: params.image_height,
        })
    }

    #[inline]
    pub fn half_width(&self) -> f64 {
        f64::from(self.image_width) / 2.0
    }

    #[inline]
    pub fn half_height(&self) -> f64 {
        f64::from(self.image_height) / 2.0
    }
}

/// Filters tilt sensor readings down to the ones worth a re-calibration:
/// the first one, then any that moved by at least `threshold_deg` once
/// `debounce_ms` passed since the last accepted reading.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TiltGate {
    pub threshold_deg: f64,
    pub debounce_ms: u64,
    #[serde(skip)]
    last: Option<(f64, u64)>,
}

impl Default for TiltGate {
    fn default() -> Self {
        Self {
            threshold_deg: 1.0,
            debounce_ms: 500,
            last: None,
        }
    }
}

impl TiltGate {
    pub fn new(threshold_deg: f64, debounce_ms: u64) -> Self {
        Self {
            threshold_deg,
            debounce_ms,
            last: None,
        }
    }

    /// Whether the reading would pass, without recording it
    pub fn check(&self, tilt_deg: f64, now_ms: u64) -> bool {
        if !tilt_deg.is_finite() {
            return false;
        }

        match self.last {
            None => true,
            Some((last_tilt, last_ts)) => {
                (tilt_deg - last_tilt).abs() >= self.threshold_deg
                    && now_ms.saturating_sub(last_ts) >= self.debounce_ms
            }
        }
    }

    /// Records the reading as the last accepted one
    #[inline]
    pub fn commit(&mut self, tilt_deg: f64, now_ms: u64) {
        self.last = Some((tilt_deg, now_ms));
    }

    pub fn accept(&mut self, tilt_deg: f64, now_ms: u64) -> bool {
        let accepted = self.check(tilt_deg, now_ms);

        if accepted {
            self.commit(tilt_deg, now_ms);
        }

        accepted
    }

    #[inline]
    pub fn last_tilt(&self) -> Option<f64> {
        self.last.map(|(tilt, _)| tilt)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
