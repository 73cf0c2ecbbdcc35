use serde_derive::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::calibration::{IntrinsicDefaults, TiltGate};
use crate::error::Error;
use crate::history::HistoryConfig;
use crate::tracker::TrackerConfig;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub history: HistoryConfig,
    pub intrinsics: IntrinsicDefaults,
    pub tilt_gate: TiltGate,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml_str(
            r#"
tracker:
  iou_threshold: 0.4
  max_misses: 8
history:
  ttl_ms: 3000
intrinsics:
  focal_length_mm: 24.0
"#,
        )
        .unwrap();

        assert_eq!(config.tracker.iou_threshold, 0.4);
        assert_eq!(config.tracker.max_misses, 8);
        assert_eq!(config.tracker.smoothing, 0.6);
        assert_eq!(config.history.ttl_ms, 3000);
        assert_eq!(config.history.speed_window, 10);
        assert_eq!(config.intrinsics.focal_length_mm, 24.0);
        assert_eq!(config.intrinsics.sensor_width_mm, 36.0);
        assert_eq!(config.tilt_gate, TiltGate::default());
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(Config::from_yaml_str("{}").unwrap(), Config::default());
    }

    #[test]
    fn test_bad_yaml_is_config_error() {
        let err = Config::from_yaml_str("tracker: [1, 2").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/groundspeed.yaml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
