use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid parameter `{name}`: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Transformer is not calibrated")]
    NotCalibrated,

    #[error("Point ({px}, {py}) corresponds to a ray above the horizon")]
    AboveHorizon { px: f64, py: f64 },

    #[error("Config Error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pipeline worker disconnected")]
    WorkerDisconnected,
}
