use thiserror::Error;

use crate::pipeline::types::StageKind;

#[derive(Error, Debug)]
pub enum DriftscanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Dimension mismatch: master is {}x{}, slave is {}x{}", .master.1, .master.0, .slave.1, .slave.0)]
    DimensionMismatch {
        master: (usize, usize),
        slave: (usize, usize),
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Insufficient coverage: {0}")]
    Coverage(String),

    #[error("Correlation failed: valid-node fraction {valid_fraction:.2} < minimum {minimum:.2}")]
    Correlation { valid_fraction: f64, minimum: f64 },

    #[error("Stage {stage} failed: {source}")]
    Stage {
        stage: StageKind,
        #[source]
        source: Box<DriftscanError>,
    },

    #[error("Invalid product file: {0}")]
    InvalidProduct(String),

    #[error("Image format error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, DriftscanError>;
