use crate::media::DepthSourceError;
use depthcast_core::UnknownColormap;
use thiserror::Error;

/// Why a well-formed control command could not be applied.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    UnknownColormap(#[from] UnknownColormap),

    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: i64 },

    #[error("sensor rejected the request: {0}")]
    Sensor(#[from] DepthSourceError),
}
