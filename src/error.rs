use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    InvalidResolution { resolution: u32 },
    Allocation { bytes: usize },
    Cancelled,
    Config { reason: String },
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceError::InvalidResolution { resolution } => {
                write!(f, "invalid surface resolution: {}", resolution)
            }
            SurfaceError::Allocation { bytes } => {
                write!(f, "failed to allocate {} bytes for surface raster", bytes)
            }
            SurfaceError::Cancelled => write!(f, "surface job cancelled"),
            SurfaceError::Config { reason } => write!(f, "invalid generator config: {}", reason),
        }
    }
}

impl std::error::Error for SurfaceError {}

impl From<toml::de::Error> for SurfaceError {
    fn from(err: toml::de::Error) -> Self {
        SurfaceError::Config {
            reason: err.to_string(),
        }
    }
}
