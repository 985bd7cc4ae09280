//! Typed error taxonomy. Library modules return these; the CLI binary wraps
//! them in `anyhow` for top-level reporting.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum GribError {
    #[error("could not parse grib slice: {0}")]
    Parse(String),
    #[error("zone is missing field '{field}' at time step {step}")]
    Uncomplete { field: &'static str, step: usize },
    #[error("requested time {requested} is out of the zone's covered range [{first}, {last}]")]
    OutOfTime { requested: f64, first: f64, last: f64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PolarError {
    #[error("could not parse polar file: {0}")]
    Parse(String),
    #[error("polar matrix has no rows")]
    Empty,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum NavMaskError {
    #[error("sea raster has unexpected length {got}, expected {expected}")]
    BadLength { got: usize, expected: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("isochrone point arena exhausted at capacity {capacity}")]
    PointArena { capacity: usize },
    #[error("isochrone descriptor store exhausted at capacity {capacity}")]
    IsoDescStore { capacity: usize },
}

#[derive(Debug, Error)]
pub enum AllocError {
    #[error("failed to grow {what} from {from} to {to} elements")]
    Grow { what: &'static str, from: usize, to: usize },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Grib(#[from] GribError),
    #[error(transparent)]
    Polar(#[from] PolarError),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error(transparent)]
    Alloc(#[from] AllocError),
    #[error("start point is not navigable")]
    StartNotNavigable,
    #[error("destination point is not navigable")]
    DestinationNotNavigable,
}
