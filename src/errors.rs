//! Provides the error type used throughout this crate.

use thiserror::Error;

/// The error type used throughout this crate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PostureError {
    #[error("Link not known to the body model: {0}")]
    UnknownLink(String),
    #[error("Joint not known to the body model: {0}")]
    UnknownJoint(String),
    #[error("Joint group not known to the body model: {0}")]
    UnknownGroup(String),
    #[error("Name not unique: {0}")]
    DuplicateName(String),
    #[error("Wrong array dimensions: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Invalid bounds for joint {joint}: [{lower}, {upper}]")]
    InvalidBounds { joint: String, lower: f64, upper: f64 },
    #[error("Rotation axis of joint {0} has zero length")]
    InvalidAxis(String),
    #[error("Invalid minimizer options: {0}")]
    InvalidOptions(String),
    #[error("Minimization failed: {0}")]
    Minimizer(String),
}

pub type Result<T> = std::result::Result<T, PostureError>;
