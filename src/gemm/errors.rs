use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Errors with matrix multiplication configuration or inputs.
#[derive(Clone, Debug, PartialEq)]
pub enum GemmError {
    /// A buffer provided for an input matrix is too short.
    InputNotLargeEnough,
    /// The buffer provided for the output is too short.
    OutputNotLargeEnough,
    /// The requested vector register width is not supported by the unit.
    UnsupportedVectorLength,
    /// The requested micro-kernel height is not one of the supported values.
    UnsupportedHeight,
    /// The micro-kernel height exceeds the matrix size. This only applies to
    /// the reordering strategy, whose main grid is keyed to the vector width
    /// and has no sub-height fallback.
    HeightExceedsSize,
    /// A cache block size is zero.
    InvalidBlockSize,
}

impl Display for GemmError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InputNotLargeEnough => write!(fmt, "input buffer is too small"),
            Self::OutputNotLargeEnough => write!(fmt, "output buffer is too small"),
            Self::UnsupportedVectorLength => {
                write!(fmt, "vector register width is not supported")
            }
            Self::UnsupportedHeight => write!(fmt, "unsupported micro-kernel height"),
            Self::HeightExceedsSize => {
                write!(fmt, "micro-kernel height exceeds the matrix size")
            }
            Self::InvalidBlockSize => write!(fmt, "cache block sizes must be non-zero"),
        }
    }
}

impl Error for GemmError {}
