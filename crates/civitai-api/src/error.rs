/// Errors raised while assembling a generation request.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ValidationError {
    /// A required field was empty.
    #[error("Required fields cannot be empty: {0}")]
    MissingField(&'static str),
    /// A numeric field was outside of its accepted range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: u32,
        max: u32,
        value: u32,
    },
    /// An additional network strength was outside of `0.0..=1.0`.
    #[error("Network strength must be between 0 and 1, got {0}")]
    InvalidStrength(f64),
}

/// Errors raised by a generation submission.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum GenerationError {
    /// The request failed validation and was never sent.
    #[error("Invalid generation request: {0}")]
    Validation(#[from] ValidationError),
    /// The remote call failed: transport, authentication or service error.
    #[error("Failed to generate image: {0:#}")]
    Request(anyhow::Error),
    /// The service answered, but the first job carried no image.
    #[error("Failed to retrieve the generated image")]
    MissingResult,
}
