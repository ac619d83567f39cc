use thiserror::Error;

/// A single render attempt failed. Recoverable at the scene level: callers
/// re-randomise and retry a bounded number of times, then fall back to a
/// worst-possible fitness so selection discards the individual.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The external rendering device/context was never initialised.
    #[error("render context was never initialised")]
    ContextUninitialised,

    /// Rendering started but did not reach a completed state.
    #[error("render did not complete: {0}")]
    Failed(String),
}

/// Top-level error type for the evolution engine.
#[derive(Debug, Error)]
pub enum EvolveError {
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("failed to parse settings: {0}")]
    Settings(#[from] serde_yaml::Error),

    /// An offspring exceeded the structural element limit and resampling the
    /// operator did not produce a valid one within the retry cap. Never
    /// surfaced to the scheduler: breeding operators recover by keeping the
    /// last valid genome.
    #[error("offspring exceeded the structural limit after {retries} resampling attempts")]
    StructuralConstraintViolated { retries: u32 },

    #[error("toolkit error: {0}")]
    Toolkit(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
