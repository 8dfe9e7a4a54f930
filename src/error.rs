use thiserror::Error;

#[derive(Error, Debug)]
pub enum MazeError {
    /// No solvable layout was found within the retry bound. Callers should
    /// retry with relaxed parameters.
    #[error("maze generation failed after {attempts} attempt(s): {reason}")]
    GenerationFailure { attempts: u32, reason: String },

    #[error("failed to read level config {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid level config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MazeError>;
