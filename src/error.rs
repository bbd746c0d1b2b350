use thiserror::Error;

#[derive(Error, Debug)]
pub enum LingoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// The input could not be turned into any subtitle record. Fatal for the run.
    #[error("Subtitle parse error: {0}")]
    Parse(String),

    /// The completion service was unreachable, rate limited or returned no text.
    #[error("Completion transport error: {0}")]
    Transport(String),

    /// The completion service answered with something too short to be a translation.
    #[error("Degenerate completion response: {0}")]
    DegenerateResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type Result<T> = std::result::Result<T, LingoError>;
