use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// A text field could not be parsed as a number
    #[error("invalid {field}: {value:?}")]
    InvalidInput { field: &'static str, value: String },

    #[error("invalid loop window [{start}, {end}] for a {total}s resource")]
    InvalidWindow { start: f64, end: f64, total: f64 },

    #[error("loop count must be at least 1, got {0}")]
    InvalidLoopCount(i64),

    #[error("unsupported playback speed {0}")]
    UnsupportedSpeed(f64),

    #[error("no audio loaded")]
    NoResource,

    /// Marked position would invert the window
    #[error("cannot mark {bound} at {position:.2}s")]
    MarkRejected { bound: &'static str, position: f64 },

    #[error("failed to load audio: {0}")]
    ResourceLoad(String),

    #[error("player error: {0}")]
    Player(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
