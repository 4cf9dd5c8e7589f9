/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A primitive decoder ran out of payload bytes.
    #[error("insufficient bytes: need {needed}, have {available}")]
    InsufficientBytes { needed: usize, available: usize },

    /// The packet header (the ID before the separator) could not be decoded.
    #[error("invalid packet header: {0}")]
    InvalidHeader(String),

    /// A line exceeded the configured maximum length and was discarded.
    #[error("line too long ({size} bytes, max {max})")]
    LineTooLong { size: usize, max: usize },

    /// A write did not complete within the port's write timeout.
    #[error("write timed out")]
    WriteTimeout,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream reached end of file.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
