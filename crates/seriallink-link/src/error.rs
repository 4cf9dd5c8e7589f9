/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] seriallink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] seriallink_frame::FrameError),

    /// The operation needs an open port.
    #[error("link to {0} is not connected")]
    NotConnected(String),

    /// The port did not open within `LinkConfig::connect_timeout`.
    #[error("could not open {port} after {attempts} attempts")]
    ConnectTimeout { port: String, attempts: u64 },

    /// A connect retry loop was interrupted by a concurrent disconnect.
    #[error("connect to {0} cancelled")]
    Cancelled(String),

    /// A blocking read would never complete because nothing fills the buffers.
    #[error("reader not started on {0}; call start_reading first")]
    ReaderNotStarted(String),

    /// A buffer is at capacity; the newest item was dropped.
    #[error("{queue} buffer full ({capacity} entries)")]
    BufferFull {
        queue: &'static str,
        capacity: usize,
    },

    /// A string match pattern failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The background reader thread could not be spawned.
    #[error("failed to spawn reader thread: {0}")]
    Spawn(std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
