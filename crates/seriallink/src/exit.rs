use std::fmt;
use std::io;

use seriallink_frame::FrameError;
use seriallink_link::LinkError;
use seriallink_transport::TransportError;

// Process exit codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
pub const INTERRUPTED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { source, .. }
        | TransportError::Configure { source, .. }
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::WriteTimeout => CliError::new(TIMEOUT, format!("{context}: {err}")),
        FrameError::InsufficientBytes { .. }
        | FrameError::InvalidHeader(_)
        | FrameError::LineTooLong { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::Transport(err) => transport_error(context, err),
        LinkError::Frame(err) => frame_error(context, err),
        LinkError::ConnectTimeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        LinkError::Cancelled(_) => CliError::new(INTERRUPTED, format!("{context}: {err}")),
        LinkError::InvalidPattern(_) => CliError::new(USAGE, format!("{context}: {err}")),
        LinkError::NotConnected(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        LinkError::Spawn(source) => io_error(context, source),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_port_is_a_transport_error() {
        let err = link_error(
            "connect failed",
            LinkError::Transport(TransportError::Open {
                port: "/dev/ttyNOPE".to_string(),
                source: io::Error::from(io::ErrorKind::NotFound),
            }),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.starts_with("connect failed: "));
    }

    #[test]
    fn timeouts_map_to_124() {
        let connect = link_error(
            "connect failed",
            LinkError::ConnectTimeout {
                port: "COM3".to_string(),
                attempts: 4,
            },
        );
        assert_eq!(connect.code, TIMEOUT);

        let write = link_error("send failed", LinkError::Frame(FrameError::WriteTimeout));
        assert_eq!(write.code, TIMEOUT);
    }

    #[test]
    fn reader_not_started_is_internal() {
        let err = link_error("wait failed", LinkError::ReaderNotStarted("COM3".to_string()));
        assert_eq!(err.code, INTERNAL);
    }
}
