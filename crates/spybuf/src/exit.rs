use std::fmt;
use std::io;

use spybuf_acquire::AcquireError;
use spybuf_frame::FrameError;
use spybuf_link::LinkError;
use spybuf_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const SERVER_FAILURE: i32 = 70;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
pub const CANCELLED: i32 = 130;

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
        io::ErrorKind::ConnectionRefused => FAILURE,
        io::ErrorKind::InvalidData => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    if err.is_timeout() {
        return CliError::new(TIMEOUT, format!("{context}: {err}"));
    }
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } | FrameError::InvalidMagic | FrameError::UnknownKind(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::InvalidEndpoint { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        LinkError::Connect { source, .. } | LinkError::Transport(source) => {
            transport_error(context, source)
        }
        LinkError::HandshakeFailed(_) | LinkError::Json(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        LinkError::Send(source) | LinkError::Frame(source) => frame_error(context, source),
        LinkError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        LinkError::Closed(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        LinkError::Io(source) => io_error(context, source),
    }
}

pub fn acquire_error(context: &str, err: AcquireError) -> CliError {
    match err {
        AcquireError::InvalidRequest(_) => CliError::new(USAGE, format!("{context}: {err}")),
        AcquireError::Send(source) | AcquireError::Receive(source) => link_error(context, source),
        AcquireError::Decode(_)
        | AcquireError::UnexpectedMessageType { .. }
        | AcquireError::SizeMismatch { .. }
        | AcquireError::Reshape(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        AcquireError::ServerReportedFailure { .. } => {
            CliError::new(SERVER_FAILURE, format!("{context}: {err}"))
        }
        AcquireError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        AcquireError::Cancelled => CliError::new(CANCELLED, format!("{context}: {err}")),
        AcquireError::Sink { channel, source } => {
            io_error(&format!("{context}: channel {channel} sink"), source)
        }
    }
}
