//! Closed error-kind set returned from public core operations.

/// Errors surfaced by the playback core's public API.
///
/// This is a closed set: callers may match exhaustively. `DecoderError` and
/// `IoError` carry a free-form detail string rather than wrapping the
/// underlying library error type, so the core's public surface never leaks a
/// particular decode backend's error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("queue is empty")]
    EmptyQueue,
    #[error("queue has no current track")]
    NoCurrentTrack,
    #[error("index out of range")]
    InvalidIndex,
    #[error("unsupported audio format")]
    UnsupportedFormat,
    #[error("invalid container")]
    InvalidContainer,
    #[error("unknown codec")]
    UnknownCodec,
    #[error("truncated header")]
    TruncatedHeader,
    #[error("decoder error: {0}")]
    DecoderError(String),
    #[error("io error: {0}")]
    IoError(String),
    #[error("service is closed")]
    Closed,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A de-duplicated, stable rendering of an `Error` for `ErrorEvent::err`.
impl Error {
    pub fn detail(&self) -> String {
        self.to_string()
    }
}

impl From<&Error> for String {
    fn from(err: &Error) -> Self {
        err.to_string()
    }
}
