use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The generator or request is not configured well enough to be sent,
    /// e.g. missing prompter, missing model or no prompts at all.
    Configuration,
    /// Connection failure or a non-successful response status.
    Transport,
    /// The backend answered with something that can't be understood.
    Protocol,
    /// The request was cancelled by the caller.
    Cancelled,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The prompter doesn't support the requested operation.
    Unsupported,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "configuration error",
            ErrorKind::Transport => "transport error",
            ErrorKind::Protocol => "protocol error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::RateLimitExceeded => "rate limit exceeded",
            ErrorKind::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// Error returned by prompters and generators.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    /// Creates a new error with the given kind and message.
    #[inline]
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a new error with the `Configuration` kind.
    #[inline]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Creates a new error with the `Transport` kind.
    #[inline]
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Creates a new error with the `Protocol` kind.
    #[inline]
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    /// Creates a new error with the `Cancelled` kind.
    #[inline]
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "request cancelled")
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for Error {}
