use std::fmt::{self, Display};

/// The kind of error that occurred while talking to a model provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The inference server could not be reached at all.
    Unreachable,
    /// The server accepted the request but didn't answer in time.
    Timeout,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The content is moderated.
    Moderated,
    /// Any other errors.
    Other,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Unreachable => write!(f, "server unreachable"),
            ErrorKind::Timeout => write!(f, "request timed out"),
            ErrorKind::RateLimitExceeded => write!(f, "rate limit exceeded"),
            ErrorKind::Moderated => write!(f, "content moderated"),
            ErrorKind::Other => write!(f, "model error"),
        }
    }
}
