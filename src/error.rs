//! Error types for airsync-client
//!
//! One crate-wide error enum; each variant carries the server/transport
//! detail for logs, while [`Error::user_message`] derives the user-visible
//! text from the [`ErrorKind`] alone. The sync engine is the only component
//! that decides retry vs. surface vs. escalate, and it does so by matching
//! on [`Error::kind`].

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Malformed server response. Aborts the current operation, never
    /// retried blindly.
    #[error("protocol decode error: {0}")]
    ProtocolDecode(String),

    /// Network-level failure (timeout, DNS, connect). Retryable with
    /// bounded backoff at the engine level.
    #[error("transport error: {0}")]
    Transport(String),

    /// TLS handshake or certificate validation failure.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Credentials rejected by the server (HTTP 401/403). Never retried
    /// automatically.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// HTTP 449: the server requires a device-policy handshake before it
    /// will serve this request.
    #[error("device provisioning required: {0}")]
    PolicyRequired(String),

    /// The server rejected the presented sync key. Triggers exactly one
    /// full-resync restart per top-level sync call.
    #[error("sync key rejected by server: {0}")]
    CursorInvalid(String),

    /// The referenced item or attachment no longer exists on the server.
    #[error("object not found on server: {0}")]
    ObjectNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Local mirror rejected a read or commit.
    #[error("store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Discriminant of [`Error`], exposed so callers can branch on the error
/// class without matching the full enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    ProtocolDecode,
    Transport,
    Tls,
    Auth,
    PolicyRequired,
    CursorInvalid,
    ObjectNotFound,
    Config,
    Store,
    Io,
}

impl Error {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ProtocolDecode(_) => ErrorKind::ProtocolDecode,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Tls(_) => ErrorKind::Tls,
            Self::Auth(_) => ErrorKind::Auth,
            Self::PolicyRequired(_) => ErrorKind::PolicyRequired,
            Self::CursorInvalid(_) => ErrorKind::CursorInvalid,
            Self::ObjectNotFound(_) => ErrorKind::ObjectNotFound,
            Self::Config(_) => ErrorKind::Config,
            Self::Store(_) => ErrorKind::Store,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether the engine may retry the operation that produced this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Io(_))
    }

    /// User-facing message derived from the error kind.
    ///
    /// Raw protocol detail stays in the `Display` impl for logs; this is
    /// what the application layer shows.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::ProtocolDecode => "The server sent a response that could not be understood.",
            ErrorKind::Transport | ErrorKind::Io => {
                "The server could not be reached. Check your connection and try again."
            }
            ErrorKind::Tls => "A secure connection to the server could not be established.",
            ErrorKind::Auth => "The server rejected your credentials.",
            ErrorKind::PolicyRequired => "The server requires device provisioning.",
            ErrorKind::CursorInvalid => "Synchronization state was reset by the server.",
            ErrorKind::ObjectNotFound => "This item no longer exists on the server.",
            ErrorKind::Config => "The account is not configured correctly.",
            ErrorKind::Store => "The local mail store reported an error.",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
