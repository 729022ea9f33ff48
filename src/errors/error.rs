use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Boxed error detail carried as an error source.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    LiftApi,
    Queue,
    Mapping,
    Logger,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Config => write!(f, "config"),
            ErrorKind::LiftApi => write!(f, "lift api"),
            ErrorKind::Queue => write!(f, "queue"),
            ErrorKind::Mapping => write!(f, "mapping"),
            ErrorKind::Logger => write!(f, "logger"),
        }
    }
}

pub struct ErrorInner {
    pub kind: ErrorKind,
    pub source: Option<BoxError>,
    pub message: Option<String>,
}

pub struct Error {
    pub inner: Box<ErrorInner>,
}

impl Error {
    pub fn new<E>(kind: ErrorKind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(ErrorInner {
                kind,
                source: source.map(Into::into),
                message: None,
            }),
        }
    }

    pub fn with_message<E>(kind: ErrorKind, message: impl Into<String>, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(ErrorInner {
                kind,
                source: source.map(Into::into),
                message: Some(message.into()),
            }),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn is_config(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Config)
    }

    pub fn is_lift_api(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::LiftApi)
    }

    pub fn is_queue(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Queue)
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Mapping)
    }

    pub fn is_logger(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Logger)
    }

    pub fn is_timeout(&self) -> bool {
        if let Some(source) = &self.inner.source {
            source.to_string().to_lowercase().contains("timeout")
        } else {
            false
        }
    }

    pub fn is_connect(&self) -> bool {
        if let Some(source) = &self.inner.source {
            let msg = source.to_string().to_lowercase();
            msg.contains("connect") || msg.contains("connection")
        } else {
            false
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_struct("liftgate::Error");
        f.field("kind", &self.inner.kind);
        if let Some(ref message) = self.inner.message {
            f.field("message", message);
        }
        if let Some(ref source) = self.inner.source {
            f.field("source", source);
        }
        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref message) = self.inner.message {
            write!(f, "{} error: {}", self.inner.kind, message)?;
        } else {
            write!(f, "{} error", self.inner.kind)?;
        }

        if let Some(ref source) = self.inner.source {
            write!(f, ": {source}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|e| &**e as &(dyn StdError + 'static))
    }
}

impl From<LiftApiError> for Error {
    fn from(err: LiftApiError) -> Self {
        Error::new(ErrorKind::LiftApi, Some(err))
    }
}

impl From<QueueError> for Error {
    fn from(err: QueueError) -> Self {
        Error::new(ErrorKind::Queue, Some(err))
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::new(ErrorKind::Config, Some(err))
    }
}

impl From<MappingError> for Error {
    fn from(err: MappingError) -> Self {
        Error::new(ErrorKind::Mapping, Some(err))
    }
}

/// Failures reported by the upstream lift-control API.
#[derive(Debug, Error)]
pub enum LiftApiError {
    #[error("transport failure: {0}")]
    Transport(#[source] BoxError),
    #[error("call rejected: {0}")]
    Rejected(String),
    #[error("connection closed before the call was served")]
    ConnectionClosed,
    #[error("unauthorized")]
    Unauthorized,
    #[error("timeout")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("dispatch queue is closed")]
    Closed,
    #[error("dispatch queue is shutting down")]
    ShuttingDown,
    #[error("dispatch queue is full")]
    Full,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[source] BoxError),
    #[error("failed to parse config: {0}")]
    Parse(#[source] BoxError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("invalid stream id: {0}")]
    InvalidStreamId(String),
    #[error("no mapping for stream {0}")]
    UnmappedStream(String),
}

impl Error {
    pub fn lift_timeout() -> Self {
        Error::from(LiftApiError::Timeout)
    }

    pub fn lift_transport<E: Into<BoxError>>(source: E) -> Self {
        Error::from(LiftApiError::Transport(source.into()))
    }

    pub fn lift_rejected(message: impl Into<String>) -> Self {
        Error::from(LiftApiError::Rejected(message.into()))
    }

    pub fn queue_closed() -> Self {
        Error::from(QueueError::Closed)
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::from(ConfigError::Invalid(message.into()))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => Error::lift_timeout(),
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                Error::from(ConfigError::Read(Box::new(err)))
            }
            _ => Error::lift_transport(err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::from(LiftApiError::Rejected(format!("malformed payload: {err}")))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::from(ConfigError::Parse(Box::new(err)))
    }
}
