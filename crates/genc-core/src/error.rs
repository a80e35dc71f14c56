use thiserror::Error;

pub type GencResult<T> = Result<T, GencError>;

#[derive(Debug, Error)]
pub enum GencError {
    /// Clone/pull/push of the encrypted staging repo failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A ciphertext failed its integrity check (wrong key, truncation, tampering).
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The encrypted store itself is malformed (bad filenames, bad layout).
    #[error("corrupt encrypted store: {0}")]
    CorruptStore(String),

    /// The local object database handed back something we cannot encode.
    #[error("unsupported object format for {id}: {detail}")]
    UnsupportedObjectFormat { id: String, detail: String },

    #[error("ref not found in encrypted store: {0}")]
    MissingRef(String),

    #[error("object not found: {0}")]
    MissingObject(String),

    #[error("invalid object: {0}")]
    InvalidObject(String),

    #[error("key error: {0}")]
    Keys(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[source] Box<opendal::Error>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GencError {
    /// Errors that must never be downgraded or suppressed by a caller.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GencError::Authentication(_)
                | GencError::CorruptStore(_)
                | GencError::UnsupportedObjectFormat { .. }
        )
    }

    /// Only transport failures may be suppressed via `throw_on_error = false`.
    pub fn is_transport(&self) -> bool {
        matches!(self, GencError::Transport(_))
    }
}

impl From<opendal::Error> for GencError {
    fn from(value: opendal::Error) -> Self {
        GencError::Storage(Box::new(value))
    }
}
