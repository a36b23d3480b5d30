use thiserror::Error;
use crate::providers::ProviderError;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Configuration error: {0}")]
    Config(#[from] toml_edit::de::Error),

    #[error("Panel state error: {0}")]
    State(#[from] serde_json::Error),
}

pub type AppResult<T> = Result<T, AppError>;

/// Outcome code delivered to navigation callbacks.
///
/// `OK` is success, `CANCELLED` means the request was superseded or the
/// panel went away before it completed, anything else is a provider error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResultCode(pub i32);

impl ResultCode {
    pub const OK: ResultCode = ResultCode(0);
    pub const CANCELLED: ResultCode = ResultCode(-9);
    pub const GENERIC: ResultCode = ResultCode(-1);
    pub const NOT_FOUND: ResultCode = ResultCode(-2);
    pub const PERMISSION_DENIED: ResultCode = ResultCode(-13);
    pub const NOT_A_DIRECTORY: ResultCode = ResultCode(-20);
    pub const CONNECTION: ResultCode = ResultCode(-111);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    pub fn is_cancelled(self) -> bool {
        self == Self::CANCELLED
    }

    /// Failed for a reason other than cancellation
    pub fn is_error(self) -> bool {
        !self.is_ok() && !self.is_cancelled()
    }
}

impl Default for ResultCode {
    fn default() -> Self {
        Self::OK
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::OK => write!(f, "ok"),
            Self::CANCELLED => write!(f, "cancelled"),
            Self::NOT_FOUND => write!(f, "not found ({})", self.0),
            Self::PERMISSION_DENIED => write!(f, "permission denied ({})", self.0),
            Self::NOT_A_DIRECTORY => write!(f, "not a directory ({})", self.0),
            Self::CONNECTION => write!(f, "connection error ({})", self.0),
            other => write!(f, "error {}", other.0),
        }
    }
}
