use std::path::PathBuf;

/// All errors produced by gitcherry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid range: {0}")]
    InvalidRangeSpec(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Uncommitted changes detected. Please commit or stash before proceeding.")]
    DirtyWorktree,

    /// The apply step stopped with a nonzero exit. The working tree is left
    /// mid-operation for the user to resolve or abort.
    #[error("{command} failed: {stderr}. {hint}")]
    ConflictHalted {
        command: String,
        stderr: String,
        hint: String,
    },

    #[error("{command} failed: {detail}")]
    Fatal { command: String, detail: String },

    #[error("storage locked: {0}")]
    StorageLocked(String),

    #[error("storage corrupt: {0}")]
    StorageCorrupt(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("git error: {0}")]
    Git(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

impl Error {
    pub fn invalid_range(msg: impl Into<String>) -> Self {
        Self::InvalidRangeSpec(msg.into())
    }

    pub fn invalid_ref_name(name: impl Into<String>) -> Self {
        Self::InvalidRefName(name.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn conflict(
        command: impl Into<String>,
        stderr: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self::ConflictHalted {
            command: command.into(),
            stderr: stderr.into(),
            hint: hint.into(),
        }
    }

    pub fn fatal(command: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Fatal {
            command: command.into(),
            detail: detail.into(),
        }
    }

    pub fn storage_locked(msg: impl Into<String>) -> Self {
        Self::StorageLocked(msg.into())
    }

    pub fn storage_corrupt(msg: impl Into<String>) -> Self {
        Self::StorageCorrupt(msg.into())
    }

    pub fn git(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Git(Box::new(err))
    }

    pub fn git_msg(msg: impl Into<String>) -> Self {
        Self::Git(msg.into().into())
    }

    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io(std::io::Error::new(
            err.kind(),
            format!("{}: {}", path.into().display(), err),
        ))
    }

    /// Whether the user can recover by fixing input or resolving the tree
    /// by hand, as opposed to an aborted or untrustworthy run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidRangeSpec(_)
                | Self::InvalidRefName(_)
                | Self::InvalidConfig(_)
                | Self::DirtyWorktree
                | Self::ConflictHalted { .. }
        )
    }
}
