use dbvault_core_types::CycleId;
use thiserror::Error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure surfaced by the backup/restore engine is classified into one
/// of these kinds. Each kind maps to a stable error code used by logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    /// Disk read/write, permission or space failure
    Io,
    /// Connectivity failure or non-success response from the remote store
    Network,
    /// A remote operation exceeded its time bound
    Timeout,
    /// Schema synchronisation failed
    Schema,
    /// Expected absence (no backup yet, file already gone)
    NotFound,
    /// Another cycle already holds the resource
    Concurrency,
    /// Invalid or unreadable configuration
    Config,
    Serialization,
    Persistence,
    InvalidInput,
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Network => "ERR_NETWORK",
            ExErrorKind::Timeout => "ERR_TIMEOUT",
            ExErrorKind::Schema => "ERR_SCHEMA",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Whether a scheduled cycle that failed with this kind should simply
    /// wait for its next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExErrorKind::Network | ExErrorKind::Timeout | ExErrorKind::Concurrency
        )
    }
}

/// Canonical structured error type
///
/// Carries a classification kind plus optional context (operation, snapshot
/// key, local path, cycle id) for debugging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    key: Option<String>,
    path: Option<String>,
    cycle_id: Option<CycleId>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            key: None,
            path: None,
            cycle_id: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add remote snapshot key context
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Add local path context
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add cycle id context
    pub fn with_cycle_id(mut self, cycle_id: CycleId) -> Self {
        self.cycle_id = Some(cycle_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the snapshot key context, if any
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Get the local path context, if any
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Get the cycle id context, if any
    pub fn cycle_id(&self) -> Option<&CycleId> {
        self.cycle_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(key) = &self.key {
            write!(f, " (key: {})", key)?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Domain failures of the backup/restore engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VaultError {
    /// Consistent snapshot of the live database could not be produced
    #[error("Snapshot of {path} failed: {reason}")]
    SnapshotFailed { path: String, reason: String },

    /// Remote store answered with a non-success status
    #[error("Remote store rejected {op} with status {status}: {body}")]
    RemoteRejected { op: String, status: u16, body: String },

    /// Remote store could not be reached or the transfer broke
    #[error("Remote store transport failure during {op}: {reason}")]
    Transport { op: String, reason: String },

    /// Download stream ended with an error before completion
    #[error("Download of {key} interrupted: {reason}")]
    DownloadInterrupted { key: String, reason: String },

    /// Download completed but delivered a different byte count than recorded
    #[error("Download of {key} delivered {actual} bytes, expected {expected}")]
    SizeMismatch {
        key: String,
        expected: u64,
        actual: u64,
    },

    /// A bounded remote operation ran out of time
    #[error("Operation {op} timed out after {secs}s")]
    TimedOut { op: String, secs: u64 },

    /// Relational layer could not open or authenticate the database
    #[error("Database connection failed: {reason}")]
    Connection { reason: String },

    /// Schema synchronisation failed
    #[error("Schema sync failed: {reason}")]
    SchemaSync { reason: String },

    /// Configuration value rejected
    #[error("Invalid configuration for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },
}

impl From<VaultError> for ExError {
    fn from(err: VaultError) -> Self {
        let message = err.to_string();
        match err {
            VaultError::SnapshotFailed { path, .. } => ExError::new(ExErrorKind::Io)
                .with_op("take_snapshot")
                .with_path(path)
                .with_message(message),

            VaultError::RemoteRejected { op, .. } | VaultError::Transport { op, .. } => {
                ExError::new(ExErrorKind::Network)
                    .with_op(op)
                    .with_message(message)
            }

            VaultError::DownloadInterrupted { key, .. } | VaultError::SizeMismatch { key, .. } => {
                ExError::new(ExErrorKind::Network)
                    .with_op("download")
                    .with_key(key)
                    .with_message(message)
            }

            VaultError::TimedOut { op, .. } => ExError::new(ExErrorKind::Timeout)
                .with_op(op)
                .with_message(message),

            VaultError::Connection { .. } => ExError::new(ExErrorKind::Persistence)
                .with_op("connect")
                .with_message(message),

            VaultError::SchemaSync { .. } => ExError::new(ExErrorKind::Schema)
                .with_op("sync")
                .with_message(message),

            VaultError::InvalidConfig { .. } => ExError::new(ExErrorKind::Config)
                .with_op("load_settings")
                .with_message(message),
        }
    }
}

/// Create an IO error with operation context
pub fn io_error(op: &str, err: std::io::Error) -> ExError {
    let kind = if err.kind() == std::io::ErrorKind::NotFound {
        ExErrorKind::NotFound
    } else {
        ExErrorKind::Io
    };
    ExError::new(kind)
        .with_op(op.to_string())
        .with_message(err.to_string())
}
