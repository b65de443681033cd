use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport or credential failure while talking to the backing store.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store refused a create because the name is already taken under the parent.
    #[error("Artifact '{name}' already exists in container {parent}")]
    NameCollision { parent: String, name: String },

    #[error("Could not allocate a free version for '{base_filename}' after {attempts} attempts (last tried '{last_name}')")]
    VersionConflict {
        base_filename: String,
        attempts: u32,
        last_name: String,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Helper for creating configuration errors
    ///
    /// # Example
    /// ```
    /// use pfind_core::Error;
    /// let err = Error::config_error("store.root_id must not be empty");
    /// ```
    pub fn config_error(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Helper for creating store transport errors
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Error::StoreUnavailable(msg.into())
    }

    /// Helper for creating authentication errors
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Error::Auth(msg.into())
    }

    /// Helper for creating general errors with a message
    pub fn message(msg: impl Into<String>) -> Self {
        Error::Other(anyhow::anyhow!("{}", msg.into()))
    }

    /// Whether a caller may reasonably retry the operation that produced this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }

    pub fn is_collision(&self) -> bool {
        matches!(self, Error::NameCollision { .. })
    }
}
