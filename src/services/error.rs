//! Errors raised by the settings backends.
//!
//! None of these ever reach the user: the store logs them and falls back to
//! defaults.

/// Failure to read or write a persisted setting.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Filesystem access for the JSON settings file failed.
    #[error("settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file could not be encoded.
    #[error("settings file encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A Windows registry call returned a non-success code.
    #[error("registry access to {key:?} failed with code {code}")]
    Registry {
        /// Value name (or key path) being accessed.
        key: String,
        /// Raw WIN32_ERROR code.
        code: u32,
    },

    /// The backend refused the operation outright.
    #[error("settings backend unavailable")]
    Unavailable,

    /// `save` attempted every entry but some of them were not written.
    #[error("failed to persist {keys:?}")]
    Incomplete {
        /// Keys whose write failed.
        keys: Vec<&'static str>,
    },
}
