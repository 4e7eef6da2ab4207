//! Error types for the warden
//!
//! This module defines the various errors that can occur while loading,
//! watching, and enforcing ban lists. Configuration and watcher failures are
//! fatal to their component; everything else is handled where it occurs.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during warden operations
#[derive(Debug, Error)]
pub enum WardenError {
    /// Required configuration value missing or empty at startup
    #[error("Missing configuration value: {0}")]
    MissingConfig(&'static str),

    /// Configuration value present but unusable
    #[error("Invalid configuration value for {name}: {message}")]
    InvalidConfig { name: &'static str, message: String },

    /// Configuration file unreadable or malformed
    #[error("Failed to read config file {path}: {message}")]
    ConfigFile { path: PathBuf, message: String },

    /// Ban-list directory could not be enumerated
    #[error("Failed to read ban-list directory {path}: {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A ban-list file could not be read
    #[error("Failed to read ban-list file {path}: {source}")]
    ListRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Guild membership fetch failed; the enforcement pass is skipped
    #[error("Failed to fetch guild members: {0}")]
    MemberFetch(#[source] Box<serenity::Error>),

    /// An individual ban call failed; the batch continues
    #[error("Failed to ban member {user_id} for reason {reason}: {source}")]
    Ban {
        user_id: u64,
        reason: String,
        #[source]
        source: Box<serenity::Error>,
    },

    /// The filesystem watch could not be installed
    #[error("Failed to install filesystem watch: {0}")]
    WatcherInit(#[from] notify::Error),

    /// A background loading task panicked or was aborted
    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// Discord API error
    #[error("Discord API error: {0}")]
    DiscordApi(#[from] Box<serenity::Error>),

    /// Generic error
    #[error("Warden error: {0}")]
    Other(String),
}

impl From<serenity::Error> for WardenError {
    fn from(error: serenity::Error) -> Self {
        Self::DiscordApi(Box::new(error))
    }
}

/// Convert a string into a WardenError
impl From<String> for WardenError {
    fn from(message: String) -> Self {
        Self::Other(message)
    }
}

/// Result type for warden operations
pub type WardenResult<T> = Result<T, WardenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = WardenError::MissingConfig("DISCORD_TOKEN");
        assert_eq!(
            error.to_string(),
            "Missing configuration value: DISCORD_TOKEN"
        );

        let error = WardenError::from("Something went wrong".to_string());
        assert_eq!(error.to_string(), "Warden error: Something went wrong");
    }

    #[test]
    fn test_list_errors_carry_path() {
        let error = WardenError::ListRead {
            path: PathBuf::from("/lists/spam.txt"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(error.to_string().contains("/lists/spam.txt"));
    }
}
