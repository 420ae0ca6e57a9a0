//! Error types for rho-session

use thiserror::Error;

/// Result type alias using rho-session Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during session operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the backend client layer
    #[error(transparent)]
    Api(#[from] rho_api::Error),

    /// The operation needs an active conversation
    #[error("No active conversation")]
    NoConversation,
}
