//! Seatwarden error types.

use thiserror::Error;

/// Errors that can occur during license and device lifecycle operations.
#[derive(Debug, Error)]
pub enum SeatwardenError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found")]
    NotFound {
        /// The kind of entity that was looked up.
        entity: &'static str,
    },

    /// The operation is not legal in the entity's current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The license has no free seat for another active device.
    #[error("Device limit reached for license")]
    CapacityExceeded,

    /// Device token is invalid, expired, or of the wrong kind.
    #[error("Device token rejected: {0}")]
    AuthenticationFailed(String),

    /// A unique constraint was violated (license code, plan name, device id).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The device is already actively bound to a different license.
    #[error("Device already activated under a different license")]
    DeviceBoundElsewhere,
}
