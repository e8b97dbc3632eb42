//! Seatwarden configuration.

use std::time::Duration;

/// Minimum decoded signing-secret length in bytes.
const MIN_SECRET_BYTES: usize = 32;

/// Configuration for the entitlement engine.
///
/// All time-dependent policy knobs live here and are injected at
/// construction time; there is no ambient global state.
#[derive(Debug, Clone)]
pub struct SeatwardenConfig {
    /// HMAC-SHA256 signing secret for device tokens (hex-encoded).
    /// SECURITY: Load from deployment secrets, never commit to source.
    pub signing_secret_hex: String,

    /// Lifetime of minted device tokens.
    ///
    /// Deliberately long (default 90 days): the token only spares the device
    /// from re-sending its license code, it is never the source of truth
    /// for entitlement.
    pub token_ttl: Duration,

    /// Grace period for offline operation.
    ///
    /// An expired license still validates for an offline device within this
    /// window after its last successful validation.
    pub offline_grace: Duration,

    /// Default validity window for newly created licenses, in days.
    pub default_validity_days: i64,
}

impl Default for SeatwardenConfig {
    fn default() -> Self {
        Self {
            signing_secret_hex: String::new(),
            token_ttl: Duration::from_secs(90 * 24 * 60 * 60),
            offline_grace: Duration::from_secs(72 * 60 * 60),
            default_validity_days: 30,
        }
    }
}

impl SeatwardenConfig {
    /// Create a configuration with the given signing secret and defaults
    /// for every policy knob (90-day tokens, 72-hour grace, 30-day validity).
    pub fn new(signing_secret_hex: impl Into<String>) -> Self {
        Self {
            signing_secret_hex: signing_secret_hex.into(),
            ..Self::default()
        }
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), crate::SeatwardenError> {
        let secret = hex::decode(&self.signing_secret_hex).map_err(|e| {
            crate::SeatwardenError::ConfigError(format!("signing_secret_hex is not valid hex: {}", e))
        })?;
        if secret.len() < MIN_SECRET_BYTES {
            return Err(crate::SeatwardenError::ConfigError(format!(
                "signing secret must be at least {} bytes, got {}",
                MIN_SECRET_BYTES,
                secret.len()
            )));
        }
        if self.token_ttl.as_secs() == 0 {
            return Err(crate::SeatwardenError::ConfigError(
                "token_ttl cannot be zero".to_string(),
            ));
        }
        if self.offline_grace.as_secs() == 0 {
            return Err(crate::SeatwardenError::ConfigError(
                "offline_grace cannot be zero".to_string(),
            ));
        }
        if self.default_validity_days <= 0 {
            return Err(crate::SeatwardenError::ConfigError(
                "default_validity_days must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Decoded signing secret bytes.
    ///
    /// Call only after `validate()`; returns an empty vec on bad hex.
    pub(crate) fn signing_secret(&self) -> Vec<u8> {
        hex::decode(&self.signing_secret_hex).unwrap_or_default()
    }
}
