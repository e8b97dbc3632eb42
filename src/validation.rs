//! The request-time validation decision procedure.
//!
//! Combines token verification, live store lookups, expiry and grace-period
//! math, and audit logging. The token proves the device once held a seat on
//! the license; everything revocable is re-checked against the store on
//! every call, so a revoked device or suspended license is rejected long
//! before its token expires.

use crate::clock::Clock;
use crate::model::{License, LicenseStatus, ValidationLog, ValidationOutcome};
use crate::store::EntitlementStore;
use crate::token::TokenIssuer;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// One validation request from a device.
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    /// Device id making the request.
    pub device_id: String,

    /// Entitlement token presented by the device.
    pub token: String,

    /// Whether the device reports operating without connectivity.
    pub is_offline: bool,

    /// Client IP address, recorded in the audit log.
    pub ip_address: Option<String>,

    /// Client user agent, recorded in the audit log.
    pub user_agent: Option<String>,
}

impl ValidationRequest {
    /// Build a request with no client metadata.
    pub fn new(device_id: impl Into<String>, token: impl Into<String>, is_offline: bool) -> Self {
        Self {
            device_id: device_id.into(),
            token: token.into(),
            is_offline,
            ip_address: None,
            user_agent: None,
        }
    }
}

/// Terminal reason for a validation decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationReason {
    /// License valid, device entitled.
    Valid,
    /// Expired license accepted under the offline grace window.
    GracePeriod,
    /// Token failed signature, expiry, or kind checks.
    InvalidToken,
    /// Token was minted for a different device.
    TokenDeviceMismatch,
    /// No activation record for the device id.
    DeviceNotFound,
    /// The device's seat has been revoked.
    DeviceRevoked,
    /// The license in the token no longer exists.
    LicenseNotFound,
    /// The license is not in Active status.
    LicenseNotActive(LicenseStatus),
    /// The license is past expiry with no applicable grace.
    LicenseExpired,
}

impl ValidationReason {
    /// Whether this reason represents an entitled device.
    pub fn is_ok(&self) -> bool {
        matches!(self, ValidationReason::Valid | ValidationReason::GracePeriod)
    }

    fn outcome(&self) -> ValidationOutcome {
        match self {
            ValidationReason::Valid => ValidationOutcome::Success,
            ValidationReason::GracePeriod => ValidationOutcome::GracePeriod,
            _ => ValidationOutcome::Failed,
        }
    }
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationReason::Valid => f.write_str("license valid"),
            ValidationReason::GracePeriod => f.write_str("valid (offline grace period)"),
            ValidationReason::InvalidToken => f.write_str("invalid activation token"),
            ValidationReason::TokenDeviceMismatch => {
                f.write_str("token does not belong to this device")
            }
            ValidationReason::DeviceNotFound => f.write_str("device not found"),
            ValidationReason::DeviceRevoked => f.write_str("device revoked"),
            ValidationReason::LicenseNotFound => f.write_str("license not found"),
            ValidationReason::LicenseNotActive(status) => {
                write!(f, "license is not active (status: {})", status)
            }
            ValidationReason::LicenseExpired => f.write_str("license expired"),
        }
    }
}

/// Outcome of one validation call.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the device is entitled right now.
    pub ok: bool,

    /// Why.
    pub reason: ValidationReason,

    /// The license, when it could be resolved (also on some failures, e.g.
    /// a suspended license, so callers can report status).
    pub license: Option<License>,

    /// End of the offline grace window, reported on success.
    pub grace_period_until: Option<DateTime<Utc>>,
}

/// The validation decision engine.
pub struct ValidationEngine {
    store: Arc<EntitlementStore>,
    clock: Arc<dyn Clock>,
    issuer: TokenIssuer,
    grace: Duration,
}

impl ValidationEngine {
    /// Create an engine with the given offline grace window.
    pub fn new(
        store: Arc<EntitlementStore>,
        clock: Arc<dyn Clock>,
        issuer: TokenIssuer,
        offline_grace: std::time::Duration,
    ) -> Self {
        Self {
            store,
            clock,
            issuer,
            grace: Duration::from_std(offline_grace).unwrap_or_else(|_| Duration::hours(72)),
        }
    }

    /// Decide whether the device is currently entitled.
    ///
    /// Short-circuits on the first failure, in fixed order: token signature
    /// and expiry, token/device binding, activation existence, revocation,
    /// license existence, license status, expiry with offline grace. Every
    /// attempt against a known activation is recorded in the audit log
    /// after the decision is made; the log write can never change or
    /// suppress the result.
    pub fn validate(&self, request: &ValidationRequest) -> ValidationResult {
        let started = Instant::now();
        let result = self.decide(request);

        self.audit(request, &result, started.elapsed().as_millis() as u64);

        debug!(
            device_id = %request.device_id,
            ok = result.ok,
            reason = %result.reason,
            offline = request.is_offline,
            "validation decided"
        );
        result
    }

    fn decide(&self, request: &ValidationRequest) -> ValidationResult {
        let claims = match self.issuer.verify(&request.token, self.clock.as_ref()) {
            Ok(claims) => claims,
            Err(_) => return failure(ValidationReason::InvalidToken, None),
        };

        if claims.sub != request.device_id {
            return failure(ValidationReason::TokenDeviceMismatch, None);
        }

        let now = self.clock.now_utc();
        let grace = self.grace;
        let is_offline = request.is_offline;

        self.store.write(|state| {
            let activation = match state.activation_by_device(&request.device_id) {
                Some(activation) => activation,
                None => return failure(ValidationReason::DeviceNotFound, None),
            };
            if activation.is_revoked() {
                return failure(ValidationReason::DeviceRevoked, None);
            }
            let grace_deadline = activation
                .last_validated_at
                .map(|last| last + grace);

            let license = match state.license(claims.license_id) {
                Some(license) => license.clone(),
                None => return failure(ValidationReason::LicenseNotFound, None),
            };

            if license.status != LicenseStatus::Active {
                return failure(
                    ValidationReason::LicenseNotActive(license.status),
                    Some(license),
                );
            }

            if license.is_expired(now) {
                // Offline grace: measured from the last successful check,
                // so each offline success extends the window by one grace
                // interval but never indefinitely.
                let within_grace = grace_deadline.map_or(false, |deadline| now < deadline);
                if is_offline && within_grace {
                    if let Some(activation) = state.activation_by_device_mut(&request.device_id) {
                        activation.touch_validation(now);
                    }
                    return ValidationResult {
                        ok: true,
                        reason: ValidationReason::GracePeriod,
                        license: Some(license),
                        grace_period_until: Some(now + grace),
                    };
                }
                return failure(ValidationReason::LicenseExpired, Some(license));
            }

            if let Some(activation) = state.activation_by_device_mut(&request.device_id) {
                activation.touch_validation(now);
            }
            ValidationResult {
                ok: true,
                reason: ValidationReason::Valid,
                license: Some(license),
                grace_period_until: Some(now + grace),
            }
        })
    }

    /// Append an audit record for this attempt, when the device resolves to
    /// an activation. Fire-and-forget relative to the decision.
    fn audit(&self, request: &ValidationRequest, result: &ValidationResult, latency_ms: u64) {
        let now = self.clock.now_utc();
        self.store.write(|state| {
            let activation_id = match state.activation_by_device(&request.device_id) {
                Some(activation) => activation.id,
                None => return,
            };
            state.append_log(ValidationLog::new(
                activation_id,
                result.reason.outcome(),
                request.ip_address.clone(),
                request.user_agent.clone(),
                request.is_offline,
                (!result.ok).then(|| result.reason.to_string()),
                now,
                Some(latency_ms),
            ));
        });
    }
}

fn failure(reason: ValidationReason, license: Option<License>) -> ValidationResult {
    ValidationResult {
        ok: false,
        reason,
        license,
        grace_period_until: None,
    }
}
