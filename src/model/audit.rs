//! Immutable audit records of validation attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome class of one validation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// License valid, device entitled.
    Success,
    /// Rejected for any reason.
    Failed,
    /// Expired license accepted under the offline grace window.
    GracePeriod,
}

/// One validation attempt against a device activation.
///
/// Append-only: never mutated, deleted only by cascade with its activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationLog {
    /// Unique identifier.
    pub id: Uuid,

    /// The device activation this attempt was made against.
    pub activation_id: Uuid,

    /// Outcome class.
    pub outcome: ValidationOutcome,

    /// Client IP address, if known.
    pub ip_address: Option<String>,

    /// Client user agent, if known.
    pub user_agent: Option<String>,

    /// Whether the device reported operating offline.
    pub is_offline: bool,

    /// Failure detail, present when `outcome == Failed`.
    pub error_detail: Option<String>,

    /// When the attempt happened.
    pub validated_at: DateTime<Utc>,

    /// Decision latency in milliseconds.
    pub response_time_ms: Option<u64>,
}

impl ValidationLog {
    /// Create a log entry for one attempt.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        activation_id: Uuid,
        outcome: ValidationOutcome,
        ip_address: Option<String>,
        user_agent: Option<String>,
        is_offline: bool,
        error_detail: Option<String>,
        validated_at: DateTime<Utc>,
        response_time_ms: Option<u64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            activation_id,
            outcome,
            ip_address,
            user_agent,
            is_offline,
            error_detail,
            validated_at,
            response_time_ms,
        }
    }
}
