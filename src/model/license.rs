//! License record and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a license.
///
/// Legal transitions: Inactive → Active ⇄ Suspended, Active → Expired
/// (time-driven sweep), Expired → Active (renewal only). All transitions go
/// through `lifecycle::LicenseService`; validity is always re-derived from
/// `expires_at`, so a stale status never lets an expired license validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    /// Created but not yet activated by an administrator.
    Inactive,
    /// Entitled to use the product (subject to expiry).
    Active,
    /// Administratively paused.
    Suspended,
    /// Past `expires_at`, flipped by the sweep.
    Expired,
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LicenseStatus::Inactive => "inactive",
            LicenseStatus::Active => "active",
            LicenseStatus::Suspended => "suspended",
            LicenseStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// The entitlement unit: one license owned by an organization under a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    /// Unique identifier.
    pub id: Uuid,

    /// Unique 32-character activation code, generated once, never reused.
    pub code: String,

    /// Owning organization.
    pub org_id: Uuid,

    /// Capacity plan this license was sold under.
    pub plan_id: Uuid,

    /// Current lifecycle status.
    pub status: LicenseStatus,

    /// Absolute expiry timestamp.
    pub expires_at: DateTime<Utc>,

    /// Free-form notes.
    pub notes: Option<String>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl License {
    /// Create a new inactive license expiring at the given instant.
    pub fn new(code: String, org_id: Uuid, plan_id: Uuid, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            org_id,
            plan_id,
            status: LicenseStatus::Inactive,
            expires_at,
            notes: None,
            created_at: now,
        }
    }

    /// Whether the license is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Derived validity: active status and unexpired.
    ///
    /// Never stored; always computed at the observation point.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.status == LicenseStatus::Active && !self.is_expired(now)
    }
}
