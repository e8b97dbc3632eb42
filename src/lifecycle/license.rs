//! License lifecycle state machine and admin operations.

use crate::clock::Clock;
use crate::code::generate_license_code;
use crate::model::{License, LicenseStatus, Organization, Plan};
use crate::store::EntitlementStore;
use crate::SeatwardenError;
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Attempts at generating a unique code before giving up.
///
/// With a 32^32 code space a second collision in a row means something is
/// wrong with the random source, not bad luck.
const MAX_CODE_ATTEMPTS: usize = 5;

/// Administrative operations on organizations, plans, and licenses.
///
/// All status transitions go through these methods; nothing else mutates
/// `License::status`.
pub struct LicenseService {
    store: Arc<EntitlementStore>,
    clock: Arc<dyn Clock>,
}

impl LicenseService {
    /// Create a service over the shared store and clock.
    pub fn new(store: Arc<EntitlementStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    // --- organizations & plans --------------------------------------------

    /// Register a customer organization.
    pub fn create_organization(&self, name: impl Into<String>) -> Organization {
        let org = Organization::new(name);
        self.store.write(|state| state.insert_organization(org.clone()));
        org
    }

    /// Delete an organization, cascading to its licenses and devices.
    pub fn delete_organization(&self, org_id: Uuid) -> Result<(), SeatwardenError> {
        self.store.write(|state| state.remove_organization(org_id))
    }

    /// Register a capacity plan. Names are unique.
    pub fn create_plan(
        &self,
        name: impl Into<String>,
        max_devices: i32,
    ) -> Result<Plan, SeatwardenError> {
        let plan = Plan::new(name, max_devices);
        self.store.write(|state| state.insert_plan(plan.clone()))?;
        Ok(plan)
    }

    /// Delete a plan. Fails with `Conflict` while licenses reference it.
    pub fn delete_plan(&self, plan_id: Uuid) -> Result<(), SeatwardenError> {
        self.store.write(|state| state.remove_plan(plan_id))
    }

    // --- license lifecycle -------------------------------------------------

    /// Create a new license: Inactive, expiring `validity_days` from now.
    ///
    /// Fails `NotFound` if the organization or plan does not exist. Code
    /// collisions against the unique index are retried with a fresh code.
    pub fn create(
        &self,
        org_id: Uuid,
        plan_id: Uuid,
        validity_days: i64,
        notes: Option<String>,
    ) -> Result<License, SeatwardenError> {
        let now = self.clock.now_utc();
        let expires_at = now + Duration::days(validity_days);

        self.store.write(|state| {
            if state.organization(org_id).is_none() {
                return Err(SeatwardenError::NotFound {
                    entity: "organization",
                });
            }
            if state.plan(plan_id).is_none() {
                return Err(SeatwardenError::NotFound { entity: "plan" });
            }

            let mut last_err = None;
            for _ in 0..MAX_CODE_ATTEMPTS {
                let mut license =
                    License::new(generate_license_code(), org_id, plan_id, expires_at, now);
                license.notes = notes.clone();
                let id = license.id;
                match state.insert_license(license) {
                    Ok(()) => {
                        debug!(license_id = %id, %expires_at, "license created");
                        // Insert succeeded; the clone lives in the store.
                        return Ok(state
                            .license(id)
                            .cloned()
                            .ok_or(SeatwardenError::NotFound { entity: "license" })?);
                    }
                    Err(err) => {
                        warn!("license code collision, retrying");
                        last_err = Some(err);
                    }
                }
            }
            Err(last_err.unwrap_or_else(|| {
                SeatwardenError::Conflict("license code generation exhausted".to_string())
            }))
        })
    }

    /// Activate a license.
    ///
    /// Fails `InvalidState` if the license is already past expiry; renewal
    /// must happen first. Otherwise sets Active regardless of prior status.
    pub fn activate(&self, license_id: Uuid) -> Result<License, SeatwardenError> {
        let now = self.clock.now_utc();
        self.store.write(|state| {
            let license = state
                .license_mut(license_id)
                .ok_or(SeatwardenError::NotFound { entity: "license" })?;
            if license.is_expired(now) {
                return Err(SeatwardenError::InvalidState(
                    "cannot activate an expired license; renew it first".to_string(),
                ));
            }
            license.status = LicenseStatus::Active;
            debug!(license_id = %license.id, "license activated");
            Ok(license.clone())
        })
    }

    /// Suspend a license. Unconditional.
    pub fn suspend(&self, license_id: Uuid) -> Result<License, SeatwardenError> {
        self.store.write(|state| {
            let license = state
                .license_mut(license_id)
                .ok_or(SeatwardenError::NotFound { entity: "license" })?;
            license.status = LicenseStatus::Suspended;
            debug!(license_id = %license.id, "license suspended");
            Ok(license.clone())
        })
    }

    /// Renew a license by `days`.
    ///
    /// An expired license restarts from now; an unexpired one extends its
    /// current expiry. Expired or suspended licenses come back Active.
    pub fn renew(&self, license_id: Uuid, days: i64) -> Result<License, SeatwardenError> {
        let now = self.clock.now_utc();
        self.store.write(|state| {
            let license = state
                .license_mut(license_id)
                .ok_or(SeatwardenError::NotFound { entity: "license" })?;

            license.expires_at = if license.is_expired(now) {
                now + Duration::days(days)
            } else {
                license.expires_at + Duration::days(days)
            };

            if matches!(
                license.status,
                LicenseStatus::Expired | LicenseStatus::Suspended
            ) {
                license.status = LicenseStatus::Active;
            }
            debug!(license_id = %license.id, expires_at = %license.expires_at, "license renewed");
            Ok(license.clone())
        })
    }

    /// Delete a license, cascading to its activations and logs.
    pub fn delete(&self, license_id: Uuid) -> Result<(), SeatwardenError> {
        self.store.write(|state| state.remove_license(license_id))
    }

    /// Flip every Active license past its expiry to Expired.
    ///
    /// Idempotent and safe to run on any cadence; validity checks re-derive
    /// expiry from `expires_at`, so a missed sweep never lets an expired
    /// license validate. Returns the number of licenses flipped.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now_utc();
        let count = self.store.write(|state| {
            let mut count = 0;
            for license in state.licenses_mut() {
                if license.status == LicenseStatus::Active && license.is_expired(now) {
                    license.status = LicenseStatus::Expired;
                    count += 1;
                }
            }
            count
        });
        if count > 0 {
            debug!(count, "expired licenses swept");
        }
        count
    }

    /// Active licenses expiring within the next `days` days.
    pub fn expiring_within(&self, days: i64) -> Vec<License> {
        let now = self.clock.now_utc();
        let cutoff = now + Duration::days(days);
        self.store.read(|state| {
            state
                .licenses()
                .filter(|l| {
                    l.status == LicenseStatus::Active
                        && l.expires_at > now
                        && l.expires_at <= cutoff
                })
                .cloned()
                .collect()
        })
    }

    /// List licenses, optionally filtered by organization and status.
    pub fn list(&self, org_id: Option<Uuid>, status: Option<LicenseStatus>) -> Vec<License> {
        self.store.read(|state| {
            state
                .licenses()
                .filter(|l| org_id.map_or(true, |id| l.org_id == id))
                .filter(|l| status.map_or(true, |s| l.status == s))
                .cloned()
                .collect()
        })
    }

    /// Look up a license by id.
    pub fn get(&self, license_id: Uuid) -> Result<License, SeatwardenError> {
        self.store.read(|state| {
            state
                .license(license_id)
                .cloned()
                .ok_or(SeatwardenError::NotFound { entity: "license" })
        })
    }

    /// Unique lookup by (possibly formatted) license code.
    pub fn get_by_code(&self, code: &str) -> Result<License, SeatwardenError> {
        let code = crate::code::normalize(code);
        self.store.read(|state| {
            state
                .license_by_code(&code)
                .cloned()
                .ok_or(SeatwardenError::NotFound { entity: "license" })
        })
    }
}
