//! Device activation lifecycle: activate, revoke, reactivate.

use crate::capacity;
use crate::clock::Clock;
use crate::model::{DeviceActivation, DeviceMetadata, LicenseStatus, ValidationLog};
use crate::store::EntitlementStore;
use crate::token::TokenIssuer;
use crate::SeatwardenError;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Device-facing and administrative operations on device activations.
pub struct DeviceService {
    store: Arc<EntitlementStore>,
    clock: Arc<dyn Clock>,
    issuer: TokenIssuer,
}

impl DeviceService {
    /// Create a service over the shared store, clock, and token issuer.
    pub fn new(store: Arc<EntitlementStore>, clock: Arc<dyn Clock>, issuer: TokenIssuer) -> Self {
        Self {
            store,
            clock,
            issuer,
        }
    }

    /// Activate a device against a license code; returns the activation and
    /// a freshly minted entitlement token.
    ///
    /// The whole decision runs as one store transaction: the capacity check
    /// and the seat-consuming write cannot be interleaved with a concurrent
    /// activation against the same license.
    ///
    /// # Errors
    /// - `NotFound` — no license with that code
    /// - `InvalidState` — license not Active, or past expiry
    /// - `CapacityExceeded` — no free seat
    /// - `DeviceBoundElsewhere` — device already belongs to another license
    pub fn activate(
        &self,
        license_code: &str,
        device_id: &str,
        metadata: DeviceMetadata,
    ) -> Result<(DeviceActivation, String), SeatwardenError> {
        let code = crate::code::normalize(license_code);
        let now = self.clock.now_utc();

        self.store.write(|state| {
            let license = state
                .license_by_code(&code)
                .cloned()
                .ok_or(SeatwardenError::NotFound { entity: "license" })?;

            if license.status != LicenseStatus::Active {
                return Err(SeatwardenError::InvalidState(format!(
                    "license is not active (status: {})",
                    license.status
                )));
            }
            if license.is_expired(now) {
                return Err(SeatwardenError::InvalidState(
                    "license expired".to_string(),
                ));
            }
            if !capacity::has_available_seat(state, &license)? {
                return Err(SeatwardenError::CapacityExceeded);
            }

            let existing = state
                .activation_by_device(device_id)
                .map(|a| (a.id, a.license_id, a.is_active()));

            match existing {
                // A device id binds to at most one license, ever.
                Some((_, bound_license, _)) if bound_license != license.id => {
                    Err(SeatwardenError::DeviceBoundElsewhere)
                }
                // Idempotent re-activation: same license, already active.
                Some((id, _, true)) => {
                    let token = self.issuer.mint(device_id, license.id, self.clock.as_ref())?;
                    let activation = state
                        .activation(id)
                        .cloned()
                        .ok_or(SeatwardenError::NotFound { entity: "device" })?;
                    Ok((activation, token))
                }
                // Previously revoked on this license: reuse the record.
                Some((id, _, false)) => {
                    let activation = state
                        .activation_mut(id)
                        .ok_or(SeatwardenError::NotFound { entity: "device" })?;
                    activation.reactivate();
                    activation.metadata = metadata;
                    let activation = activation.clone();
                    let token = self.issuer.mint(device_id, license.id, self.clock.as_ref())?;
                    debug!(device_id, license_id = %license.id, "revoked device re-activated");
                    Ok((activation, token))
                }
                None => {
                    let activation =
                        DeviceActivation::new(license.id, device_id, metadata, now);
                    state.insert_activation(activation.clone())?;
                    let token = self.issuer.mint(device_id, license.id, self.clock.as_ref())?;
                    debug!(device_id, license_id = %license.id, "device activated");
                    Ok((activation, token))
                }
            }
        })
    }

    /// Revoke a device, freeing its seat. Unconditional; freeing a seat
    /// never fails for capacity reasons.
    pub fn revoke(
        &self,
        activation_id: Uuid,
        reason: Option<String>,
    ) -> Result<DeviceActivation, SeatwardenError> {
        let now = self.clock.now_utc();
        self.store.write(|state| {
            let activation = state
                .activation_mut(activation_id)
                .ok_or(SeatwardenError::NotFound { entity: "device" })?;
            activation.revoke(now, reason);
            debug!(device_id = %activation.device_id, "device revoked");
            Ok(activation.clone())
        })
    }

    /// Reactivate a revoked device on its existing license.
    ///
    /// Capacity is re-checked: other devices may have taken the seat while
    /// this one was revoked. On `CapacityExceeded` the device stays revoked.
    pub fn reactivate(&self, activation_id: Uuid) -> Result<DeviceActivation, SeatwardenError> {
        self.store.write(|state| {
            let activation = state
                .activation(activation_id)
                .cloned()
                .ok_or(SeatwardenError::NotFound { entity: "device" })?;
            if activation.is_active() {
                return Ok(activation);
            }

            let license = state
                .license(activation.license_id)
                .cloned()
                .ok_or(SeatwardenError::NotFound { entity: "license" })?;
            if !capacity::has_available_seat(state, &license)? {
                return Err(SeatwardenError::CapacityExceeded);
            }

            let activation = state
                .activation_mut(activation_id)
                .ok_or(SeatwardenError::NotFound { entity: "device" })?;
            activation.reactivate();
            debug!(device_id = %activation.device_id, "device re-activated");
            Ok(activation.clone())
        })
    }

    /// Look up an activation by id.
    pub fn get(&self, activation_id: Uuid) -> Result<DeviceActivation, SeatwardenError> {
        self.store.read(|state| {
            state
                .activation(activation_id)
                .cloned()
                .ok_or(SeatwardenError::NotFound { entity: "device" })
        })
    }

    /// Unique lookup by device id.
    pub fn get_by_device(&self, device_id: &str) -> Result<DeviceActivation, SeatwardenError> {
        self.store.read(|state| {
            state
                .activation_by_device(device_id)
                .cloned()
                .ok_or(SeatwardenError::NotFound { entity: "device" })
        })
    }

    /// List activations, optionally filtered by license and active state.
    pub fn list(&self, license_id: Option<Uuid>, active: Option<bool>) -> Vec<DeviceActivation> {
        self.store.read(|state| {
            state
                .activations()
                .filter(|a| license_id.map_or(true, |id| a.license_id == id))
                .filter(|a| active.map_or(true, |wanted| a.is_active() == wanted))
                .cloned()
                .collect()
        })
    }

    /// Audit trail for one activation, oldest first.
    pub fn validation_logs(&self, activation_id: Uuid) -> Vec<ValidationLog> {
        self.store.read(|state| {
            state
                .logs_for_activation(activation_id)
                .into_iter()
                .cloned()
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::lifecycle::LicenseService;
    use crate::model::License;
    use std::time::Duration as StdDuration;

    fn setup(max_devices: i32) -> (DeviceService, LicenseService, License, MockClock) {
        let clock = MockClock::from_rfc3339("2025-03-01T00:00:00Z");
        let store = Arc::new(EntitlementStore::new());
        let licenses = LicenseService::new(store.clone(), Arc::new(clock.clone()));
        let issuer = TokenIssuer::new(vec![7u8; 32], StdDuration::from_secs(86400)).unwrap();
        let devices = DeviceService::new(store, Arc::new(clock.clone()), issuer);

        let org = licenses.create_organization("Acme");
        let plan = licenses.create_plan("Starter", max_devices).unwrap();
        let license = licenses.create(org.id, plan.id, 30, None).unwrap();
        let license = licenses.activate(license.id).unwrap();

        (devices, licenses, license, clock)
    }

    #[test]
    fn test_activate_happy_path() {
        let (devices, _, license, _) = setup(5);
        let (activation, token) = devices
            .activate(&license.code, "dev-1", DeviceMetadata::default())
            .unwrap();
        assert!(activation.is_active());
        assert_eq!(activation.license_id, license.id);
        assert!(!token.is_empty());
    }

    #[test]
    fn test_activate_unknown_code() {
        let (devices, _, _, _) = setup(5);
        let result = devices.activate(&"Z".repeat(32), "dev-1", DeviceMetadata::default());
        assert!(matches!(
            result,
            Err(SeatwardenError::NotFound { entity: "license" })
        ));
    }

    #[test]
    fn test_activate_inactive_license() {
        let (devices, licenses, license, _) = setup(5);
        licenses.suspend(license.id).unwrap();
        let result = devices.activate(&license.code, "dev-1", DeviceMetadata::default());
        assert!(matches!(
            result,
            Err(SeatwardenError::InvalidState(msg)) if msg.contains("suspended")
        ));
    }

    #[test]
    fn test_activate_expired_license() {
        let (devices, _, license, clock) = setup(5);
        clock.advance(chrono::Duration::days(31));
        let result = devices.activate(&license.code, "dev-1", DeviceMetadata::default());
        assert!(matches!(
            result,
            Err(SeatwardenError::InvalidState(msg)) if msg.contains("expired")
        ));
    }

    #[test]
    fn test_capacity_enforced() {
        let (devices, _, license, _) = setup(1);
        devices
            .activate(&license.code, "dev-1", DeviceMetadata::default())
            .unwrap();
        let result = devices.activate(&license.code, "dev-2", DeviceMetadata::default());
        assert!(matches!(result, Err(SeatwardenError::CapacityExceeded)));
    }

    #[test]
    fn test_revoke_frees_seat_for_next_device() {
        let (devices, _, license, _) = setup(1);
        let (first, _) = devices
            .activate(&license.code, "dev-1", DeviceMetadata::default())
            .unwrap();

        devices.revoke(first.id, Some("handset returned".to_string())).unwrap();

        let (second, _) = devices
            .activate(&license.code, "dev-2", DeviceMetadata::default())
            .unwrap();
        assert!(second.is_active());
    }

    #[test]
    fn test_device_bound_elsewhere() {
        let (devices, licenses, license_a, _) = setup(5);
        let org = licenses.create_organization("Other");
        let plan = licenses.create_plan("Pro", 5).unwrap();
        let license_b = licenses.create(org.id, plan.id, 30, None).unwrap();
        let license_b = licenses.activate(license_b.id).unwrap();

        devices
            .activate(&license_a.code, "dev-1", DeviceMetadata::default())
            .unwrap();
        let result = devices.activate(&license_b.code, "dev-1", DeviceMetadata::default());
        assert!(matches!(result, Err(SeatwardenError::DeviceBoundElsewhere)));
    }

    #[test]
    fn test_idempotent_reactivation_keeps_record() {
        let (devices, _, license, _) = setup(5);
        let (first, token_a) = devices
            .activate(&license.code, "dev-1", DeviceMetadata::default())
            .unwrap();
        let (again, token_b) = devices
            .activate(&license.code, "dev-1", DeviceMetadata::default())
            .unwrap();

        assert_eq!(first.id, again.id);
        assert!(!token_b.is_empty());
        // Both tokens verify; re-activation just re-issues.
        assert_ne!(token_a, "");
    }

    #[test]
    fn test_revoked_device_reuses_record_and_overwrites_metadata() {
        let (devices, _, license, _) = setup(5);
        let (first, _) = devices
            .activate(&license.code, "dev-1", DeviceMetadata::default())
            .unwrap();
        devices.revoke(first.id, None).unwrap();

        let metadata = DeviceMetadata {
            device_name: Some("Dock 7 scanner".to_string()),
            ..Default::default()
        };
        let (again, _) = devices.activate(&license.code, "dev-1", metadata).unwrap();

        assert_eq!(first.id, again.id);
        assert!(again.is_active());
        assert_eq!(again.metadata.device_name.as_deref(), Some("Dock 7 scanner"));
    }

    #[test]
    fn test_reactivate_at_capacity_fails_and_stays_revoked() {
        let (devices, _, license, _) = setup(1);
        let (first, _) = devices
            .activate(&license.code, "dev-1", DeviceMetadata::default())
            .unwrap();
        devices.revoke(first.id, None).unwrap();
        devices
            .activate(&license.code, "dev-2", DeviceMetadata::default())
            .unwrap();

        let result = devices.reactivate(first.id);
        assert!(matches!(result, Err(SeatwardenError::CapacityExceeded)));
        assert!(devices.get(first.id).unwrap().is_revoked());
    }

    #[test]
    fn test_reactivate_with_free_seat() {
        let (devices, _, license, _) = setup(2);
        let (first, _) = devices
            .activate(&license.code, "dev-1", DeviceMetadata::default())
            .unwrap();
        devices.revoke(first.id, None).unwrap();

        let restored = devices.reactivate(first.id).unwrap();
        assert!(restored.is_active());
    }

    #[test]
    fn test_revoke_never_fails_on_full_license() {
        let (devices, _, license, _) = setup(1);
        let (only, _) = devices
            .activate(&license.code, "dev-1", DeviceMetadata::default())
            .unwrap();
        // Freeing the last seat on a full license is always allowed.
        let revoked = devices.revoke(only.id, None).unwrap();
        assert!(revoked.is_revoked());
    }

    #[test]
    fn test_accepts_formatted_license_code() {
        let (devices, _, license, _) = setup(5);
        let formatted = crate::code::format_for_display(&license.code);
        let (activation, _) = devices
            .activate(&formatted, "dev-1", DeviceMetadata::default())
            .unwrap();
        assert_eq!(activation.license_id, license.id);
    }

    #[test]
    fn test_list_filters() {
        let (devices, _, license, _) = setup(5);
        let (first, _) = devices
            .activate(&license.code, "dev-1", DeviceMetadata::default())
            .unwrap();
        devices
            .activate(&license.code, "dev-2", DeviceMetadata::default())
            .unwrap();
        devices.revoke(first.id, None).unwrap();

        assert_eq!(devices.list(Some(license.id), None).len(), 2);
        assert_eq!(devices.list(Some(license.id), Some(true)).len(), 1);
        assert_eq!(devices.list(Some(license.id), Some(false)).len(), 1);
    }
}
