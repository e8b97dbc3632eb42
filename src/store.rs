//! In-memory transactional entitlement store.
//!
//! The single authoritative state every validation and lifecycle request
//! reads from. Mutating operations run as one closure under the write lock
//! (`write`), which gives them the transactional read-decide-write shape the
//! engine requires: a capacity check and the seat-consuming insert that
//! follows it can never be interleaved with another activation.
//!
//! Cascade rules are enforced here, explicitly: deleting a license removes
//! its activations and their logs; deleting an organization removes its
//! licenses first; deleting a plan is blocked while any license references
//! it.

use crate::model::{DeviceActivation, License, Organization, Plan, ValidationLog};
use crate::SeatwardenError;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Thread-safe store handle. Clone-free; share via `Arc`.
#[derive(Debug, Default)]
pub struct EntitlementStore {
    state: RwLock<StoreState>,
}

impl EntitlementStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a read-only closure against a consistent snapshot of the state.
    pub fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        let guard = self
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }

    /// Run a mutating closure as a single atomic transaction.
    ///
    /// Everything inside the closure happens under the exclusive lock, so
    /// check-then-act sequences (capacity, uniqueness) are race-free.
    pub fn write<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut guard = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

/// The durable record set: four entity maps, the audit log, and unique
/// indexes by license code, device id, and plan name.
#[derive(Debug, Default)]
pub struct StoreState {
    organizations: HashMap<Uuid, Organization>,
    plans: HashMap<Uuid, Plan>,
    licenses: HashMap<Uuid, License>,
    activations: HashMap<Uuid, DeviceActivation>,
    logs: Vec<ValidationLog>,
    license_ids_by_code: HashMap<String, Uuid>,
    activation_ids_by_device: HashMap<String, Uuid>,
    plan_ids_by_name: HashMap<String, Uuid>,
}

impl StoreState {
    // --- organizations -----------------------------------------------------

    /// Insert an organization.
    pub fn insert_organization(&mut self, org: Organization) {
        self.organizations.insert(org.id, org);
    }

    /// Look up an organization by id.
    pub fn organization(&self, id: Uuid) -> Option<&Organization> {
        self.organizations.get(&id)
    }

    /// Delete an organization, cascading to its licenses and their devices.
    pub fn remove_organization(&mut self, id: Uuid) -> Result<(), SeatwardenError> {
        if self.organizations.remove(&id).is_none() {
            return Err(SeatwardenError::NotFound {
                entity: "organization",
            });
        }
        let owned: Vec<Uuid> = self
            .licenses
            .values()
            .filter(|l| l.org_id == id)
            .map(|l| l.id)
            .collect();
        for license_id in owned {
            // Licenses were just enumerated from the map; ignore the
            // impossible NotFound.
            let _ = self.remove_license(license_id);
        }
        Ok(())
    }

    // --- plans -------------------------------------------------------------

    /// Insert a plan, enforcing unique names.
    pub fn insert_plan(&mut self, plan: Plan) -> Result<(), SeatwardenError> {
        if self.plan_ids_by_name.contains_key(&plan.name) {
            return Err(SeatwardenError::Conflict(format!(
                "plan name already exists: {}",
                plan.name
            )));
        }
        self.plan_ids_by_name.insert(plan.name.clone(), plan.id);
        self.plans.insert(plan.id, plan);
        Ok(())
    }

    /// Look up a plan by id.
    pub fn plan(&self, id: Uuid) -> Option<&Plan> {
        self.plans.get(&id)
    }

    /// Delete a plan. Blocked while any license references it.
    pub fn remove_plan(&mut self, id: Uuid) -> Result<(), SeatwardenError> {
        if !self.plans.contains_key(&id) {
            return Err(SeatwardenError::NotFound { entity: "plan" });
        }
        if self.licenses.values().any(|l| l.plan_id == id) {
            return Err(SeatwardenError::Conflict(
                "plan is referenced by existing licenses".to_string(),
            ));
        }
        if let Some(plan) = self.plans.remove(&id) {
            self.plan_ids_by_name.remove(&plan.name);
        }
        Ok(())
    }

    // --- licenses ----------------------------------------------------------

    /// Insert a license, enforcing unique codes.
    pub fn insert_license(&mut self, license: License) -> Result<(), SeatwardenError> {
        if self.license_ids_by_code.contains_key(&license.code) {
            return Err(SeatwardenError::Conflict(
                "license code already exists".to_string(),
            ));
        }
        self.license_ids_by_code
            .insert(license.code.clone(), license.id);
        self.licenses.insert(license.id, license);
        Ok(())
    }

    /// Look up a license by id.
    pub fn license(&self, id: Uuid) -> Option<&License> {
        self.licenses.get(&id)
    }

    /// Mutable lookup of a license by id.
    pub fn license_mut(&mut self, id: Uuid) -> Option<&mut License> {
        self.licenses.get_mut(&id)
    }

    /// Unique lookup of a license by its (normalized) code.
    pub fn license_by_code(&self, code: &str) -> Option<&License> {
        self.license_ids_by_code
            .get(code)
            .and_then(|id| self.licenses.get(id))
    }

    /// Iterate all licenses.
    pub fn licenses(&self) -> impl Iterator<Item = &License> {
        self.licenses.values()
    }

    /// Iterate all licenses mutably (sweep).
    pub fn licenses_mut(&mut self) -> impl Iterator<Item = &mut License> {
        self.licenses.values_mut()
    }

    /// Delete a license, cascading to its activations and their logs.
    pub fn remove_license(&mut self, id: Uuid) -> Result<(), SeatwardenError> {
        let license = self
            .licenses
            .remove(&id)
            .ok_or(SeatwardenError::NotFound { entity: "license" })?;
        self.license_ids_by_code.remove(&license.code);

        let owned: Vec<Uuid> = self
            .activations
            .values()
            .filter(|a| a.license_id == id)
            .map(|a| a.id)
            .collect();
        for activation_id in owned {
            self.remove_activation(activation_id);
        }
        Ok(())
    }

    // --- device activations ------------------------------------------------

    /// Insert an activation, enforcing one record per device id.
    pub fn insert_activation(&mut self, activation: DeviceActivation) -> Result<(), SeatwardenError> {
        if self
            .activation_ids_by_device
            .contains_key(&activation.device_id)
        {
            return Err(SeatwardenError::Conflict(
                "device already has an activation record".to_string(),
            ));
        }
        self.activation_ids_by_device
            .insert(activation.device_id.clone(), activation.id);
        self.activations.insert(activation.id, activation);
        Ok(())
    }

    /// Look up an activation by id.
    pub fn activation(&self, id: Uuid) -> Option<&DeviceActivation> {
        self.activations.get(&id)
    }

    /// Mutable lookup of an activation by id.
    pub fn activation_mut(&mut self, id: Uuid) -> Option<&mut DeviceActivation> {
        self.activations.get_mut(&id)
    }

    /// Unique lookup of an activation by device id.
    pub fn activation_by_device(&self, device_id: &str) -> Option<&DeviceActivation> {
        self.activation_ids_by_device
            .get(device_id)
            .and_then(|id| self.activations.get(id))
    }

    /// Mutable unique lookup of an activation by device id.
    pub fn activation_by_device_mut(&mut self, device_id: &str) -> Option<&mut DeviceActivation> {
        let id = *self.activation_ids_by_device.get(device_id)?;
        self.activations.get_mut(&id)
    }

    /// Iterate all activations.
    pub fn activations(&self) -> impl Iterator<Item = &DeviceActivation> {
        self.activations.values()
    }

    /// Count of activations currently occupying a seat on the license.
    pub fn active_seat_count(&self, license_id: Uuid) -> usize {
        self.activations
            .values()
            .filter(|a| a.license_id == license_id && a.is_active())
            .count()
    }

    fn remove_activation(&mut self, id: Uuid) {
        if let Some(activation) = self.activations.remove(&id) {
            self.activation_ids_by_device.remove(&activation.device_id);
            self.logs.retain(|log| log.activation_id != id);
        }
    }

    // --- audit log ---------------------------------------------------------

    /// Append a validation log entry. Append-only; entries are never edited.
    pub fn append_log(&mut self, log: ValidationLog) {
        self.logs.push(log);
    }

    /// All log entries for one activation, oldest first.
    pub fn logs_for_activation(&self, activation_id: Uuid) -> Vec<&ValidationLog> {
        self.logs
            .iter()
            .filter(|log| log.activation_id == activation_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeviceMetadata, ValidationOutcome};
    use chrono::Utc;

    fn seeded() -> (EntitlementStore, Uuid, Uuid, Uuid) {
        let store = EntitlementStore::new();
        let (org_id, plan_id, license_id) = store.write(|state| {
            let org = Organization::new("Acme");
            let org_id = org.id;
            state.insert_organization(org);

            let plan = Plan::new("Starter", 5);
            let plan_id = plan.id;
            state.insert_plan(plan).unwrap();

            let now = Utc::now();
            let license = License::new(
                "A".repeat(32),
                org_id,
                plan_id,
                now + chrono::Duration::days(30),
                now,
            );
            let license_id = license.id;
            state.insert_license(license).unwrap();

            (org_id, plan_id, license_id)
        });
        (store, org_id, plan_id, license_id)
    }

    #[test]
    fn test_unique_license_code() {
        let (store, org_id, plan_id, _) = seeded();
        let result = store.write(|state| {
            let now = Utc::now();
            state.insert_license(License::new("A".repeat(32), org_id, plan_id, now, now))
        });
        assert!(matches!(result, Err(SeatwardenError::Conflict(_))));
    }

    #[test]
    fn test_unique_plan_name() {
        let (store, _, _, _) = seeded();
        let result = store.write(|state| state.insert_plan(Plan::new("Starter", 20)));
        assert!(matches!(result, Err(SeatwardenError::Conflict(_))));
    }

    #[test]
    fn test_unique_device_id() {
        let (store, _, _, license_id) = seeded();
        let result = store.write(|state| {
            let now = Utc::now();
            state
                .insert_activation(DeviceActivation::new(
                    license_id,
                    "dev-1",
                    DeviceMetadata::default(),
                    now,
                ))
                .unwrap();
            state.insert_activation(DeviceActivation::new(
                license_id,
                "dev-1",
                DeviceMetadata::default(),
                now,
            ))
        });
        assert!(matches!(result, Err(SeatwardenError::Conflict(_))));
    }

    #[test]
    fn test_lookup_by_code_and_device() {
        let (store, _, _, license_id) = seeded();
        store.write(|state| {
            let now = Utc::now();
            state
                .insert_activation(DeviceActivation::new(
                    license_id,
                    "dev-1",
                    DeviceMetadata::default(),
                    now,
                ))
                .unwrap();
        });
        store.read(|state| {
            assert_eq!(state.license_by_code(&"A".repeat(32)).unwrap().id, license_id);
            assert!(state.license_by_code("MISSING").is_none());
            assert_eq!(
                state.activation_by_device("dev-1").unwrap().license_id,
                license_id
            );
        });
    }

    #[test]
    fn test_active_seat_count_ignores_revoked() {
        let (store, _, _, license_id) = seeded();
        store.write(|state| {
            let now = Utc::now();
            state
                .insert_activation(DeviceActivation::new(
                    license_id,
                    "dev-1",
                    DeviceMetadata::default(),
                    now,
                ))
                .unwrap();
            let mut second =
                DeviceActivation::new(license_id, "dev-2", DeviceMetadata::default(), now);
            second.revoke(now, None);
            state.insert_activation(second).unwrap();
        });
        assert_eq!(store.read(|state| state.active_seat_count(license_id)), 1);
    }

    #[test]
    fn test_license_cascade_delete() {
        let (store, _, _, license_id) = seeded();
        let activation_id = store.write(|state| {
            let now = Utc::now();
            let activation =
                DeviceActivation::new(license_id, "dev-1", DeviceMetadata::default(), now);
            let activation_id = activation.id;
            state.insert_activation(activation).unwrap();
            state.append_log(ValidationLog::new(
                activation_id,
                ValidationOutcome::Success,
                None,
                None,
                false,
                None,
                now,
                None,
            ));
            activation_id
        });

        store.write(|state| state.remove_license(license_id)).unwrap();

        store.read(|state| {
            assert!(state.license(license_id).is_none());
            assert!(state.activation(activation_id).is_none());
            assert!(state.activation_by_device("dev-1").is_none());
            assert!(state.logs_for_activation(activation_id).is_empty());
        });
    }

    #[test]
    fn test_org_cascade_delete() {
        let (store, org_id, _, license_id) = seeded();
        store.write(|state| state.remove_organization(org_id)).unwrap();
        store.read(|state| {
            assert!(state.organization(org_id).is_none());
            assert!(state.license(license_id).is_none());
        });
    }

    #[test]
    fn test_plan_delete_blocked_while_referenced() {
        let (store, _, plan_id, license_id) = seeded();
        let result = store.write(|state| state.remove_plan(plan_id));
        assert!(matches!(result, Err(SeatwardenError::Conflict(_))));

        // Freed once the referencing license is gone.
        store.write(|state| state.remove_license(license_id)).unwrap();
        assert!(store.write(|state| state.remove_plan(plan_id)).is_ok());
    }

    #[test]
    fn test_missing_entities() {
        let store = EntitlementStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.write(|state| state.remove_license(id)),
            Err(SeatwardenError::NotFound { entity: "license" })
        ));
        assert!(matches!(
            store.write(|state| state.remove_plan(id)),
            Err(SeatwardenError::NotFound { entity: "plan" })
        ));
    }
}
