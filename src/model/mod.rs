//! Durable entitlement records.
//!
//! Plain data with derived predicates and the few mutations the lifecycle
//! services are allowed to perform. Status transitions never happen by
//! direct field assignment outside this module and `lifecycle`.

pub mod audit;
pub mod device;
pub mod license;
pub mod org;
pub mod plan;

pub use audit::{ValidationLog, ValidationOutcome};
pub use device::{DeviceActivation, DeviceMetadata, DeviceState};
pub use license::{License, LicenseStatus};
pub use org::Organization;
pub use plan::Plan;
