//! Lifecycle services: the only code allowed to transition entitlement
//! state.
//!
//! Each operation runs as one transaction against the entitlement store, so
//! capacity decisions and the writes they guard are a single critical
//! section.

pub mod device;
pub mod license;

pub use device::DeviceService;
pub use license::LicenseService;
