//! # Seatwarden
//!
//! **Seat-based license entitlement engine for device fleets.**
//!
//! Seatwarden tracks organizations, capacity plans, licenses, and the
//! devices activated against them. Devices hold HMAC-signed entitlement
//! tokens, but the token is never the source of truth: every validation
//! re-checks live license status, device revocation, and expiry, so
//! revocation takes effect immediately rather than at token expiry.
//!
//! ## Features
//!
//! - **Seat capacity accounting** — per-plan device limits with an
//!   unlimited (`-1`) sentinel, enforced atomically against concurrent
//!   activations
//! - **License lifecycle** — Inactive, Active, Suspended, and Expired
//!   states with renewal that revives expired or suspended licenses
//! - **Device binding** — a device id belongs to at most one license,
//!   ever; revoked devices can reclaim a free seat later
//! - **HMAC-SHA256 device tokens** — compact signed tokens bind a device
//!   to its license between validations
//! - **Offline grace** — expired licenses keep validating for offline
//!   devices within a configurable window after their last check
//! - **Audit trail** — every validation attempt against a known device is
//!   logged with outcome, client metadata, and latency
//!
//! ## Quickstart
//!
//! ```no_run
//! use seatwarden::{EntitlementEngine, SeatwardenConfig, ValidationRequest};
//! use seatwarden::model::DeviceMetadata;
//!
//! fn main() -> Result<(), seatwarden::SeatwardenError> {
//!     let config = SeatwardenConfig::new("your-64-hex-char-signing-secret");
//!     let engine = EntitlementEngine::new(config)?;
//!
//!     let org = engine.create_organization("Acme Logistics");
//!     let plan = engine.create_plan("Fleet", 25)?;
//!     let license = engine.create_license(org.id, plan.id, None, None)?;
//!     engine.activate_license(license.id)?;
//!
//!     let (_activation, token) =
//!         engine.activate_device(&license.code, "scanner-17", DeviceMetadata::default())?;
//!
//!     let result = engine.validate(&ValidationRequest::new("scanner-17", token, false));
//!     if result.ok {
//!         println!("device entitled until {:?}", result.grace_period_until);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Trust Model
//!
//! Seatwarden is the server-side authority. Tokens prove a device once
//! held a seat; they spare the device from re-sending its license code
//! and nothing more. Anything revocable (license status, device seat,
//! expiry) is re-read from the store on every validation, which is why
//! token lifetimes can be long without weakening revocation.

#![deny(warnings)]
#![deny(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// License code alphabet and formatting
pub mod code;

// Domain model
pub mod model;

// Storage layer
pub mod store;

// Capacity policy
pub mod capacity;

// Token layer
pub mod token;

// Lifecycle services
pub mod lifecycle;

// Validation engine
pub mod validation;

// Manager (main public API)
pub mod manager;

// Re-exports for public API
pub use clock::{Clock, SystemClock};
pub use config::SeatwardenConfig;
pub use errors::SeatwardenError;
pub use manager::{EntitlementEngine, LicenseInfo};
pub use model::{DeviceActivation, License, LicenseStatus};
pub use validation::{ValidationReason, ValidationRequest, ValidationResult};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
