//! Seat-capacity policy.
//!
//! Pure functions of the current store state. They do not enforce
//! exclusivity themselves: a caller about to consume a seat must run the
//! check and the seat-consuming write inside a single store `write`
//! transaction.

use crate::model::{License, Plan};
use crate::store::StoreState;
use crate::SeatwardenError;

/// Sentinel returned by [`available_seats`] for unlimited plans.
pub const UNLIMITED_SEATS: i32 = -1;

fn plan_for<'a>(state: &'a StoreState, license: &License) -> Result<&'a Plan, SeatwardenError> {
    state
        .plan(license.plan_id)
        .ok_or(SeatwardenError::NotFound { entity: "plan" })
}

/// Whether the license can accept one more active device.
///
/// Unlimited plans always report available.
pub fn has_available_seat(state: &StoreState, license: &License) -> Result<bool, SeatwardenError> {
    let plan = plan_for(state, license)?;
    if plan.is_unlimited() {
        return Ok(true);
    }
    let active = state.active_seat_count(license.id) as i32;
    Ok(active < plan.max_devices)
}

/// Number of free seats on the license, or [`UNLIMITED_SEATS`].
pub fn available_seats(state: &StoreState, license: &License) -> Result<i32, SeatwardenError> {
    let plan = plan_for(state, license)?;
    if plan.is_unlimited() {
        return Ok(UNLIMITED_SEATS);
    }
    let active = state.active_seat_count(license.id) as i32;
    Ok((plan.max_devices - active).max(0))
}
