//! Proportional distance allocation across extend joints.

use waldo_core::error::CommandError;

/// Split a requested displacement across joints in proportion to their
/// upper travel limits.
///
/// Joint `i` with limit `L_i` receives `d × L_i / ΣL`, so the allocations
/// sum exactly to `d` while respecting each joint's share of the total
/// mechanical capacity. This is a fixed proportional split, not inverse
/// kinematics; rebalancing requires recomputing from the current limits.
///
/// # Errors
///
/// - `NonFiniteTarget` for a NaN/infinite displacement
/// - `NoJointCapacity` for an empty roster, a negative or non-finite limit,
///   or limits summing to zero (the split would divide by zero)
pub fn proportional_split(displacement: f32, limits: &[f32]) -> Result<Vec<f32>, CommandError> {
    if !displacement.is_finite() {
        return Err(CommandError::NonFiniteTarget);
    }
    if limits.is_empty() || limits.iter().any(|l| !l.is_finite() || *l < 0.0) {
        return Err(CommandError::NoJointCapacity);
    }
    let total: f32 = limits.iter().sum();
    if total <= 0.0 {
        return Err(CommandError::NoJointCapacity);
    }
    Ok(limits.iter().map(|l| displacement * (l / total)).collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
