use serde::{Deserialize, Serialize};

use crate::models::{DepartureResource, DepartureStatus};

/// One guarded counter move on a resource's capacity ledger. Every lifecycle
/// transition maps to exactly one of these; a store executes guard and
/// mutation inside a single atomic document update, which is the entire
/// concurrency-correctness mechanism. Counters only ever move between the
/// three pools in pairs, so `available + held + booked == total_capacity`
/// is preserved without recomputation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum CapacityUpdate {
    /// hold_booking: available -> held. Also requires the departure to be
    /// Active, so a concurrent close refuses the hold at the same guard.
    Hold { quantity: u32 },
    /// confirm_booking: held -> booked.
    Commit { quantity: u32 },
    /// cancel of a held booking, or expire: held -> available.
    ReleaseHeld { quantity: u32 },
    /// cancel of a confirmed booking: booked -> available.
    ReleaseBooked { quantity: u32 },
}

impl CapacityUpdate {
    pub fn quantity(&self) -> u32 {
        match *self {
            CapacityUpdate::Hold { quantity }
            | CapacityUpdate::Commit { quantity }
            | CapacityUpdate::ReleaseHeld { quantity }
            | CapacityUpdate::ReleaseBooked { quantity } => quantity,
        }
    }

    /// Whether the enclosing departure must be Active for the update to
    /// match. Only new holds care; releases must succeed on any status.
    pub fn requires_active_departure(&self) -> bool {
        matches!(self, CapacityUpdate::Hold { .. })
    }

    /// The conditional part of the update. A store must evaluate this and
    /// `apply` under the same atomic section.
    pub fn guard(&self, resource: &DepartureResource, status: DepartureStatus) -> bool {
        if self.requires_active_departure() && status != DepartureStatus::Active {
            return false;
        }
        match *self {
            CapacityUpdate::Hold { quantity } => resource.available >= quantity,
            CapacityUpdate::Commit { quantity } => resource.held >= quantity,
            CapacityUpdate::ReleaseHeld { quantity } => resource.held >= quantity,
            CapacityUpdate::ReleaseBooked { quantity } => resource.booked >= quantity,
        }
    }

    /// The paired increment/decrement. Callers must have checked `guard`
    /// first; the debug assertion catches stores that do not.
    pub fn apply(&self, resource: &mut DepartureResource) {
        debug_assert!(self.guard(resource, DepartureStatus::Active));
        match *self {
            CapacityUpdate::Hold { quantity } => {
                resource.available -= quantity;
                resource.held += quantity;
            }
            CapacityUpdate::Commit { quantity } => {
                resource.held -= quantity;
                resource.booked += quantity;
            }
            CapacityUpdate::ReleaseHeld { quantity } => {
                resource.held -= quantity;
                resource.available += quantity;
            }
            CapacityUpdate::ReleaseBooked { quantity } => {
                resource.booked -= quantity;
                resource.available += quantity;
            }
        }
        debug_assert!(resource.ledger_balanced());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(available: u32, held: u32, booked: u32) -> DepartureResource {
        DepartureResource {
            resource_id: "adult".to_string(),
            resource_type: "seat".to_string(),
            child_entity_code: "SEAT-ADULT".to_string(),
            price_override: None,
            currency: None,
            total_capacity: available + held + booked,
            available,
            held,
            booked,
        }
    }

    #[test]
    fn hold_moves_available_to_held() {
        let mut r = resource(5, 0, 0);
        let u = CapacityUpdate::Hold { quantity: 3 };
        assert!(u.guard(&r, DepartureStatus::Active));
        u.apply(&mut r);
        assert_eq!((r.available, r.held, r.booked), (2, 3, 0));
        assert!(r.ledger_balanced());
    }

    #[test]
    fn hold_guard_refuses_insufficient_capacity() {
        let r = resource(2, 3, 0);
        assert!(!CapacityUpdate::Hold { quantity: 3 }.guard(&r, DepartureStatus::Active));
    }

    #[test]
    fn hold_guard_refuses_inactive_departure() {
        let r = resource(5, 0, 0);
        let u = CapacityUpdate::Hold { quantity: 1 };
        assert!(!u.guard(&r, DepartureStatus::Draft));
        assert!(!u.guard(&r, DepartureStatus::Closed));
    }

    #[test]
    fn releases_do_not_care_about_status() {
        let r = resource(0, 2, 3);
        assert!(CapacityUpdate::ReleaseHeld { quantity: 2 }.guard(&r, DepartureStatus::Closed));
        assert!(CapacityUpdate::ReleaseBooked { quantity: 3 }.guard(&r, DepartureStatus::Draft));
        assert!(CapacityUpdate::Commit { quantity: 2 }.guard(&r, DepartureStatus::Closed));
    }

    #[test]
    fn commit_then_release_booked_round_trips() {
        let mut r = resource(2, 3, 0);
        CapacityUpdate::Commit { quantity: 3 }.apply(&mut r);
        assert_eq!((r.available, r.held, r.booked), (2, 0, 3));
        CapacityUpdate::ReleaseBooked { quantity: 3 }.apply(&mut r);
        assert_eq!((r.available, r.held, r.booked), (5, 0, 0));
        assert!(r.ledger_balanced());
    }

    #[test]
    fn release_guard_refuses_overdraw() {
        let r = resource(5, 1, 0);
        assert!(!CapacityUpdate::ReleaseHeld { quantity: 2 }.guard(&r, DepartureStatus::Active));
        assert!(!CapacityUpdate::Commit { quantity: 2 }.guard(&r, DepartureStatus::Active));
    }
}
