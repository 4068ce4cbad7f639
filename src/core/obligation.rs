use crate::core::currency::Money;
use crate::core::participant::ParticipantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One participant's computed share of a cost event.
///
/// Exactly one obligation exists per (active participant at allocation
/// time × cost event), and the sum of `amount_due` across an event's
/// obligations equals the event's gross amount exactly — the allocation
/// engine's core contract.
///
/// Obligations are immutable once created. An edit to the parent event
/// voids and re-issues them rather than mutating in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obligation {
    id: Uuid,
    cost_event_id: Uuid,
    participant_id: ParticipantId,
    amount_due: Money,
    created_at: DateTime<Utc>,
}

impl Obligation {
    /// Create a new obligation.
    ///
    /// # Panics
    ///
    /// Panics if `amount_due` is negative.
    pub fn new(cost_event_id: Uuid, participant_id: ParticipantId, amount_due: Money) -> Self {
        assert!(
            amount_due.amount() >= rust_decimal::Decimal::ZERO,
            "Obligation amount must not be negative, got {}",
            amount_due
        );
        Self {
            id: Uuid::new_v4(),
            cost_event_id,
            participant_id,
            amount_due,
            created_at: Utc::now(),
        }
    }

    /// Create an obligation with a specific ID (useful for testing / determinism).
    pub fn with_id(
        id: Uuid,
        cost_event_id: Uuid,
        participant_id: ParticipantId,
        amount_due: Money,
    ) -> Self {
        let mut obligation = Self::new(cost_event_id, participant_id, amount_due);
        obligation.id = id;
        obligation
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cost_event_id(&self) -> Uuid {
        self.cost_event_id
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    pub fn amount_due(&self) -> Money {
        self.amount_due
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
