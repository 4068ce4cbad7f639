use crate::allocation::engine::total_weight;
use crate::core::participant::Project;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome of checking a project's participation percentages.
///
/// Percentage sums are scoped to **active** members only. A project whose
/// active members do not sum to exactly 100 must not be allocated against;
/// the check reports the imbalance rather than correcting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Participation {
    Valid,
    Unbalanced { total_percentage: Decimal },
}

impl Participation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Participation::Valid)
    }
}

/// Pure read-side check: do the active members' percentages total 100?
pub fn validate_participation(project: &Project) -> Participation {
    let total_percentage = total_weight(&project.weights());
    if total_percentage == Decimal::ONE_HUNDRED {
        Participation::Valid
    } else {
        Participation::Unbalanced { total_percentage }
    }
}
