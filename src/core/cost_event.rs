use crate::core::currency::{ExchangeRate, Money};
use crate::core::participant::ProjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A monetary event allocated across a project's participants:
/// either an expense (participants owe their share) or a contribution
/// (participants fund their share, credited to their balance on approval).
///
/// Cost events are soft-deleted, never erased: a tombstoned event keeps
/// its obligations and payments for audit but is excluded from summaries
/// until restored. The exchange rate recorded at creation is immutable;
/// later rate changes never alter historical figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEvent {
    id: Uuid,
    project_id: ProjectId,
    description: String,
    gross_amount: Money,
    category: Option<String>,
    provider: Option<String>,
    rate_used: ExchangeRate,
    is_contribution: bool,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl CostEvent {
    pub fn new(
        project_id: ProjectId,
        description: impl Into<String>,
        gross_amount: Money,
        rate_used: ExchangeRate,
        is_contribution: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            description: description.into(),
            gross_amount,
            category: None,
            provider: None,
            rate_used,
            is_contribution,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    /// Create an event with a specific ID (useful for testing / determinism).
    pub fn with_id(
        id: Uuid,
        project_id: ProjectId,
        description: impl Into<String>,
        gross_amount: Money,
        rate_used: ExchangeRate,
        is_contribution: bool,
    ) -> Self {
        let mut event = Self::new(project_id, description, gross_amount, rate_used, is_contribution);
        event.id = id;
        event
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    // --- Accessors ---

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn gross_amount(&self) -> Money {
        self.gross_amount
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn rate_used(&self) -> &ExchangeRate {
        &self.rate_used
    }

    pub fn is_contribution(&self) -> bool {
        self.is_contribution
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    // --- Mutation (driven by the settlement engine) ---

    /// Tombstone the event. The engine rejects the call if already deleted.
    pub(crate) fn mark_deleted(&mut self) {
        self.deleted_at = Some(Utc::now());
    }

    /// Clear the tombstone. The engine rejects the call if not deleted.
    pub(crate) fn mark_restored(&mut self) {
        self.deleted_at = None;
    }

    /// Re-record amount and rate after an edit. Obligations are re-issued
    /// by the engine; already-approved ones block the edit upstream.
    pub(crate) fn reprice(&mut self, gross_amount: Money, rate_used: ExchangeRate) {
        self.gross_amount = gross_amount;
        self.rate_used = rate_used;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::Currency;
    use rust_decimal_macros::dec;

    fn sample_event() -> CostEvent {
        CostEvent::new(
            ProjectId::new("casa"),
            "Cemento",
            Money::new(dec!(100), Currency::Usd),
            ExchangeRate::now(dec!(1000)).unwrap(),
            false,
        )
    }

    #[test]
    fn test_event_creation() {
        let event = sample_event();
        assert_eq!(event.description(), "Cemento");
        assert_eq!(event.gross_amount().amount(), dec!(100));
        assert!(!event.is_contribution());
        assert!(!event.is_deleted());
    }

    #[test]
    fn test_soft_delete_and_restore() {
        let mut event = sample_event();
        event.mark_deleted();
        assert!(event.is_deleted());
        assert!(event.deleted_at().is_some());

        event.mark_restored();
        assert!(!event.is_deleted());
        assert!(event.deleted_at().is_none());
    }

    #[test]
    fn test_builder_metadata() {
        let event = sample_event().with_category("materiales").with_provider("Corralón");
        assert_eq!(event.category(), Some("materiales"));
        assert_eq!(event.provider(), Some("Corralón"));
    }
}
