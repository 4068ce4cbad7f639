use crate::core::currency::{Currency, Money};
use crate::core::obligation::Obligation;
use crate::core::participant::{ParticipantId, ProjectId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// What a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// Credit from an approved contribution payment.
    Contribution,
    /// Admin-issued signed correction.
    Adjustment,
    /// Debit from settling an expense obligation out of credit.
    BalanceSettlement,
}

/// One immutable, auditable movement on a balance account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    id: Uuid,
    /// Signed amount: positive credits the account, negative debits it.
    amount: Money,
    kind: EntryKind,
    description: String,
    recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn new(amount: Money, kind: EntryKind, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            kind,
            description: description.into(),
            recorded_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}

/// Outcome of attempting to settle an obligation from balance credit.
///
/// `InsufficientCredit` is a normal branch, not a failure: the obligation
/// simply stays open for direct payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettleOutcome {
    Settled,
    InsufficientCredit {
        available: Decimal,
        required: Decimal,
    },
}

/// A participant's running credit/debit ledger within a project.
///
/// The account value per currency is the sum of every entry ever applied
/// to it, positive when the participant is owed, negative when they owe.
/// A cached running balance is kept per currency; [`BalanceAccount::replay`]
/// recomputes it from the entry log, and the two must always agree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceAccount {
    project_id: ProjectId,
    participant_id: ParticipantId,
    entries: Vec<LedgerEntry>,
    balances: HashMap<Currency, Decimal>,
}

impl BalanceAccount {
    pub fn new(project_id: ProjectId, participant_id: ParticipantId) -> Self {
        Self {
            project_id,
            participant_id,
            entries: Vec::new(),
            balances: HashMap::new(),
        }
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Current balance in a currency. Positive: the participant is owed.
    pub fn balance(&self, currency: Currency) -> Decimal {
        self.balances.get(&currency).copied().unwrap_or(Decimal::ZERO)
    }

    /// Recompute the balance from the full entry log.
    ///
    /// Must equal [`BalanceAccount::balance`] at all times — the replay
    /// invariant the property tests exercise.
    pub fn replay(&self, currency: Currency) -> Decimal {
        self.entries
            .iter()
            .filter(|e| e.amount.currency() == currency)
            .map(|e| e.amount.amount())
            .sum()
    }

    fn append(&mut self, entry: LedgerEntry) -> Uuid {
        let id = entry.id;
        *self
            .balances
            .entry(entry.amount.currency())
            .or_insert(Decimal::ZERO) += entry.amount.amount();
        self.entries.push(entry);
        id
    }

    /// Append a credit. Always succeeds.
    ///
    /// # Panics
    ///
    /// Panics if `amount` is negative — use [`BalanceAccount::adjust`]
    /// for signed corrections.
    pub fn credit(
        &mut self,
        amount: Money,
        kind: EntryKind,
        description: impl Into<String>,
    ) -> Uuid {
        assert!(
            amount.amount() >= Decimal::ZERO,
            "credit amount must not be negative, got {}",
            amount
        );
        log::debug!(
            "credit {} to {}/{}",
            amount,
            self.project_id,
            self.participant_id
        );
        self.append(LedgerEntry::new(amount, kind, description))
    }

    /// Append a debit. Always succeeds: the balance is allowed to go
    /// negative, because owing is a valid state.
    ///
    /// # Panics
    ///
    /// Panics if `amount` is negative.
    pub fn debit(
        &mut self,
        amount: Money,
        kind: EntryKind,
        description: impl Into<String>,
    ) -> Uuid {
        assert!(
            amount.amount() >= Decimal::ZERO,
            "debit amount must not be negative, got {}",
            amount
        );
        log::debug!(
            "debit {} from {}/{}",
            amount,
            self.project_id,
            self.participant_id
        );
        self.append(LedgerEntry::new(amount.negated(), kind, description))
    }

    /// Append a signed adjustment entry (admin-issued correction).
    pub fn adjust(&mut self, amount: Money, description: impl Into<String>) -> Uuid {
        self.append(LedgerEntry::new(amount, EntryKind::Adjustment, description))
    }

    /// Settle an obligation out of the account's credit, all or nothing.
    ///
    /// Debits the account by the obligation's full amount only when the
    /// credit in that currency covers it; otherwise leaves the account
    /// untouched and reports the shortfall.
    pub fn settle_from_balance(&mut self, obligation: &Obligation) -> SettleOutcome {
        let due = obligation.amount_due();
        let available = self.balance(due.currency());
        if available < due.amount() {
            return SettleOutcome::InsufficientCredit {
                available,
                required: due.amount(),
            };
        }
        self.debit(
            due,
            EntryKind::BalanceSettlement,
            format!("settled obligation {}", obligation.id()),
        );
        SettleOutcome::Settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn account() -> BalanceAccount {
        BalanceAccount::new(ProjectId::new("casa"), ParticipantId::new("P1"))
    }

    #[test]
    fn test_credit_and_debit() {
        let mut acc = account();
        acc.credit(
            Money::new(dec!(54), Currency::Ars),
            EntryKind::Contribution,
            "aporte marzo",
        );
        acc.debit(
            Money::new(dec!(20), Currency::Ars),
            EntryKind::BalanceSettlement,
            "gasto",
        );
        assert_eq!(acc.balance(Currency::Ars), dec!(34));
        assert_eq!(acc.balance(Currency::Usd), Decimal::ZERO);
        assert_eq!(acc.entries().len(), 2);
    }

    #[test]
    fn test_debit_can_drive_balance_negative() {
        let mut acc = account();
        acc.debit(
            Money::new(dec!(100), Currency::Usd),
            EntryKind::BalanceSettlement,
            "owes",
        );
        assert_eq!(acc.balance(Currency::Usd), dec!(-100));
    }

    #[test]
    fn test_adjust_is_signed() {
        let mut acc = account();
        acc.adjust(Money::new(dec!(-15.50), Currency::Ars), "corrección");
        acc.adjust(Money::new(dec!(5), Currency::Ars), "reintegro");
        assert_eq!(acc.balance(Currency::Ars), dec!(-10.50));
    }

    #[test]
    fn test_replay_matches_running_balance() {
        let mut acc = account();
        acc.credit(
            Money::new(dec!(90), Currency::Ars),
            EntryKind::Contribution,
            "aporte",
        );
        acc.adjust(Money::new(dec!(-12.34), Currency::Ars), "ajuste");
        acc.debit(
            Money::new(dec!(7.66), Currency::Ars),
            EntryKind::BalanceSettlement,
            "gasto",
        );
        assert_eq!(acc.replay(Currency::Ars), acc.balance(Currency::Ars));
        assert_eq!(acc.balance(Currency::Ars), dec!(70));
    }

    #[test]
    fn test_settle_from_balance_sufficient() {
        let mut acc = account();
        acc.credit(
            Money::new(dec!(54), Currency::Ars),
            EntryKind::Contribution,
            "aporte",
        );
        let ob = Obligation::new(
            Uuid::new_v4(),
            ParticipantId::new("P1"),
            Money::new(dec!(32.40), Currency::Ars),
        );
        assert_eq!(acc.settle_from_balance(&ob), SettleOutcome::Settled);
        assert_eq!(acc.balance(Currency::Ars), dec!(21.60));
    }

    #[test]
    fn test_settle_from_balance_insufficient_leaves_account_untouched() {
        let mut acc = account();
        acc.credit(
            Money::new(dec!(10), Currency::Ars),
            EntryKind::Contribution,
            "aporte",
        );
        let ob = Obligation::new(
            Uuid::new_v4(),
            ParticipantId::new("P1"),
            Money::new(dec!(21.60), Currency::Ars),
        );
        assert_eq!(
            acc.settle_from_balance(&ob),
            SettleOutcome::InsufficientCredit {
                available: dec!(10),
                required: dec!(21.60),
            }
        );
        assert_eq!(acc.balance(Currency::Ars), dec!(10));
        assert_eq!(acc.entries().len(), 1);
    }
}
