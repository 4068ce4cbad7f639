use crate::allocation::engine::{allocate, AllocationError, Share};
use crate::allocation::participation::{validate_participation, Participation};
use crate::core::cost_event::CostEvent;
use crate::core::currency::{Currency, ExchangeRate, Money, MoneyError};
use crate::core::obligation::Obligation;
use crate::core::participant::{ParticipantId, Project, ProjectId};
use crate::ledger::balance::{BalanceAccount, EntryKind, SettleOutcome};
use crate::settlement::payment::{Payment, PaymentError};
use crate::voting::tally::{OptionTally, Poll, VoteError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// The caller-facing error union for engine operations.
///
/// Every failure is returned typed; nothing is swallowed and nothing is
/// retried by the engine itself. Retrying is the caller's business and is
/// safe: operations on already-terminal records fail explicitly instead
/// of double-applying balance effects.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Money(#[from] MoneyError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Vote(#[from] VoteError),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("cost event {id} is already deleted")]
    AlreadyDeleted { id: Uuid },
    #[error("cost event {id} is not deleted")]
    NotDeleted { id: Uuid },
}

fn not_found(kind: &'static str, id: impl ToString) -> EngineError {
    EngineError::NotFound {
        kind,
        id: id.to_string(),
    }
}

/// Settlement progress of a cost event across its obligations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostEventStatus {
    Pending,
    Partial,
    Paid,
}

/// Running totals per currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrencyTotals {
    pub ars: Decimal,
    pub usd: Decimal,
}

impl CurrencyTotals {
    fn add(&mut self, money: &Money) {
        match money.currency() {
            Currency::Ars => self.ars += money.amount(),
            Currency::Usd => self.usd += money.amount(),
        }
    }

    pub fn get(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::Ars => self.ars,
            Currency::Usd => self.usd,
        }
    }
}

/// A participant's settlement position within a project: what they were
/// allocated, what has been approved, and what is still open.
/// Soft-deleted events are excluded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub due: CurrencyTotals,
    pub paid: CurrencyTotals,
    pub pending: CurrencyTotals,
    pub pending_count: usize,
}

/// The shared-cost settlement engine.
///
/// Owns the project rosters it has been handed, every cost event with its
/// obligations and payments, the per-participant balance accounts, and the
/// project polls. Each public operation is a single atomic read-modify-write
/// against the records it touches; `&mut self` serializes conflicting calls,
/// so the second of two simultaneous approvals observes `IllegalTransition`
/// rather than double-applying.
///
/// Persistence, transport and authorization live outside: the engine is the
/// single source of truth the excluded UI/API layer queries, and the
/// exchange-rate oracle is consumed per call, never owned.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SettlementEngine {
    projects: HashMap<ProjectId, Project>,
    cost_events: HashMap<Uuid, CostEvent>,
    obligations: HashMap<Uuid, Obligation>,
    payments: HashMap<Uuid, Payment>,
    payment_by_obligation: HashMap<Uuid, Uuid>,
    #[serde(with = "accounts_serde")]
    accounts: HashMap<(ProjectId, ParticipantId), BalanceAccount>,
    polls: HashMap<Uuid, Poll>,
}

mod accounts_serde {
    use super::*;
    use serde::de::{self, MapAccess, Visitor};
    use serde::ser::SerializeMap;

    pub fn serialize<S: serde::Serializer>(
        accounts: &HashMap<(ProjectId, ParticipantId), BalanceAccount>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(accounts.len()))?;
        for ((project, participant), account) in accounts {
            map.serialize_entry(&format!("{}:{}", project, participant), account)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<(ProjectId, ParticipantId), BalanceAccount>, D::Error> {
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = HashMap<(ProjectId, ParticipantId), BalanceAccount>;
            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map with \"project:participant\" keys")
            }
            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
                let mut map = HashMap::new();
                while let Some((key, value)) = access.next_entry::<String, BalanceAccount>()? {
                    let (project, participant) = key
                        .split_once(':')
                        .ok_or_else(|| de::Error::custom(format!("invalid key: {key}")))?;
                    map.insert(
                        (ProjectId::new(project), ParticipantId::new(participant)),
                        value,
                    );
                }
                Ok(map)
            }
        }
        deserializer.deserialize_map(V)
    }
}

/// Gross amounts and paid amounts must be strictly positive; signed
/// figures enter the system only through balance adjustments.
fn require_positive(amount: Decimal) -> Result<(), MoneyError> {
    if amount <= Decimal::ZERO {
        return Err(MoneyError::InvalidAmount { amount });
    }
    Ok(())
}

/// Resolve a per-call rate override against the ambient oracle rate.
fn effective_rate(
    rate_override: Option<Decimal>,
    ambient_rate: &ExchangeRate,
) -> Result<ExchangeRate, MoneyError> {
    match rate_override {
        Some(rate) => ExchangeRate::now(rate),
        None => Ok(ambient_rate.clone()),
    }
}

impl SettlementEngine {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Projects ---

    pub fn add_project(&mut self, project: Project) {
        self.projects.insert(project.id().clone(), project);
    }

    pub fn project(&self, project_id: &ProjectId) -> Result<&Project, EngineError> {
        self.projects
            .get(project_id)
            .ok_or_else(|| not_found("project", project_id))
    }

    /// Check that the project's active members sum to 100%.
    pub fn validate_participation(
        &self,
        project_id: &ProjectId,
    ) -> Result<Participation, EngineError> {
        Ok(validate_participation(self.project(project_id)?))
    }

    // --- Cost events ---

    /// Record an expense or contribution and allocate it into one
    /// obligation (plus one pending payment) per active member.
    ///
    /// The gross amount must be strictly positive. Fails with
    /// `UnbalancedWeights` when the roster does not sum to
    /// 100% — the event is not recorded in that case. In a
    /// current-account project, an expense obligation fully covered by
    /// the member's credit is settled from balance on the spot, leaving
    /// an already-approved payment behind.
    #[allow(clippy::too_many_arguments)]
    pub fn create_cost_event(
        &mut self,
        project_id: &ProjectId,
        description: impl Into<String>,
        amount: Decimal,
        currency: Currency,
        is_contribution: bool,
        rate_override: Option<Decimal>,
        ambient_rate: &ExchangeRate,
    ) -> Result<Uuid, EngineError> {
        require_positive(amount)?;
        let project = self.project(project_id)?;
        if let Participation::Unbalanced { total_percentage } = validate_participation(project) {
            return Err(AllocationError::UnbalancedWeights { total_percentage }.into());
        }
        let weights = project.weights();
        let settle_from_credit = project.is_current_account() && !is_contribution;

        let rate = effective_rate(rate_override, ambient_rate)?;
        let gross = Money::new(amount, currency).round_minor();
        let shares = allocate(&gross, &weights)?;

        let event = CostEvent::new(
            project_id.clone(),
            description,
            gross,
            rate.clone(),
            is_contribution,
        );
        let event_id = event.id();
        self.cost_events.insert(event_id, event);
        self.issue_obligations(event_id, project_id, shares, &rate, settle_from_credit)?;

        log::info!(
            "cost event {} recorded: {} across {} members of {}",
            event_id,
            gross,
            weights.len(),
            project_id
        );
        Ok(event_id)
    }

    /// Re-price an event and re-run its allocation.
    ///
    /// All open obligations (and their payments) are voided and
    /// re-issued against the current roster. If any obligation under the
    /// event already has an approved payment the edit is refused with
    /// `ObligationAlreadySettled`; an adjustment entry is the way to
    /// correct settled history.
    pub fn edit_cost_event(
        &mut self,
        cost_event_id: Uuid,
        new_amount: Option<Decimal>,
        new_currency: Option<Currency>,
        rate_override: Option<Decimal>,
        ambient_rate: &ExchangeRate,
    ) -> Result<(), EngineError> {
        if let Some(amount) = new_amount {
            require_positive(amount)?;
        }
        let event = self
            .cost_events
            .get(&cost_event_id)
            .ok_or_else(|| not_found("cost event", cost_event_id))?;
        if event.is_deleted() {
            return Err(EngineError::AlreadyDeleted { id: cost_event_id });
        }
        let project_id = event.project_id().clone();
        let old_gross = event.gross_amount();
        let is_contribution = event.is_contribution();

        let existing: Vec<Uuid> = self
            .obligations
            .values()
            .filter(|o| o.cost_event_id() == cost_event_id)
            .map(|o| o.id())
            .collect();
        for obligation_id in &existing {
            let approved = self
                .payment_by_obligation
                .get(obligation_id)
                .and_then(|pid| self.payments.get(pid))
                .map(|p| p.is_approved())
                .unwrap_or(false);
            if approved {
                return Err(PaymentError::ObligationAlreadySettled {
                    obligation_id: *obligation_id,
                }
                .into());
            }
        }

        let project = self.project(&project_id)?;
        if let Participation::Unbalanced { total_percentage } = validate_participation(project) {
            return Err(AllocationError::UnbalancedWeights { total_percentage }.into());
        }
        let weights = project.weights();
        let settle_from_credit = project.is_current_account() && !is_contribution;

        let rate = effective_rate(rate_override, ambient_rate)?;
        let gross = Money::new(
            new_amount.unwrap_or_else(|| old_gross.amount()),
            new_currency.unwrap_or_else(|| old_gross.currency()),
        )
        .round_minor();
        let shares = allocate(&gross, &weights)?;

        for obligation_id in existing {
            self.obligations.remove(&obligation_id);
            if let Some(payment_id) = self.payment_by_obligation.remove(&obligation_id) {
                self.payments.remove(&payment_id);
            }
        }
        if let Some(event) = self.cost_events.get_mut(&cost_event_id) {
            event.reprice(gross, rate.clone());
        }
        self.issue_obligations(cost_event_id, &project_id, shares, &rate, settle_from_credit)?;

        log::info!("cost event {} re-allocated at {}", cost_event_id, gross);
        Ok(())
    }

    /// Tombstone an event. Its obligations and payments are kept for
    /// audit but drop out of summaries until restored.
    pub fn soft_delete_cost_event(&mut self, cost_event_id: Uuid) -> Result<(), EngineError> {
        let event = self
            .cost_events
            .get_mut(&cost_event_id)
            .ok_or_else(|| not_found("cost event", cost_event_id))?;
        if event.is_deleted() {
            return Err(EngineError::AlreadyDeleted { id: cost_event_id });
        }
        event.mark_deleted();
        log::info!("cost event {} soft-deleted", cost_event_id);
        Ok(())
    }

    /// Clear an event's tombstone.
    pub fn restore_cost_event(&mut self, cost_event_id: Uuid) -> Result<(), EngineError> {
        let event = self
            .cost_events
            .get_mut(&cost_event_id)
            .ok_or_else(|| not_found("cost event", cost_event_id))?;
        if !event.is_deleted() {
            return Err(EngineError::NotDeleted { id: cost_event_id });
        }
        event.mark_restored();
        log::info!("cost event {} restored", cost_event_id);
        Ok(())
    }

    pub fn cost_event(&self, cost_event_id: Uuid) -> Result<&CostEvent, EngineError> {
        self.cost_events
            .get(&cost_event_id)
            .ok_or_else(|| not_found("cost event", cost_event_id))
    }

    /// The event's obligations, ordered by participant id for stable output.
    pub fn obligations_for_event(&self, cost_event_id: Uuid) -> Vec<&Obligation> {
        let mut obligations: Vec<&Obligation> = self
            .obligations
            .values()
            .filter(|o| o.cost_event_id() == cost_event_id)
            .collect();
        obligations.sort_by(|a, b| a.participant_id().cmp(b.participant_id()));
        obligations
    }

    /// Settlement progress: no approvals yet, some, or all.
    pub fn cost_event_status(&self, cost_event_id: Uuid) -> Result<CostEventStatus, EngineError> {
        self.cost_event(cost_event_id)?;
        let mut total = 0usize;
        let mut approved = 0usize;
        for obligation in self.obligations.values() {
            if obligation.cost_event_id() != cost_event_id {
                continue;
            }
            total += 1;
            if self.obligation_is_settled(obligation.id()) {
                approved += 1;
            }
        }
        Ok(if approved == 0 {
            CostEventStatus::Pending
        } else if approved == total {
            CostEventStatus::Paid
        } else {
            CostEventStatus::Partial
        })
    }

    // --- Obligations & payments ---

    pub fn obligation(&self, obligation_id: Uuid) -> Result<&Obligation, EngineError> {
        self.obligations
            .get(&obligation_id)
            .ok_or_else(|| not_found("obligation", obligation_id))
    }

    pub fn payment(&self, payment_id: Uuid) -> Result<&Payment, EngineError> {
        self.payments
            .get(&payment_id)
            .ok_or_else(|| not_found("payment", payment_id))
    }

    pub fn payment_for_obligation(&self, obligation_id: Uuid) -> Result<&Payment, EngineError> {
        let payment_id = self
            .payment_by_obligation
            .get(&obligation_id)
            .ok_or_else(|| not_found("payment", obligation_id))?;
        self.payment(*payment_id)
    }

    fn obligation_is_settled(&self, obligation_id: Uuid) -> bool {
        self.payment_by_obligation
            .get(&obligation_id)
            .and_then(|pid| self.payments.get(pid))
            .map(|p| p.is_approved())
            .unwrap_or(false)
    }

    /// Submit a payment against an obligation for approval.
    ///
    /// Records the paid amount (strictly positive) together with its
    /// counterpart-currency figure at the effective rate (override wins
    /// over the ambient rate). In an individual project the payment
    /// auto-approves with no externally observable `Submitted` state.
    pub fn submit_payment(
        &mut self,
        obligation_id: Uuid,
        amount: Decimal,
        currency: Currency,
        rate_override: Option<Decimal>,
        ambient_rate: &ExchangeRate,
    ) -> Result<Uuid, EngineError> {
        require_positive(amount)?;
        let obligation = self.obligation(obligation_id)?;
        let participant_id = obligation.participant_id().clone();
        let amount_due = obligation.amount_due();
        let event = self.cost_event(obligation.cost_event_id())?;
        let project = self.project(event.project_id())?;
        let auto_approve = project.is_individual();
        let is_contribution = event.is_contribution();
        let project_id = event.project_id().clone();
        let credit_description = format!("contribution '{}' approved", event.description());

        let rate = effective_rate(rate_override, ambient_rate)?;
        let paid = Money::new(amount, currency).round_minor();
        let reference = paid.convert(&rate)?;

        let payment_id = *self
            .payment_by_obligation
            .get(&obligation_id)
            .ok_or_else(|| not_found("payment", obligation_id))?;
        let payment = self
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| not_found("payment", payment_id))?;
        payment.submit(paid, reference, rate)?;

        if auto_approve {
            payment.approve()?;
            if is_contribution {
                Self::account_entry(&mut self.accounts, &project_id, &participant_id).credit(
                    amount_due,
                    EntryKind::Contribution,
                    credit_description,
                );
            }
        }
        Ok(payment_id)
    }

    /// Approve a submitted payment. Approving a contribution payment
    /// credits the participant's balance account with the obligation's
    /// amount due; expense approvals never touch the balance.
    pub fn approve_payment(&mut self, payment_id: Uuid) -> Result<(), EngineError> {
        let payment = self.payment(payment_id)?;
        let obligation = self.obligation(payment.obligation_id())?;
        let participant_id = obligation.participant_id().clone();
        let amount_due = obligation.amount_due();
        let event = self.cost_event(obligation.cost_event_id())?;
        let is_contribution = event.is_contribution();
        let project_id = event.project_id().clone();
        let credit_description = format!("contribution '{}' approved", event.description());

        let payment = self
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| not_found("payment", payment_id))?;
        payment.approve()?;

        if is_contribution {
            Self::account_entry(&mut self.accounts, &project_id, &participant_id).credit(
                amount_due,
                EntryKind::Contribution,
                credit_description,
            );
        }
        Ok(())
    }

    /// Reject a submitted payment, reopening the obligation.
    pub fn reject_payment(
        &mut self,
        payment_id: Uuid,
        reason: Option<String>,
    ) -> Result<(), EngineError> {
        let payment = self
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| not_found("payment", payment_id))?;
        payment.reject(reason)?;
        Ok(())
    }

    // --- Balance accounts ---

    fn account_entry<'a>(
        accounts: &'a mut HashMap<(ProjectId, ParticipantId), BalanceAccount>,
        project_id: &ProjectId,
        participant_id: &ParticipantId,
    ) -> &'a mut BalanceAccount {
        accounts
            .entry((project_id.clone(), participant_id.clone()))
            .or_insert_with(|| BalanceAccount::new(project_id.clone(), participant_id.clone()))
    }

    /// Append a signed admin adjustment to a member's balance account.
    pub fn adjust_balance(
        &mut self,
        project_id: &ProjectId,
        participant_id: &ParticipantId,
        amount: Money,
        description: impl Into<String>,
    ) -> Result<Uuid, EngineError> {
        let project = self.project(project_id)?;
        if project.member(participant_id).is_none() {
            return Err(not_found("participant", participant_id));
        }
        let entry_id = Self::account_entry(&mut self.accounts, project_id, participant_id)
            .adjust(amount, description);
        Ok(entry_id)
    }

    pub fn account(
        &self,
        project_id: &ProjectId,
        participant_id: &ParticipantId,
    ) -> Option<&BalanceAccount> {
        self.accounts
            .get(&(project_id.clone(), participant_id.clone()))
    }

    /// Current balance, zero when no account exists yet.
    pub fn balance(
        &self,
        project_id: &ProjectId,
        participant_id: &ParticipantId,
        currency: Currency,
    ) -> Decimal {
        self.account(project_id, participant_id)
            .map(|a| a.balance(currency))
            .unwrap_or(Decimal::ZERO)
    }

    /// A participant's due/paid/pending position within a project.
    pub fn payment_summary(
        &self,
        project_id: &ProjectId,
        participant_id: &ParticipantId,
    ) -> Result<PaymentSummary, EngineError> {
        self.project(project_id)?;
        let mut summary = PaymentSummary::default();
        for obligation in self.obligations.values() {
            if obligation.participant_id() != participant_id {
                continue;
            }
            let Some(event) = self.cost_events.get(&obligation.cost_event_id()) else {
                continue;
            };
            if event.project_id() != project_id || event.is_deleted() {
                continue;
            }
            let due = obligation.amount_due();
            summary.due.add(&due);
            if self.obligation_is_settled(obligation.id()) {
                summary.paid.add(&due);
            } else {
                summary.pending.add(&due);
                summary.pending_count += 1;
            }
        }
        Ok(summary)
    }

    // --- Voting ---

    /// Open a weighted poll on a project.
    pub fn create_poll(
        &mut self,
        project_id: &ProjectId,
        question: impl Into<String>,
        option_labels: Vec<String>,
    ) -> Result<Uuid, EngineError> {
        self.project(project_id)?;
        let poll = Poll::new(project_id.clone(), question, option_labels);
        let poll_id = poll.id();
        self.polls.insert(poll_id, poll);
        Ok(poll_id)
    }

    pub fn poll(&self, poll_id: Uuid) -> Result<&Poll, EngineError> {
        self.polls
            .get(&poll_id)
            .ok_or_else(|| not_found("poll", poll_id))
    }

    /// Cast a member's vote. Irreversible by the voter.
    pub fn cast_vote(
        &mut self,
        poll_id: Uuid,
        participant_id: &ParticipantId,
        option_id: u32,
    ) -> Result<(), EngineError> {
        let poll = self
            .polls
            .get(&poll_id)
            .ok_or_else(|| not_found("poll", poll_id))?;
        let project = self.project(poll.project_id())?;
        if project.member(participant_id).is_none() {
            return Err(not_found("participant", participant_id));
        }
        let poll = self
            .polls
            .get_mut(&poll_id)
            .ok_or_else(|| not_found("poll", poll_id))?;
        poll.cast_vote(participant_id, option_id)?;
        Ok(())
    }

    /// Admin-only: remove a member's vote so they may vote again.
    pub fn reset_vote(
        &mut self,
        poll_id: Uuid,
        participant_id: &ParticipantId,
    ) -> Result<(), EngineError> {
        let poll = self
            .polls
            .get_mut(&poll_id)
            .ok_or_else(|| not_found("poll", poll_id))?;
        poll.reset_vote(participant_id)?;
        Ok(())
    }

    /// Weighted tally of a poll against its project's roster.
    pub fn tally(&self, poll_id: Uuid) -> Result<Vec<OptionTally>, EngineError> {
        let poll = self.poll(poll_id)?;
        let project = self.project(poll.project_id())?;
        Ok(poll.tally(project.members()))
    }

    /// All maximum-weight options; ties are reported, not broken.
    pub fn winning_options(&self, poll_id: Uuid) -> Result<Vec<u32>, EngineError> {
        let poll = self.poll(poll_id)?;
        let project = self.project(poll.project_id())?;
        Ok(poll.winning_options(project.members()))
    }

    // --- Internal ---

    /// Store one obligation + payment per share. With `settle_from_credit`
    /// set, a share fully covered by the member's balance is debited and
    /// left with an already-approved payment (all-or-nothing).
    fn issue_obligations(
        &mut self,
        cost_event_id: Uuid,
        project_id: &ProjectId,
        shares: Vec<Share>,
        rate: &ExchangeRate,
        settle_from_credit: bool,
    ) -> Result<(), EngineError> {
        for share in shares {
            let obligation =
                Obligation::new(cost_event_id, share.participant_id.clone(), share.amount);
            let payment = if settle_from_credit {
                let account =
                    Self::account_entry(&mut self.accounts, project_id, &share.participant_id);
                match account.settle_from_balance(&obligation) {
                    SettleOutcome::Settled => {
                        let reference = share.amount.convert(rate)?;
                        Payment::settled(obligation.id(), share.amount, reference, rate.clone())
                    }
                    SettleOutcome::InsufficientCredit { .. } => Payment::new(obligation.id()),
                }
            } else {
                Payment::new(obligation.id())
            };
            self.payment_by_obligation.insert(obligation.id(), payment.id());
            self.payments.insert(payment.id(), payment);
            self.obligations.insert(obligation.id(), obligation);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::participant::Participant;
    use rust_decimal_macros::dec;

    fn rate() -> ExchangeRate {
        ExchangeRate::now(dec!(1000)).unwrap()
    }

    fn engine_with_project() -> (SettlementEngine, ProjectId) {
        let mut engine = SettlementEngine::new();
        let project_id = ProjectId::new("casa");
        engine.add_project(
            Project::new("casa", "Casa")
                .with_member(Participant::new("P1", dec!(60)))
                .with_member(Participant::new("P2", dec!(40))),
        );
        (engine, project_id)
    }

    #[test]
    fn test_create_expense_allocates_exactly() {
        let (mut engine, project_id) = engine_with_project();
        let event_id = engine
            .create_cost_event(
                &project_id,
                "Cemento",
                dec!(100),
                Currency::Usd,
                false,
                None,
                &rate(),
            )
            .unwrap();

        let obligations = engine.obligations_for_event(event_id);
        assert_eq!(obligations.len(), 2);
        assert_eq!(obligations[0].amount_due().amount(), dec!(60.00));
        assert_eq!(obligations[1].amount_due().amount(), dec!(40.00));
        assert_eq!(
            engine.cost_event_status(event_id).unwrap(),
            CostEventStatus::Pending
        );
    }

    #[test]
    fn test_unbalanced_roster_blocks_creation() {
        let mut engine = SettlementEngine::new();
        engine.add_project(
            Project::new("p", "P")
                .with_member(Participant::new("P1", dec!(60)))
                .with_member(Participant::new("P2", dec!(39.5))),
        );
        let result = engine.create_cost_event(
            &ProjectId::new("p"),
            "Gasto",
            dec!(100),
            Currency::Ars,
            false,
            None,
            &rate(),
        );
        assert_eq!(
            result,
            Err(EngineError::Allocation(AllocationError::UnbalancedWeights {
                total_percentage: dec!(99.5)
            }))
        );
    }

    #[test]
    fn test_invalid_rate_override_rejected() {
        let (mut engine, project_id) = engine_with_project();
        let result = engine.create_cost_event(
            &project_id,
            "Gasto",
            dec!(100),
            Currency::Usd,
            false,
            Some(dec!(-5)),
            &rate(),
        );
        assert_eq!(
            result,
            Err(EngineError::Money(MoneyError::InvalidRate { rate: dec!(-5) }))
        );
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let (mut engine, project_id) = engine_with_project();
        assert_eq!(
            engine.create_cost_event(
                &project_id,
                "Gasto",
                dec!(-100),
                Currency::Usd,
                false,
                None,
                &rate(),
            ),
            Err(EngineError::Money(MoneyError::InvalidAmount {
                amount: dec!(-100)
            }))
        );

        let event_id = engine
            .create_cost_event(
                &project_id,
                "Gasto",
                dec!(100),
                Currency::Usd,
                false,
                None,
                &rate(),
            )
            .unwrap();
        assert_eq!(
            engine.edit_cost_event(event_id, Some(Decimal::ZERO), None, None, &rate()),
            Err(EngineError::Money(MoneyError::InvalidAmount {
                amount: Decimal::ZERO
            }))
        );

        let obligation_id = engine.obligations_for_event(event_id)[0].id();
        assert_eq!(
            engine.submit_payment(obligation_id, dec!(-60), Currency::Usd, None, &rate()),
            Err(EngineError::Money(MoneyError::InvalidAmount {
                amount: dec!(-60)
            }))
        );
        // The obligation stays payable after the rejected attempts.
        assert!(engine
            .submit_payment(obligation_id, dec!(60), Currency::Usd, None, &rate())
            .is_ok());
    }

    #[test]
    fn test_expense_approval_does_not_credit_balance() {
        let (mut engine, project_id) = engine_with_project();
        let event_id = engine
            .create_cost_event(
                &project_id,
                "Cemento",
                dec!(100),
                Currency::Usd,
                false,
                None,
                &rate(),
            )
            .unwrap();
        let obligation_id = engine.obligations_for_event(event_id)[0].id();
        let payment_id = engine
            .submit_payment(obligation_id, dec!(60), Currency::Usd, None, &rate())
            .unwrap();
        engine.approve_payment(payment_id).unwrap();

        assert_eq!(
            engine.balance(&project_id, &ParticipantId::new("P1"), Currency::Usd),
            Decimal::ZERO
        );
        assert_eq!(
            engine.cost_event_status(event_id).unwrap(),
            CostEventStatus::Partial
        );
    }

    #[test]
    fn test_contribution_approval_credits_balance() {
        let (mut engine, project_id) = engine_with_project();
        let event_id = engine
            .create_cost_event(
                &project_id,
                "Aporte marzo",
                dec!(90),
                Currency::Ars,
                true,
                None,
                &rate(),
            )
            .unwrap();
        for obligation in engine
            .obligations_for_event(event_id)
            .iter()
            .map(|o| o.id())
            .collect::<Vec<_>>()
        {
            let due = engine.obligation(obligation).unwrap().amount_due();
            let payment_id = engine
                .submit_payment(obligation, due.amount(), Currency::Ars, None, &rate())
                .unwrap();
            engine.approve_payment(payment_id).unwrap();
        }
        assert_eq!(
            engine.balance(&project_id, &ParticipantId::new("P1"), Currency::Ars),
            dec!(54.00)
        );
        assert_eq!(
            engine.balance(&project_id, &ParticipantId::new("P2"), Currency::Ars),
            dec!(36.00)
        );
    }

    #[test]
    fn test_edit_voids_and_reissues_open_obligations() {
        let (mut engine, project_id) = engine_with_project();
        let event_id = engine
            .create_cost_event(
                &project_id,
                "Cemento",
                dec!(100),
                Currency::Usd,
                false,
                None,
                &rate(),
            )
            .unwrap();
        let old_ids: Vec<Uuid> = engine
            .obligations_for_event(event_id)
            .iter()
            .map(|o| o.id())
            .collect();

        engine
            .edit_cost_event(event_id, Some(dec!(200)), None, None, &rate())
            .unwrap();

        let obligations = engine.obligations_for_event(event_id);
        assert_eq!(obligations.len(), 2);
        assert_eq!(obligations[0].amount_due().amount(), dec!(120.00));
        assert_eq!(obligations[1].amount_due().amount(), dec!(80.00));
        for old_id in old_ids {
            assert!(engine.obligation(old_id).is_err());
        }
    }

    #[test]
    fn test_edit_refused_after_approval() {
        let (mut engine, project_id) = engine_with_project();
        let event_id = engine
            .create_cost_event(
                &project_id,
                "Cemento",
                dec!(100),
                Currency::Usd,
                false,
                None,
                &rate(),
            )
            .unwrap();
        let obligation_id = engine.obligations_for_event(event_id)[0].id();
        let payment_id = engine
            .submit_payment(obligation_id, dec!(60), Currency::Usd, None, &rate())
            .unwrap();
        engine.approve_payment(payment_id).unwrap();

        let result = engine.edit_cost_event(event_id, Some(dec!(200)), None, None, &rate());
        assert_eq!(
            result,
            Err(EngineError::Payment(PaymentError::ObligationAlreadySettled {
                obligation_id
            }))
        );
    }

    #[test]
    fn test_soft_delete_excludes_from_summary_until_restore() {
        let (mut engine, project_id) = engine_with_project();
        let event_id = engine
            .create_cost_event(
                &project_id,
                "Cemento",
                dec!(100),
                Currency::Usd,
                false,
                None,
                &rate(),
            )
            .unwrap();
        let p1 = ParticipantId::new("P1");

        let summary = engine.payment_summary(&project_id, &p1).unwrap();
        assert_eq!(summary.due.usd, dec!(60.00));

        engine.soft_delete_cost_event(event_id).unwrap();
        let summary = engine.payment_summary(&project_id, &p1).unwrap();
        assert_eq!(summary.due.usd, Decimal::ZERO);
        assert_eq!(
            engine.soft_delete_cost_event(event_id),
            Err(EngineError::AlreadyDeleted { id: event_id })
        );

        engine.restore_cost_event(event_id).unwrap();
        let summary = engine.payment_summary(&project_id, &p1).unwrap();
        assert_eq!(summary.due.usd, dec!(60.00));
        assert_eq!(
            engine.restore_cost_event(event_id),
            Err(EngineError::NotDeleted { id: event_id })
        );
    }

    #[test]
    fn test_individual_project_auto_approves() {
        let mut engine = SettlementEngine::new();
        let project_id = ProjectId::new("solo");
        engine.add_project(
            Project::new("solo", "Solo")
                .individual()
                .with_member(Participant::new("P1", dec!(100))),
        );
        let event_id = engine
            .create_cost_event(
                &project_id,
                "Gasto propio",
                dec!(50),
                Currency::Ars,
                false,
                None,
                &rate(),
            )
            .unwrap();
        let obligation_id = engine.obligations_for_event(event_id)[0].id();
        let payment_id = engine
            .submit_payment(obligation_id, dec!(50), Currency::Ars, None, &rate())
            .unwrap();
        assert!(engine.payment(payment_id).unwrap().is_approved());
        assert_eq!(
            engine.cost_event_status(event_id).unwrap(),
            CostEventStatus::Paid
        );
    }

    #[test]
    fn test_current_account_settles_covered_share() {
        let mut engine = SettlementEngine::new();
        let project_id = ProjectId::new("cc");
        engine.add_project(
            Project::new("cc", "Cuenta corriente")
                .current_account()
                .with_member(Participant::new("P1", dec!(60)))
                .with_member(Participant::new("P2", dec!(40))),
        );
        let p1 = ParticipantId::new("P1");
        engine
            .adjust_balance(
                &project_id,
                &p1,
                Money::new(dec!(54), Currency::Ars),
                "saldo inicial",
            )
            .unwrap();

        let event_id = engine
            .create_cost_event(
                &project_id,
                "Gasto",
                dec!(54),
                Currency::Ars,
                false,
                None,
                &rate(),
            )
            .unwrap();

        // P1's 32.40 share is covered and settles from balance;
        // P2's 21.60 share has no credit and stays pending.
        let obligations = engine.obligations_for_event(event_id);
        let p1_payment = engine.payment_for_obligation(obligations[0].id()).unwrap();
        assert!(p1_payment.is_approved());
        assert_eq!(engine.balance(&project_id, &p1, Currency::Ars), dec!(21.60));

        let p2_payment = engine.payment_for_obligation(obligations[1].id()).unwrap();
        assert!(!p2_payment.is_approved());
    }

    #[test]
    fn test_adjust_balance_requires_membership() {
        let (mut engine, project_id) = engine_with_project();
        let result = engine.adjust_balance(
            &project_id,
            &ParticipantId::new("P9"),
            Money::new(dec!(10), Currency::Ars),
            "ajuste",
        );
        assert!(matches!(result, Err(EngineError::NotFound { .. })));
    }

    #[test]
    fn test_not_found_lookups() {
        let engine = SettlementEngine::new();
        assert!(matches!(
            engine.cost_event(Uuid::new_v4()),
            Err(EngineError::NotFound { .. })
        ));
        assert!(matches!(
            engine.payment(Uuid::new_v4()),
            Err(EngineError::NotFound { .. })
        ));
        assert!(matches!(
            engine.project(&ProjectId::new("nope")),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[test]
    fn test_poll_flow_through_engine() {
        let (mut engine, project_id) = engine_with_project();
        let poll_id = engine
            .create_poll(&project_id, "¿Proveedor nuevo?", vec!["Sí".into(), "No".into()])
            .unwrap();
        engine.cast_vote(poll_id, &ParticipantId::new("P1"), 0).unwrap();
        engine.cast_vote(poll_id, &ParticipantId::new("P2"), 1).unwrap();

        let tallies = engine.tally(poll_id).unwrap();
        assert_eq!(tallies[0].weight, dec!(60));
        assert_eq!(tallies[1].weight, dec!(40));
        assert_eq!(engine.winning_options(poll_id).unwrap(), vec![0]);

        let outsider = ParticipantId::new("P9");
        assert!(matches!(
            engine.cast_vote(poll_id, &outsider, 0),
            Err(EngineError::NotFound { .. })
        ));
    }
}
