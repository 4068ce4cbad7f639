//! # settlement-ledger
//!
//! Shared-cost settlement ledger for multi-participant projects.
//!
//! Given a project whose members hold ownership percentages, this engine
//! allocates multi-currency expenses and contributions into exact
//! per-participant obligations, tracks each participant's running balance,
//! and drives every payment through a submission/approval workflow.
//!
//! ## Architecture
//!
//! - **core** — Foundational types: money, exchange rates, participants, cost events, obligations
//! - **allocation** — Exact percentage allocation and participation validation
//! - **ledger** — Per-participant balance accounts with auditable entries
//! - **settlement** — Payment state machine and the orchestrating engine
//! - **voting** — Weighted voting tally built on the same percentage weighting

pub mod allocation;
pub mod core;
pub mod ledger;
pub mod settlement;
pub mod voting;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::allocation::engine::allocate;
    pub use crate::allocation::participation::{validate_participation, Participation};
    pub use crate::core::cost_event::CostEvent;
    pub use crate::core::currency::{Currency, ExchangeRate, Money};
    pub use crate::core::obligation::Obligation;
    pub use crate::core::participant::{Participant, ParticipantId, Project, ProjectId};
    pub use crate::ledger::balance::{BalanceAccount, SettleOutcome};
    pub use crate::settlement::engine::{EngineError, SettlementEngine};
    pub use crate::settlement::payment::{Payment, PaymentStatus};
    pub use crate::voting::tally::Poll;
}
