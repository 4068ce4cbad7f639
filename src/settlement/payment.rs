use crate::core::currency::{ExchangeRate, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle of a payment settling one obligation.
///
/// ```text
/// Pending ──submit──▶ Submitted ──approve──▶ Approved   (terminal)
///                        │
///                      reject
///                        ▼
///                     Rejected ──submit──▶ Submitted    (resubmission)
/// ```
///
/// `Approved` is terminal: a correction requires a new adjustment entry,
/// never a mutation of the approved payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Submitted,
    Approved,
    Rejected,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Submitted => "submitted",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// Errors arising from payment state transitions.
///
/// Invalid transitions are reported to the caller, never silently
/// ignored, and never retried by the engine itself.
#[derive(Debug, Error, PartialEq)]
pub enum PaymentError {
    #[error("cannot {action} a payment in state {from}")]
    IllegalTransition {
        from: PaymentStatus,
        action: &'static str,
    },
    #[error("obligation {obligation_id} is already settled")]
    ObligationAlreadySettled { obligation_id: Uuid },
}

/// The settlement record tracking how one obligation gets paid and approved.
///
/// Submission records the paid amount, its dual-currency counterpart
/// converted at the effective rate, and the rate itself — figures that
/// stay mutually consistent because they are written together and never
/// touched again after approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    id: Uuid,
    obligation_id: Uuid,
    status: PaymentStatus,
    amount_paid: Option<Money>,
    /// The paid amount converted to the counterpart currency.
    reference_amount: Option<Money>,
    rate_used: Option<ExchangeRate>,
    submitted_at: Option<DateTime<Utc>>,
    approved_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl Payment {
    /// Create a pending payment for an obligation.
    pub fn new(obligation_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            obligation_id,
            status: PaymentStatus::Pending,
            amount_paid: None,
            reference_amount: None,
            rate_used: None,
            submitted_at: None,
            approved_at: None,
            rejection_reason: None,
            created_at: Utc::now(),
        }
    }

    /// Create a payment with a specific ID (useful for testing / determinism).
    pub fn with_id(id: Uuid, obligation_id: Uuid) -> Self {
        let mut payment = Self::new(obligation_id);
        payment.id = id;
        payment
    }

    /// Create a payment that is already approved, for settlements that
    /// bypass review: balance-mode settlement of an expense obligation.
    pub fn settled(
        obligation_id: Uuid,
        amount_paid: Money,
        reference_amount: Money,
        rate_used: ExchangeRate,
    ) -> Self {
        let now = Utc::now();
        let mut payment = Self::new(obligation_id);
        payment.status = PaymentStatus::Approved;
        payment.amount_paid = Some(amount_paid);
        payment.reference_amount = Some(reference_amount);
        payment.rate_used = Some(rate_used);
        payment.submitted_at = Some(now);
        payment.approved_at = Some(now);
        payment
    }

    // --- Accessors ---

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn obligation_id(&self) -> Uuid {
        self.obligation_id
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn amount_paid(&self) -> Option<Money> {
        self.amount_paid
    }

    pub fn reference_amount(&self) -> Option<Money> {
        self.reference_amount
    }

    pub fn rate_used(&self) -> Option<&ExchangeRate> {
        self.rate_used.as_ref()
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn is_approved(&self) -> bool {
        self.status == PaymentStatus::Approved
    }

    // --- Transitions ---

    /// Submit the payment for approval. Legal from `Pending` and
    /// `Rejected` (resubmission clears the prior rejection reason).
    ///
    /// A payment already `Approved` fails with `ObligationAlreadySettled`;
    /// a concurrent second submission observes `IllegalTransition`.
    pub fn submit(
        &mut self,
        amount_paid: Money,
        reference_amount: Money,
        rate_used: ExchangeRate,
    ) -> Result<(), PaymentError> {
        match self.status {
            PaymentStatus::Approved => Err(PaymentError::ObligationAlreadySettled {
                obligation_id: self.obligation_id,
            }),
            PaymentStatus::Submitted => Err(PaymentError::IllegalTransition {
                from: self.status,
                action: "submit",
            }),
            PaymentStatus::Pending | PaymentStatus::Rejected => {
                self.amount_paid = Some(amount_paid);
                self.reference_amount = Some(reference_amount);
                self.rate_used = Some(rate_used);
                self.submitted_at = Some(Utc::now());
                self.rejection_reason = None;
                self.status = PaymentStatus::Submitted;
                log::info!("payment {} submitted ({})", self.id, amount_paid);
                Ok(())
            }
        }
    }

    /// Approve a submitted payment. Irreversible.
    pub fn approve(&mut self) -> Result<(), PaymentError> {
        if self.status != PaymentStatus::Submitted {
            return Err(PaymentError::IllegalTransition {
                from: self.status,
                action: "approve",
            });
        }
        self.status = PaymentStatus::Approved;
        self.approved_at = Some(Utc::now());
        log::info!("payment {} approved", self.id);
        Ok(())
    }

    /// Reject a submitted payment, returning the obligation to a payable
    /// state. The reason is optional but kept for audit.
    pub fn reject(&mut self, reason: Option<String>) -> Result<(), PaymentError> {
        if self.status != PaymentStatus::Submitted {
            return Err(PaymentError::IllegalTransition {
                from: self.status,
                action: "reject",
            });
        }
        self.status = PaymentStatus::Rejected;
        self.amount_paid = None;
        self.reference_amount = None;
        self.rejection_reason = reason;
        log::info!("payment {} rejected", self.id);
        Ok(())
    }
}
