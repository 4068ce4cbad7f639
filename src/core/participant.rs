use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a participant in a project.
///
/// # Examples
///
/// ```
/// use settlement_ledger::core::participant::ParticipantId;
///
/// let p1 = ParticipantId::new("P1");
/// let p2 = ParticipantId::new("P2");
/// assert_ne!(p1, p2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Unique identifier for a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A project member holding an ownership percentage.
///
/// The sum of `percentage` over a project's active members must equal 100
/// before any allocation is trusted; that invariant is checked by
/// [`crate::allocation::participation::validate_participation`], never
/// silently corrected here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    id: ParticipantId,
    /// Ownership share in [0, 100].
    percentage: Decimal,
    active: bool,
}

impl Participant {
    /// Create an active participant with the given ownership percentage.
    pub fn new(id: impl Into<ParticipantId>, percentage: Decimal) -> Self {
        Self {
            id: id.into(),
            percentage,
            active: true,
        }
    }

    /// Mark the participant inactive (keeps the recorded percentage).
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    pub fn percentage(&self) -> Decimal {
        self.percentage
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// A project: a roster of participants plus settlement policy flags.
///
/// The roster itself is owned by project-membership management outside
/// this crate; the engine consumes a snapshot of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    id: ProjectId,
    name: String,
    /// Single-participant mode: submitted payments auto-approve,
    /// skipping human review.
    individual: bool,
    /// Current-account mode: expense obligations are settled from the
    /// participant's balance when the credit covers them in full.
    current_account: bool,
    members: Vec<Participant>,
}

impl Project {
    pub fn new(id: impl Into<ProjectId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            individual: false,
            current_account: false,
            members: Vec::new(),
        }
    }

    /// Enable auto-approval of submitted payments.
    pub fn individual(mut self) -> Self {
        self.individual = true;
        self
    }

    /// Enable settling expense obligations from balance credit.
    pub fn current_account(mut self) -> Self {
        self.current_account = true;
        self
    }

    pub fn with_member(mut self, member: Participant) -> Self {
        self.members.push(member);
        self
    }

    pub fn set_members(&mut self, members: Vec<Participant>) {
        self.members = members;
    }

    pub fn id(&self) -> &ProjectId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_individual(&self) -> bool {
        self.individual
    }

    pub fn is_current_account(&self) -> bool {
        self.current_account
    }

    pub fn members(&self) -> &[Participant] {
        &self.members
    }

    pub fn member(&self, id: &ParticipantId) -> Option<&Participant> {
        self.members.iter().find(|m| m.id() == id)
    }

    /// Active members with a positive share — the ones allocations go to.
    pub fn active_members(&self) -> impl Iterator<Item = &Participant> {
        self.members
            .iter()
            .filter(|m| m.is_active() && m.percentage() > Decimal::ZERO)
    }

    /// Snapshot of (participant, percentage) weights for allocation.
    pub fn weights(&self) -> Vec<(ParticipantId, Decimal)> {
        self.active_members()
            .map(|m| (m.id().clone(), m.percentage()))
            .collect()
    }
}
