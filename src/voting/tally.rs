use crate::allocation::engine::total_weight;
use crate::core::participant::{Participant, ParticipantId, ProjectId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

/// Errors arising from voting operations.
#[derive(Debug, Error, PartialEq)]
pub enum VoteError {
    #[error("participant {participant_id} has already voted in this poll")]
    AlreadyVoted { participant_id: ParticipantId },
    #[error("unknown vote option {option_id}")]
    OptionNotFound { option_id: u32 },
    #[error("participant {participant_id} has no vote to reset")]
    VoteNotFound { participant_id: ParticipantId },
}

/// One choice in a poll, with the set of participants who picked it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteOption {
    id: u32,
    label: String,
    voters: BTreeSet<ParticipantId>,
}

impl VoteOption {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn voters(&self) -> &BTreeSet<ParticipantId> {
        &self.voters
    }
}

/// Tally line for one option: weight is the sum of the voters'
/// ownership percentages, not the raw vote count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionTally {
    pub option_id: u32,
    pub label: String,
    pub weight: Decimal,
    pub voter_count: usize,
}

/// A weighted poll attached to a project.
///
/// A participant holds at most one vote per poll, and a cast vote is
/// irreversible by the voter: only an admin reset removes it and
/// re-enables voting. Tally weights reuse the allocation engine's
/// percentage weighting, so a 50% owner's vote counts 50, not 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    id: Uuid,
    project_id: ProjectId,
    question: String,
    options: Vec<VoteOption>,
    created_at: DateTime<Utc>,
}

impl Poll {
    pub fn new(
        project_id: ProjectId,
        question: impl Into<String>,
        option_labels: Vec<String>,
    ) -> Self {
        let options = option_labels
            .into_iter()
            .enumerate()
            .map(|(i, label)| VoteOption {
                id: i as u32,
                label,
                voters: BTreeSet::new(),
            })
            .collect();
        Self {
            id: Uuid::new_v4(),
            project_id,
            question: question.into(),
            options,
            created_at: Utc::now(),
        }
    }

    /// Create a poll with a specific ID (useful for testing / determinism).
    pub fn with_id(
        id: Uuid,
        project_id: ProjectId,
        question: impl Into<String>,
        option_labels: Vec<String>,
    ) -> Self {
        let mut poll = Self::new(project_id, question, option_labels);
        poll.id = id;
        poll
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn options(&self) -> &[VoteOption] {
        &self.options
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the participant has a vote anywhere in this poll.
    pub fn has_voted(&self, participant_id: &ParticipantId) -> bool {
        self.options
            .iter()
            .any(|o| o.voters.contains(participant_id))
    }

    /// Cast a vote. One vote per participant per poll; a second cast
    /// fails with `AlreadyVoted` even for a different option.
    pub fn cast_vote(
        &mut self,
        participant_id: &ParticipantId,
        option_id: u32,
    ) -> Result<(), VoteError> {
        if self.has_voted(participant_id) {
            return Err(VoteError::AlreadyVoted {
                participant_id: participant_id.clone(),
            });
        }
        let option = self
            .options
            .iter_mut()
            .find(|o| o.id == option_id)
            .ok_or(VoteError::OptionNotFound { option_id })?;
        option.voters.insert(participant_id.clone());
        log::debug!("vote cast by {} for option {}", participant_id, option_id);
        Ok(())
    }

    /// Admin-only reset: remove the participant's vote, returning them
    /// to the not-voted state so they may vote again.
    pub fn reset_vote(&mut self, participant_id: &ParticipantId) -> Result<(), VoteError> {
        for option in &mut self.options {
            if option.voters.remove(participant_id) {
                log::debug!("vote by {} reset", participant_id);
                return Ok(());
            }
        }
        Err(VoteError::VoteNotFound {
            participant_id: participant_id.clone(),
        })
    }

    /// Tally every option against the roster. Weight per option is the
    /// percentage sum of its voters; participants missing from the
    /// roster weigh zero.
    pub fn tally(&self, roster: &[Participant]) -> Vec<OptionTally> {
        self.options
            .iter()
            .map(|option| {
                let voter_weights: Vec<(ParticipantId, Decimal)> = option
                    .voters
                    .iter()
                    .map(|voter| {
                        let pct = roster
                            .iter()
                            .find(|p| p.id() == voter)
                            .map(|p| p.percentage())
                            .unwrap_or(Decimal::ZERO);
                        (voter.clone(), pct)
                    })
                    .collect();
                OptionTally {
                    option_id: option.id,
                    label: option.label.clone(),
                    weight: total_weight(&voter_weights),
                    voter_count: option.voters.len(),
                }
            })
            .collect()
    }

    /// All options holding the maximum weight. Ties are reported, never
    /// broken here; with no votes cast the result is empty.
    pub fn winning_options(&self, roster: &[Participant]) -> Vec<u32> {
        let tallies = self.tally(roster);
        let max = tallies
            .iter()
            .map(|t| t.weight)
            .max()
            .unwrap_or(Decimal::ZERO);
        if max.is_zero() {
            return Vec::new();
        }
        tallies
            .iter()
            .filter(|t| t.weight == max)
            .map(|t| t.option_id)
            .collect()
    }
}
