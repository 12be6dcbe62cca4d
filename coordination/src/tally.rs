//! Tally engine
//!
//! Pure aggregation of recorded votes into counts, percentages, and
//! pass/fail/tie verdicts. Nothing here mutates coordination state; the
//! round coordinator hands in snapshots of its tables and renders the rows.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};
use crate::identity::IdentityId;
use crate::round::ProposalSubmission;

/// A single ballot choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
}

impl std::fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoteChoice::Yes => write!(f, "yes"),
            VoteChoice::No => write!(f, "no"),
            VoteChoice::Abstain => write!(f, "abstain"),
        }
    }
}

impl std::str::FromStr for VoteChoice {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(VoteChoice::Yes),
            "no" => Ok(VoteChoice::No),
            "abstain" => Ok(VoteChoice::Abstain),
            other => Err(SessionError::invalid_input(format!(
                "invalid vote choice '{}', expected yes, no, or abstain",
                other
            ))),
        }
    }
}

/// Outcome of a tallied proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
    Tied,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Passed => write!(f, "passed"),
            Verdict::Failed => write!(f, "failed"),
            Verdict::Tied => write!(f, "tied"),
        }
    }
}

/// Raw yes/no/abstain counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounts {
    pub yes: u32,
    pub no: u32,
    pub abstain: u32,
}

impl VoteCounts {
    pub fn new(yes: u32, no: u32, abstain: u32) -> Self {
        Self { yes, no, abstain }
    }

    pub fn total(&self) -> u32 {
        self.yes + self.no + self.abstain
    }

    /// Abstentions never decide the outcome
    pub fn verdict(&self) -> Verdict {
        if self.yes > self.no {
            Verdict::Passed
        } else if self.no > self.yes {
            Verdict::Failed
        } else {
            Verdict::Tied
        }
    }

    /// Tied with at least one decisive vote; 0-0 means nobody voted
    pub fn is_tied(&self) -> bool {
        self.yes == self.no && self.yes > 0
    }
}

/// Per-proposer counts plus the set of identities that voted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub yes: u32,
    pub no: u32,
    pub abstain: u32,
    pub voters: BTreeSet<IdentityId>,
}

impl VoteTally {
    /// Record a ballot. With `dedupe` set, a second ballot from the same
    /// voter is rejected and leaves the counts untouched.
    pub fn record(
        &mut self,
        voter: IdentityId,
        choice: VoteChoice,
        dedupe: bool,
    ) -> SessionResult<()> {
        if dedupe && self.voters.contains(&voter) {
            return Err(SessionError::duplicate(
                "you have already voted on this proposal",
            ));
        }

        match choice {
            VoteChoice::Yes => self.yes += 1,
            VoteChoice::No => self.no += 1,
            VoteChoice::Abstain => self.abstain += 1,
        }
        self.voters.insert(voter);
        Ok(())
    }

    pub fn has_voted(&self, voter: IdentityId) -> bool {
        self.voters.contains(&voter)
    }

    pub fn counts(&self) -> VoteCounts {
        VoteCounts::new(self.yes, self.no, self.abstain)
    }
}

/// Rounded percentage of `count` in `total`, 0 when nothing was cast.
///
/// Halves round to even (12.5 -> 12, 37.5 -> 38).
pub fn percent(count: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (count as f64 / total as f64 * 100.0).round_ties_even() as u32
}

/// One rendered line of a results table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictRow {
    pub proposer_id: IdentityId,
    pub title: String,
    pub description: String,
    pub proposed_by: String,
    pub yes: u32,
    pub no: u32,
    pub abstain: u32,
    pub total_votes: u32,
    pub yes_percent: u32,
    pub no_percent: u32,
    pub abstain_percent: u32,
    pub status: Verdict,
}

impl VerdictRow {
    pub fn new(submission: &ProposalSubmission, counts: VoteCounts) -> Self {
        let total = counts.total();
        Self {
            proposer_id: submission.author_id,
            title: submission.title.clone(),
            description: submission.description.clone(),
            proposed_by: submission.author_name.clone(),
            yes: counts.yes,
            no: counts.no,
            abstain: counts.abstain,
            total_votes: total,
            yes_percent: percent(counts.yes, total),
            no_percent: percent(counts.no, total),
            abstain_percent: percent(counts.abstain, total),
            status: counts.verdict(),
        }
    }
}

/// A proposal whose first vote ended yes == no > 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiedProposal {
    pub proposer_id: IdentityId,
    pub title: String,
    pub description: String,
    pub proposed_by: String,
}

impl From<&ProposalSubmission> for TiedProposal {
    fn from(submission: &ProposalSubmission) -> Self {
        Self {
            proposer_id: submission.author_id,
            title: submission.title.clone(),
            description: submission.description.clone(),
            proposed_by: submission.author_name.clone(),
        }
    }
}

fn sort_by_yes(rows: &mut [VerdictRow]) {
    // stable: equal yes counts keep proposer order
    rows.sort_by(|a, b| b.yes.cmp(&a.yes));
}

/// Verdict rows for every submission, most yes votes first
pub fn aggregate_results(
    submissions: &BTreeMap<IdentityId, ProposalSubmission>,
    tallies: &BTreeMap<IdentityId, VoteTally>,
) -> Vec<VerdictRow> {
    let mut rows: Vec<VerdictRow> = submissions
        .iter()
        .map(|(proposer, submission)| {
            let counts = tallies
                .get(proposer)
                .map(VoteTally::counts)
                .unwrap_or_default();
            VerdictRow::new(submission, counts)
        })
        .collect();

    sort_by_yes(&mut rows);
    rows
}

/// Final verdict rows, preferring a proposer's tiebreak tally over the first vote
pub fn final_results(
    submissions: &BTreeMap<IdentityId, ProposalSubmission>,
    tiebreak_tallies: &BTreeMap<IdentityId, VoteTally>,
    submission_tallies: &BTreeMap<IdentityId, VoteTally>,
) -> Vec<VerdictRow> {
    let mut rows: Vec<VerdictRow> = submissions
        .iter()
        .map(|(proposer, submission)| {
            let counts = tiebreak_tallies
                .get(proposer)
                .or_else(|| submission_tallies.get(proposer))
                .map(VoteTally::counts)
                .unwrap_or_default();
            VerdictRow::new(submission, counts)
        })
        .collect();

    sort_by_yes(&mut rows);
    rows
}

/// Submissions whose tally is tied, in proposer order
pub fn tied_proposals(
    submissions: &BTreeMap<IdentityId, ProposalSubmission>,
    tallies: &BTreeMap<IdentityId, VoteTally>,
) -> Vec<TiedProposal> {
    submissions
        .iter()
        .filter(|(proposer, _)| {
            tallies
                .get(proposer)
                .is_some_and(|tally| tally.counts().is_tied())
        })
        .map(|(_, submission)| TiedProposal::from(submission))
        .collect()
}
