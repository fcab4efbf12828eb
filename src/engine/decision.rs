//! Candidate matches and the pure tie-break algorithm
//!
//! Resolution over a candidate list is a pure function so it can be tested
//! in isolation from file I/O and inheritance traversal. The ordering
//! contract: specificity descending, then owning-group weight descending,
//! then deny before allow. An empty candidate list is an implicit deny.

use serde::Serialize;

use crate::types::GroupId;

/// One stored pattern that matched the requested node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// The stored pattern that matched
    pub pattern: String,

    /// Group the pattern was granted in
    #[serde(rename = "groupId")]
    pub group_id: GroupId,

    /// `true` allow, `false` explicit deny
    pub value: bool,

    /// Specificity of the pattern
    pub specificity: u32,

    /// Weight of the owning group
    pub weight: i64,
}

/// Sort candidates into tie-break order: the winner first.
///
/// Trailing keys (pattern, then group id) carry no semantic weight; they
/// keep trace output deterministic when true ties occur.
pub fn rank(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.specificity
            .cmp(&a.specificity)
            .then_with(|| b.weight.cmp(&a.weight))
            // deny (false) sorts before allow (true)
            .then_with(|| a.value.cmp(&b.value))
            .then_with(|| a.pattern.cmp(&b.pattern))
            .then_with(|| a.group_id.cmp(&b.group_id))
    });
}

/// The single winning candidate, or `None` for implicit deny.
///
/// Expects `candidates` already ranked by [`rank`].
pub fn winner(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.first()
}

/// Diagnostic record of one full resolution: every candidate considered,
/// in tie-break order, plus the decision and the inheritance chain walked.
/// Transient; computed per call, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionTrace {
    /// Requesting user, when resolution started from a user id
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Role the user resolved to
    pub role: String,

    /// The requested node
    pub node: String,

    /// Final decision
    pub result: bool,

    /// Flattened inheritance chain that was walked
    #[serde(rename = "inheritanceChain")]
    pub inheritance_chain: Vec<GroupId>,

    /// Every candidate match, winner first
    pub matches: Vec<Candidate>,
}
