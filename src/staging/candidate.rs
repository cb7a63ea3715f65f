//! Case law staging.
//!
//! Records which scrubbed, provenance-sealed traces are candidates for
//! publication in the curated compendium. The curation workflow owns
//! these rows; it only reads trace data and is cascaded away when a
//! trace is deleted, never the reverse.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;

/// Workflow status. Pending is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    Pending,
    Approved,
    Rejected,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Pending => "pending",
            CandidateStatus::Approved => "approved",
            CandidateStatus::Rejected => "rejected",
        }
    }
}

/// A staged publication candidate referencing a trace by (id, timestamp).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseLawCandidate {
    pub candidate_id: String,
    pub trace_id: String,
    pub trace_timestamp: DateTime<Utc>,
    /// Pattern classification assigned at staging time.
    pub pattern_class: String,
    pub status: CandidateStatus,
    pub created_at: DateTime<Utc>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    /// External compendium identifier, set on publication.
    pub compendium_id: Option<String>,
}

impl CaseLawCandidate {
    pub fn new(trace_id: &str, trace_timestamp: DateTime<Utc>, pattern_class: &str) -> Self {
        Self {
            candidate_id: format!("clc-{}", &Uuid::new_v4().to_string()[..8]),
            trace_id: trace_id.to_string(),
            trace_timestamp,
            pattern_class: pattern_class.to_string(),
            status: CandidateStatus::Pending,
            created_at: Utc::now(),
            published: false,
            published_at: None,
            compendium_id: None,
        }
    }

    /// pending -> approved. Terminal states never transition again.
    pub fn approve(&mut self) -> Result<(), PipelineError> {
        match self.status {
            CandidateStatus::Pending => {
                self.status = CandidateStatus::Approved;
                Ok(())
            }
            _ => Err(PipelineError::InvalidStatusTransition {
                from: self.status.as_str(),
                to: "approved",
            }),
        }
    }

    /// pending -> rejected.
    pub fn reject(&mut self) -> Result<(), PipelineError> {
        match self.status {
            CandidateStatus::Pending => {
                self.status = CandidateStatus::Rejected;
                Ok(())
            }
            _ => Err(PipelineError::InvalidStatusTransition {
                from: self.status.as_str(),
                to: "rejected",
            }),
        }
    }

    /// Record publication metadata. Only approved candidates publish.
    pub fn mark_published(&mut self, compendium_id: &str) -> Result<(), PipelineError> {
        if self.status != CandidateStatus::Approved {
            return Err(PipelineError::InvalidStatusTransition {
                from: self.status.as_str(),
                to: "published",
            });
        }
        self.published = true;
        self.published_at = Some(Utc::now());
        self.compendium_id = Some(compendium_id.to_string());
        Ok(())
    }
}

/// In-memory staging ledger. Doubles as the explicit referential-
/// integrity hook when the storage layer cannot enforce the cascade.
#[derive(Debug, Default)]
pub struct StagingLedger {
    candidates: RwLock<Vec<CaseLawCandidate>>,
}

impl StagingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self, candidate: CaseLawCandidate) {
        log::info!(
            "CANDIDATE_STAGED candidate_id={} trace_id={} pattern_class={}",
            candidate.candidate_id,
            candidate.trace_id,
            candidate.pattern_class
        );
        self.candidates.write().push(candidate);
    }

    /// Candidates with the given status, most recent first.
    pub fn list_by_status(&self, status: CandidateStatus) -> Vec<CaseLawCandidate> {
        let mut out: Vec<_> = self
            .candidates
            .read()
            .iter()
            .filter(|c| c.status == status)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Candidates with the given pattern classification, most recent first.
    pub fn list_by_pattern(&self, pattern_class: &str) -> Vec<CaseLawCandidate> {
        let mut out: Vec<_> = self
            .candidates
            .read()
            .iter()
            .filter(|c| c.pattern_class == pattern_class)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Apply a closure to one candidate under the write lock.
    pub fn update<F>(&self, candidate_id: &str, f: F) -> Result<(), PipelineError>
    where
        F: FnOnce(&mut CaseLawCandidate) -> Result<(), PipelineError>,
    {
        let mut candidates = self.candidates.write();
        match candidates.iter_mut().find(|c| c.candidate_id == candidate_id) {
            Some(candidate) => f(candidate),
            None => Err(PipelineError::UnknownCandidate {
                candidate_id: candidate_id.to_string(),
            }),
        }
    }

    /// Cascade hook: removes every candidate referencing the deleted
    /// trace. Returns the number removed.
    pub fn on_trace_deleted(&self, trace_id: &str, trace_timestamp: DateTime<Utc>) -> usize {
        let mut candidates = self.candidates.write();
        let before = candidates.len();
        candidates.retain(|c| !(c.trace_id == trace_id && c.trace_timestamp == trace_timestamp));
        let removed = before - candidates.len();
        if removed > 0 {
            log::info!(
                "CANDIDATES_CASCADED trace_id={} removed={}",
                trace_id,
                removed
            );
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.candidates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.read().is_empty()
    }
}
