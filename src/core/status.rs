//! Document lifecycle state machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Processing status of an electronic document.
///
/// Transitions advance monotonically through the pipeline; terminal states
/// are frozen. `FailedTransport` sits at the same rank as `Submitted` so the
/// retry transition back to `Submitted` never moves a document backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    /// Admitted and persisted as a draft.
    Received,
    /// UBL built and XAdES signature produced.
    Signed,
    /// Accepted by the SOAP endpoint, ticket assigned.
    Submitted,
    /// Network failure during submission; retriable.
    FailedTransport,
    /// CDR returned response code "0". Terminal.
    Accepted,
    /// CDR returned a 2000–3999 observation code. Terminal.
    AcceptedWithObservations,
    /// CDR error code or SOAP fault for an invalid payload. Terminal.
    Rejected,
}

/// Attempted transition into an earlier pipeline stage or out of a
/// terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid status transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: DocumentStatus,
    pub to: DocumentStatus,
}

impl DocumentStatus {
    /// Whether this status can never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Accepted | Self::AcceptedWithObservations | Self::Rejected
        )
    }

    /// Position in the pipeline ordering. Statuses may only move to an
    /// equal or greater rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Received => 0,
            Self::Signed => 1,
            Self::Submitted | Self::FailedTransport => 2,
            Self::Accepted | Self::AcceptedWithObservations | Self::Rejected => 3,
        }
    }

    /// Check that moving to `next` is legal, returning the new status.
    pub fn advance(self, next: DocumentStatus) -> Result<DocumentStatus, InvalidTransition> {
        if self.is_terminal() && self != next {
            return Err(InvalidTransition {
                from: self,
                to: next,
            });
        }
        if next.rank() < self.rank() {
            return Err(InvalidTransition {
                from: self,
                to: next,
            });
        }
        Ok(next)
    }
}
