// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Pressgate.

use thiserror::Error;

use crate::types::FailureKind;

/// Top-level error type for all Pressgate operations.
#[derive(Debug, Error)]
pub enum PressgateError {
    // -- Configuration --
    /// The device registry could not be read or parsed. Callers substitute
    /// the built-in default instead of propagating this.
    #[error("printer configuration unavailable: {0}")]
    ConfigUnavailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -- Resolution --
    #[error("no printer available")]
    NoDeviceAvailable,

    // -- Source / rendering --
    #[error("image source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("image could not be rendered: {0}")]
    RenderFailure(String),

    // -- Submission --
    /// The spooler did not acknowledge in time. The job may still print.
    #[error("submission to '{device}' timed out after {after_secs}s (outcome uncertain)")]
    SubmissionTimeout { device: String, after_secs: u64 },

    #[error("print spooler error: {0}")]
    Spooler(String),

    #[error("print gateway error: {0}")]
    TransportFailure(String),

    // -- Cleanup --
    #[error("reconciling '{device}' failed: {detail}")]
    ReconcileFailure { device: String, detail: String },

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PressgateError {
    /// Map the error onto the failure kind reported in a `JobResult`.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::NoDeviceAvailable => FailureKind::NoDeviceAvailable,
            Self::SourceUnavailable(_) => FailureKind::SourceUnavailable,
            Self::RenderFailure(_) => FailureKind::RenderFailure,
            Self::SubmissionTimeout { .. } => FailureKind::SubmissionTimeout,
            Self::TransportFailure(_) => FailureKind::TransportFailure,
            Self::Spooler(_)
            | Self::ReconcileFailure { .. }
            | Self::ConfigUnavailable(_)
            | Self::InvalidConfig(_)
            | Self::Io(_)
            | Self::Serialization(_) => FailureKind::SubmissionFailed,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PressgateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_uncertain_kind() {
        let err = PressgateError::SubmissionTimeout {
            device: "Canon_A".into(),
            after_secs: 30,
        };
        assert_eq!(err.failure_kind(), FailureKind::SubmissionTimeout);
        assert!(err.to_string().contains("Canon_A"));
        assert!(err.to_string().contains("uncertain"));
    }

    #[test]
    fn spooler_errors_are_submission_failures() {
        let err = PressgateError::Spooler("lp: printer is disabled".into());
        assert_eq!(err.failure_kind(), FailureKind::SubmissionFailed);
    }
}
