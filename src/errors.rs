// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the cluster import controller.
//!
//! Every failure in the import pipeline surfaces as an [`ImportError`]. None of them
//! are fatal to the process: the reconciler maps each one to a scheduled retry.
//!
//! The taxonomy follows how each failure resolves:
//!
//! - [`ImportError::NotFound`] - an expected, transient absence (e.g. a token secret
//!   the identity subsystem has not populated yet)
//! - [`ImportError::Conflict`] - a concurrent writer won the race; re-reading picks up
//!   the winner's state
//! - [`ImportError::Generation`] / [`ImportError::Validation`] - malformed template
//!   input or incomplete data to be written
//! - [`ImportError::Remote`] - building or using a client for a managed cluster failed

use std::time::Duration;
use thiserror::Error;

use crate::constants::{CONFLICT_RETRY_SECS, DEFAULT_RETRY_SECS};

/// Errors raised while importing a managed cluster.
#[derive(Error, Debug)]
pub enum ImportError {
    /// An object required by the current step does not exist (yet).
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Kind of the missing object
        kind: String,
        /// Namespaced name (`namespace/name`) or name of the missing object
        name: String,
    },

    /// The object was modified concurrently (HTTP 409 / stale resourceVersion).
    #[error("conflict writing {kind} '{name}'")]
    Conflict {
        /// Kind of the contended object
        kind: String,
        /// Namespaced name (`namespace/name`) or name of the contended object
        name: String,
    },

    /// The import bundle could not be generated from its templates and inputs.
    #[error("failed to generate import bundle: {reason}")]
    Generation {
        /// What was missing or malformed
        reason: String,
    },

    /// A write was rejected before reaching the store because it would be incomplete.
    #[error("validation failed: {reason}")]
    Validation {
        /// Why the write was rejected
        reason: String,
    },

    /// Building or using a client for a managed cluster failed.
    #[error("remote cluster error: {reason}")]
    Remote {
        /// Underlying failure
        reason: String,
    },

    /// Any other Kubernetes API failure.
    #[error(transparent)]
    Kube(#[from] kube::Error),

    /// An object could not be converted between its typed and dynamic forms.
    #[error("serialization failed: {reason}")]
    Serialization {
        /// Underlying serde failure
        reason: String,
    },
}

impl ImportError {
    /// Shorthand for [`ImportError::NotFound`].
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Shorthand for [`ImportError::Conflict`].
    pub fn conflict(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Conflict {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn generation(reason: impl Into<String>) -> Self {
        Self::Generation {
            reason: reason.into(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn remote(reason: impl Into<String>) -> Self {
        Self::Remote {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Kube(kube::Error::Api(ae)) => ae.code == 404,
            _ => false,
        }
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
            Self::Kube(kube::Error::Api(ae)) => ae.code == 409,
            _ => false,
        }
    }

    /// Default delay before retrying after this error: short for conflicts, since the
    /// next read sees the winner's write, and the standard pacing otherwise.
    ///
    /// The reconciler may lengthen this per step.
    #[must_use]
    pub fn retry_after(&self) -> Duration {
        if self.is_conflict() {
            Duration::from_secs(CONFLICT_RETRY_SECS)
        } else {
            Duration::from_secs(DEFAULT_RETRY_SECS)
        }
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            reason: e.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for ImportError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialization {
            reason: e.to_string(),
        }
    }
}
