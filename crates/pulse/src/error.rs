// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Failure reported by a [`crate::store::Store`].
///
/// Stores are external collaborators, so the error only carries their message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors returned to callers of a [`crate::Pulse`]
#[derive(Debug, thiserror::Error)]
pub enum PulseError {
    #[error("pulse: requested time already expired")]
    Expired,

    #[error("pulse: store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("pulse: invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("pulse: runtime error: {0}")]
    Runtime(String),

    #[error("pulse: no Pulse was initialized")]
    NoPulse,

    #[error("pulse: a Pulse was already started")]
    AlreadyStarted,
}
