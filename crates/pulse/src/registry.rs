// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Optional process-wide [`Pulse`] for programs that do not want to pass one
//! around. Nothing in the crate depends on it.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::Config;
use crate::error::PulseError;
use crate::pulse::Pulse;
use crate::store::Store;

static DEFAULT: Registry = Registry::new();

/// Holds at most one [`Pulse`].
///
/// Starts are serialized: only the first successful `start` constructs a
/// Pulse, so a caller losing the race never touches its store or backup
/// directory.
pub(crate) struct Registry {
    pulse: OnceCell<Pulse>,
}

impl Registry {
    pub(crate) const fn new() -> Self {
        Self {
            pulse: OnceCell::const_new(),
        }
    }

    pub(crate) async fn start(
        &self,
        config: Config,
        store: Arc<dyn Store>,
    ) -> Result<Pulse, PulseError> {
        if self.pulse.initialized() {
            return Err(PulseError::AlreadyStarted);
        }

        let mut created = false;
        let pulse = self
            .pulse
            .get_or_try_init(|| {
                created = true;
                Pulse::new(config, store)
            })
            .await?;
        if !created {
            return Err(PulseError::AlreadyStarted);
        }
        debug!("PULSE | Default instance started");
        Ok(pulse.clone())
    }

    pub(crate) fn client(&self) -> Result<Pulse, PulseError> {
        self.pulse.get().cloned().ok_or(PulseError::NoPulse)
    }
}

/// Creates the process-wide Pulse. Fails with [`PulseError::AlreadyStarted`]
/// if one exists, including when a concurrent `start` won the race. A failed
/// start leaves the registry empty.
pub async fn start(config: Config, store: Arc<dyn Store>) -> Result<Pulse, PulseError> {
    DEFAULT.start(config, store).await
}

/// The process-wide Pulse, or [`PulseError::NoPulse`] before [`start`].
pub fn client() -> Result<Pulse, PulseError> {
    DEFAULT.client()
}
