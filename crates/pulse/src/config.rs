// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::PulseError;
use crate::recovery::ErrorHandler;
use crate::writer::LevelClassifier;

/// Configuration for creating a [`crate::Pulse`]
#[derive(Clone, Default)]
pub struct Config {
    /// Directory of the backup files written when the store rejects a batch.
    /// Only used when no `error_handler` is given.
    pub backup_dir: Option<PathBuf>,
    /// How long Beats and Hits are kept and queryable. Zero keeps them forever.
    pub expire: Duration,
    /// Replaces the default handler writing to `backup_dir`
    pub error_handler: Option<Arc<dyn ErrorHandler>>,
    /// Derives a Beat's level from the written line. Defaults to an empty level.
    pub level_classifier: Option<LevelClassifier>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("backup_dir", &self.backup_dir)
            .field("expire", &self.expire)
            .field("error_handler", &self.error_handler.is_some())
            .field("level_classifier", &self.level_classifier.is_some())
            .finish()
    }
}

impl Config {
    /// Create configuration from environment variables
    ///
    /// `PULSE_BACKUP_DIR` sets the backup directory and `PULSE_EXPIRE_SECS`
    /// the expiration in seconds.
    pub fn from_env() -> Result<Self, PulseError> {
        let backup_dir = env::var_os("PULSE_BACKUP_DIR")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);
        let expire = match env::var("PULSE_EXPIRE_SECS") {
            Ok(secs) => secs.trim().parse::<u64>().map(Duration::from_secs).map_err(|e| {
                PulseError::ConfigInvalid(format!("PULSE_EXPIRE_SECS '{secs}' is not a number: {e}"))
            })?,
            Err(_) => Duration::ZERO,
        };

        let config = Self {
            backup_dir,
            expire,
            ..Default::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), PulseError> {
        if self.error_handler.is_some() {
            return Ok(());
        }

        match &self.backup_dir {
            None => Err(PulseError::ConfigInvalid(
                "either a backup directory or an error handler must be specified".to_string(),
            )),
            Some(dir) if dir.as_os_str().is_empty() => Err(PulseError::ConfigInvalid(
                "backup directory cannot be empty".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }
}
