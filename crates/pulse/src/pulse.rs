// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The [`Pulse`] handle shared by every producer and reader.

use chrono::TimeDelta;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

use crate::buffer::IngestBuffer;
use crate::config::Config;
use crate::constants::BUFFER_SIZE;
use crate::error::PulseError;
use crate::flusher::Flusher;
use crate::middleware::HitLayer;
use crate::record::{Beat, Category, Hit};
use crate::recovery::{BackupHandler, ErrorHandler};
use crate::store::Store;
use crate::writer::{default_level, BeatWriter, LevelClassifier};

/// Buffers Beats and Hits and flushes them to a [`Store`].
///
/// Cloning is cheap and every clone feeds the same buffers, so one `Pulse` can
/// be handed to the HTTP middleware, the log writer, and query callers alike.
#[derive(Clone)]
pub struct Pulse {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) beats: IngestBuffer<Beat>,
    pub(crate) hits: IngestBuffer<Hit>,
    pub(crate) flusher: Flusher,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) expire: Option<TimeDelta>,
    pub(crate) level_classifier: LevelClassifier,
}

impl Pulse {
    /// Creates a Pulse writing to `store`.
    ///
    /// Must be called from within a tokio runtime; flushes are spawned on it.
    /// When `config.expire` is non-zero the store is asked to expire records
    /// after the same duration.
    pub async fn new(config: Config, store: Arc<dyn Store>) -> Result<Self, PulseError> {
        config.validate()?;

        let runtime = Handle::try_current().map_err(|e| {
            PulseError::Runtime(format!("a Pulse must be created inside a tokio runtime: {e}"))
        })?;
        let expire = expiration(config.expire)?;

        if expire.is_some() {
            store.ensure_retention(config.expire).await.map_err(|e| {
                PulseError::ConfigInvalid(format!("failed to configure retention: {e}"))
            })?;
        }

        let handler: Arc<dyn ErrorHandler> = match (config.error_handler, config.backup_dir) {
            (Some(handler), _) => handler,
            (None, Some(dir)) => Arc::new(BackupHandler::new(dir)?),
            (None, None) => {
                return Err(PulseError::ConfigInvalid(
                    "either a backup directory or an error handler must be specified".to_string(),
                ))
            }
        };
        let level_classifier = config
            .level_classifier
            .unwrap_or_else(|| Arc::new(default_level));

        debug!(
            "PULSE | Created with a buffer of {BUFFER_SIZE} records and expiration {:?}",
            config.expire
        );

        Ok(Self {
            inner: Arc::new(Inner {
                beats: IngestBuffer::new(BUFFER_SIZE),
                hits: IngestBuffer::new(BUFFER_SIZE),
                flusher: Flusher::new(Arc::clone(&store), handler, runtime),
                store,
                expire,
                level_classifier,
            }),
        })
    }

    /// Buffers a Beat. Never waits for the store.
    pub fn push_beat(&self, beat: Beat) {
        self.inner.beats.push(beat, &self.inner.flusher);
    }

    /// Buffers a Hit. Never waits for the store.
    pub fn push_hit(&self, hit: Hit) {
        self.inner.hits.push(hit, &self.inner.flusher);
    }

    /// Flushes both buffers and waits for every flush started before this
    /// call, including those triggered by other producers, to finish.
    ///
    /// Records pushed before `flush` is called are in the store, or in the
    /// error handler's hands, once it returns.
    pub async fn flush(&self) {
        self.inner.beats.flush(&self.inner.flusher);
        self.inner.hits.flush(&self.inner.flusher);
        self.inner.flusher.join().await;
    }

    /// Number of records of `category` buffered and not yet flushed.
    pub fn pending(&self, category: Category) -> usize {
        match category {
            Category::Beats => self.inner.beats.len(),
            Category::Hits => self.inner.hits.len(),
        }
    }

    /// Number of flushes whose store insert has not completed yet.
    pub fn flushes_in_flight(&self) -> usize {
        self.inner.flusher.outstanding()
    }

    /// The configured expiration, `None` when records never expire.
    pub fn expiration(&self) -> Option<Duration> {
        self.inner.expire.and_then(|expire| expire.to_std().ok())
    }

    /// A writer turning every written line into a Beat.
    pub fn writer(&self) -> BeatWriter {
        BeatWriter::new(self.clone())
    }

    /// A tower layer recording a Hit for every request.
    pub fn layer(&self) -> HitLayer {
        HitLayer::new(self.clone())
    }
}

impl std::fmt::Debug for Pulse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pulse")
            .field("pending_beats", &self.pending(Category::Beats))
            .field("pending_hits", &self.pending(Category::Hits))
            .field("expire", &self.inner.expire)
            .finish()
    }
}

fn expiration(expire: Duration) -> Result<Option<TimeDelta>, PulseError> {
    if expire.is_zero() {
        return Ok(None);
    }
    TimeDelta::from_std(expire).map(Some).map_err(|e| {
        PulseError::ConfigInvalid(format!("expiration of {expire:?} is out of range: {e}"))
    })
}
