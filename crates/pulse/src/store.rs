// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The durable store contract and an in-process implementation of it.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::record::{Batch, Beat, Category, Hit, Record};

/// Persistence layer behind a [`crate::Pulse`].
///
/// Implementations must be safe to call from several flush tasks at once.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts every record of `batch`. Never called with an empty batch.
    ///
    /// A batch is expected to fail as a whole: on error the entire batch is
    /// handed to the error handler.
    async fn insert(&self, batch: &Batch) -> Result<(), StoreError>;

    /// Returns the records of `category` with `from <= at < to`, in any order.
    async fn range_query(
        &self,
        category: Category,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Batch, StoreError>;

    /// Expires stored records `ttl` after their timestamp.
    async fn ensure_retention(&self, ttl: Duration) -> Result<(), StoreError>;
}

/// A [`Store`] keeping everything in memory.
///
/// Ids are assigned on insert. Retention is applied lazily: expired records
/// are dropped on the next insert and never returned by queries.
#[derive(Debug, Default)]
pub struct MemoryStore {
    beats: Mutex<Vec<Beat>>,
    hits: Mutex<Vec<Hit>>,
    retention: Mutex<Option<TimeDelta>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held for `category`, expired ones included.
    #[allow(clippy::expect_used)]
    pub fn len(&self, category: Category) -> usize {
        match category {
            Category::Beats => self.beats.lock().expect("lock poisoned").len(),
            Category::Hits => self.hits.lock().expect("lock poisoned").len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|category| self.len(*category) == 0)
    }

    fn cutoff(&self) -> Option<DateTime<Utc>> {
        #[allow(clippy::expect_used)]
        let retention = *self.retention.lock().expect("lock poisoned");
        retention.and_then(|ttl| Utc::now().checked_sub_signed(ttl))
    }
}

fn append<R: Record>(stored: &Mutex<Vec<R>>, records: Vec<R>, cutoff: Option<DateTime<Utc>>) {
    #[allow(clippy::expect_used)]
    let mut stored = stored.lock().expect("lock poisoned");
    if let Some(cutoff) = cutoff {
        stored.retain(|record| record.timestamp() > cutoff);
    }
    stored.extend(records);
}

fn select<R: Record>(
    stored: &Mutex<Vec<R>>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    cutoff: Option<DateTime<Utc>>,
) -> Vec<R> {
    #[allow(clippy::expect_used)]
    let stored = stored.lock().expect("lock poisoned");
    stored
        .iter()
        .filter(|record| {
            let at = record.timestamp();
            at >= from && at < to && cutoff.map_or(true, |cutoff| at > cutoff)
        })
        .cloned()
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert(&self, batch: &Batch) -> Result<(), StoreError> {
        let cutoff = self.cutoff();
        match batch {
            Batch::Beats(beats) => {
                let beats = beats
                    .iter()
                    .map(|beat| beat.clone().with_id(Uuid::new_v4()))
                    .collect();
                append(&self.beats, beats, cutoff);
            }
            Batch::Hits(hits) => {
                let hits = hits
                    .iter()
                    .map(|hit| hit.clone().with_id(Uuid::new_v4()))
                    .collect();
                append(&self.hits, hits, cutoff);
            }
        }
        Ok(())
    }

    async fn range_query(
        &self,
        category: Category,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Batch, StoreError> {
        let cutoff = self.cutoff();
        Ok(match category {
            Category::Beats => Batch::Beats(select(&self.beats, from, to, cutoff)),
            Category::Hits => Batch::Hits(select(&self.hits, from, to, cutoff)),
        })
    }

    async fn ensure_retention(&self, ttl: Duration) -> Result<(), StoreError> {
        let ttl = TimeDelta::from_std(ttl)
            .map_err(|e| StoreError::new(format!("retention of {ttl:?} is out of range: {e}")))?;
        debug!("PULSE | Memory store retention set to {ttl}");
        #[allow(clippy::expect_used)]
        let mut retention = self.retention.lock().expect("lock poisoned");
        *retention = Some(ttl);
        Ok(())
    }
}
