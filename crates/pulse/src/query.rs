// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, TimeDelta, Utc};
use std::cmp::Reverse;

use crate::error::{PulseError, StoreError};
use crate::pulse::Pulse;
use crate::record::{Beat, Hit, Record};

impl Pulse {
    /// Beats with a timestamp in `[from, to)`, newest first.
    ///
    /// The bounds may be given in either order. Everything pushed before the
    /// call is flushed first so it can be found.
    pub async fn beats(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Beat>, PulseError> {
        self.query(from, to).await
    }

    /// Hits with a timestamp in `[from, to)`, newest first.
    ///
    /// Same rules as [`Pulse::beats`].
    pub async fn hits(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Hit>, PulseError> {
        self.query(from, to).await
    }

    async fn query<R: Record>(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<R>, PulseError> {
        let (from, to) = normalize(from, to);
        if is_expired(self.inner.expire, to, Utc::now()) {
            return Err(PulseError::Expired);
        }

        self.flush().await;

        let batch = self
            .inner
            .store
            .range_query(R::CATEGORY, from, to)
            .await?;
        let mut records = R::from_batch(batch).map_err(|other| {
            StoreError::new(format!(
                "asked for {} but the store returned {}",
                R::CATEGORY,
                other.category()
            ))
        })?;
        records.sort_by_key(|record| Reverse(record.timestamp()));
        Ok(records)
    }
}

fn normalize(from: DateTime<Utc>, to: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    if from > to {
        (to, from)
    } else {
        (from, to)
    }
}

/// A window is expired when even its upper bound is older than the expiration.
fn is_expired(expire: Option<TimeDelta>, to: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expire.is_some_and(|expire| now.signed_duration_since(to) > expire)
}
