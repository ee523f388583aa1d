// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::mem;
use std::sync::Mutex;

use crate::flusher::Flusher;
use crate::record::Record;

/// Staging area for the records of one category.
///
/// Each category owns its own buffer and lock, so Beat and Hit producers never
/// contend with each other.
#[derive(Debug)]
pub(crate) struct IngestBuffer<R> {
    records: Mutex<Vec<R>>,
    threshold: usize,
}

impl<R: Record> IngestBuffer<R> {
    pub(crate) fn new(threshold: usize) -> Self {
        Self {
            records: Mutex::new(Vec::with_capacity(threshold + 1)),
            threshold,
        }
    }

    /// Appends `record` and, once the buffer holds more than the threshold,
    /// flushes all of it. Returns without waiting for the store.
    pub(crate) fn push(&self, record: R, flusher: &Flusher) {
        let (records, flight) = {
            #[allow(clippy::expect_used)]
            let mut records = self.records.lock().expect("lock poisoned");
            records.push(record);
            if records.len() <= self.threshold {
                return;
            }
            (self.take(&mut records), flusher.begin())
        };
        flusher.submit(records, flight);
    }

    /// Flushes whatever is buffered, even nothing.
    pub(crate) fn flush(&self, flusher: &Flusher) {
        let (records, flight) = {
            #[allow(clippy::expect_used)]
            let mut records = self.records.lock().expect("lock poisoned");
            (self.take(&mut records), flusher.begin())
        };
        flusher.submit(records, flight);
    }

    pub(crate) fn len(&self) -> usize {
        #[allow(clippy::expect_used)]
        let records = self.records.lock().expect("lock poisoned");
        records.len()
    }

    fn take(&self, records: &mut Vec<R>) -> Vec<R> {
        if records.is_empty() {
            return Vec::new();
        }
        mem::replace(records, Vec::with_capacity(self.threshold + 1))
    }
}
