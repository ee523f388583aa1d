// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock stores and handlers for testing

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse::{Batch, Category, ErrorHandler, MemoryStore, Store, StoreError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Store rejecting every insert and query
#[allow(dead_code)]
pub struct FailingStore;

#[async_trait]
impl Store for FailingStore {
    async fn insert(&self, _batch: &Batch) -> Result<(), StoreError> {
        Err(StoreError::new("connection refused"))
    }

    async fn range_query(
        &self,
        _category: Category,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Batch, StoreError> {
        Err(StoreError::new("connection refused"))
    }

    async fn ensure_retention(&self, _ttl: Duration) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-memory store counting the calls it receives
#[allow(dead_code)]
#[derive(Default)]
pub struct CountingStore {
    pub store: MemoryStore,
    pub inserts: AtomicUsize,
    pub queries: AtomicUsize,
}

#[allow(dead_code)]
impl CountingStore {
    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Store for CountingStore {
    async fn insert(&self, batch: &Batch) -> Result<(), StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.store.insert(batch).await
    }

    async fn range_query(
        &self,
        category: Category,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Batch, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.store.range_query(category, from, to).await
    }

    async fn ensure_retention(&self, ttl: Duration) -> Result<(), StoreError> {
        self.store.ensure_retention(ttl).await
    }
}

/// Error handler remembering every batch it receives
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingHandler {
    pub calls: Mutex<Vec<(Option<String>, Batch)>>,
}

#[allow(dead_code)]
impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<(Option<String>, Batch)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ErrorHandler for RecordingHandler {
    fn handle(&self, error: Option<&StoreError>, batch: Batch) {
        self.calls
            .lock()
            .unwrap()
            .push((error.map(ToString::to_string), batch));
    }
}

/// In-memory store whose inserts take `delay` to complete
#[allow(dead_code)]
pub struct SlowStore {
    pub store: CountingStore,
    pub delay: Duration,
}

#[allow(dead_code)]
impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            store: CountingStore::default(),
            delay,
        }
    }
}

#[async_trait]
impl Store for SlowStore {
    async fn insert(&self, batch: &Batch) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.store.insert(batch).await
    }

    async fn range_query(
        &self,
        category: Category,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Batch, StoreError> {
        self.store.range_query(category, from, to).await
    }

    async fn ensure_retention(&self, ttl: Duration) -> Result<(), StoreError> {
        self.store.ensure_retention(ttl).await
    }
}
