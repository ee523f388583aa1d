// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Asynchronous hand-off of buffered batches to the store.
//!
//! ```text
//!   IngestBuffer ──take-all──> Flight registered ──spawn──> Store::insert
//!                                                               │ Err
//!                                                               v
//!                                                         ErrorHandler
//! ```
//!
//! Every flush, including the ones that find an empty buffer, is registered in
//! [`InFlight`] while the buffer lock is held. A barrier snapshots the number
//! of registered flushes and waits until all of them are done, whoever
//! started them.

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error};

use crate::recovery::ErrorHandler;
use crate::record::Record;
use crate::store::Store;

#[derive(Debug, Default)]
struct Flights {
    next: u64,
    pending: BTreeSet<u64>,
}

/// Tracks every flush of a [`crate::Pulse`] until its task has finished.
#[derive(Debug)]
pub(crate) struct InFlight {
    state: watch::Sender<Flights>,
}

impl InFlight {
    pub(crate) fn new() -> Arc<Self> {
        let (state, _) = watch::channel(Flights::default());
        Arc::new(Self { state })
    }

    pub(crate) fn begin(self: &Arc<Self>) -> Flight {
        let mut seq = 0;
        self.state.send_modify(|flights| {
            seq = flights.next;
            flights.next += 1;
            flights.pending.insert(seq);
        });
        Flight {
            tracker: Arc::clone(self),
            seq,
        }
    }

    fn finish(&self, seq: u64) {
        self.state.send_modify(|flights| {
            flights.pending.remove(&seq);
        });
    }

    /// Number of flushes registered so far.
    pub(crate) fn issued(&self) -> u64 {
        self.state.borrow().next
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Waits until every flush numbered below `issued` has finished.
    pub(crate) async fn join(&self, issued: u64) {
        let mut rx = self.state.subscribe();
        // The sender lives in self, so waiting cannot fail.
        let _ = rx
            .wait_for(|flights| flights.pending.first().map_or(true, |&seq| seq >= issued))
            .await;
    }
}

/// A registered flush. Dropping it marks the flush as finished.
#[derive(Debug)]
pub(crate) struct Flight {
    tracker: Arc<InFlight>,
    seq: u64,
}

impl Drop for Flight {
    fn drop(&mut self) {
        self.tracker.finish(self.seq);
    }
}

/// Submits taken batches to the store on the runtime captured at construction.
pub(crate) struct Flusher {
    store: Arc<dyn Store>,
    handler: Arc<dyn ErrorHandler>,
    in_flight: Arc<InFlight>,
    runtime: Handle,
}

impl Flusher {
    pub(crate) fn new(
        store: Arc<dyn Store>,
        handler: Arc<dyn ErrorHandler>,
        runtime: Handle,
    ) -> Self {
        Self {
            store,
            handler,
            in_flight: InFlight::new(),
            runtime,
        }
    }

    /// Registers a flush. Must be called while the buffer lock is held.
    pub(crate) fn begin(&self) -> Flight {
        self.in_flight.begin()
    }

    /// Inserts `records` in a spawned task; the flight finishes with the task.
    pub(crate) fn submit<R: Record>(&self, records: Vec<R>, flight: Flight) {
        if records.is_empty() {
            return;
        }

        let store = Arc::clone(&self.store);
        let handler = Arc::clone(&self.handler);
        self.runtime.spawn(async move {
            let count = records.len();
            debug!("PULSE | Flushing {count} {}", R::CATEGORY);

            let batch = R::into_batch(records);
            match store.insert(&batch).await {
                Ok(()) => debug!("PULSE | Successfully flushed {count} {}", R::CATEGORY),
                Err(err) => {
                    error!("PULSE | Failed to flush {count} {}: {err}", R::CATEGORY);
                    let recovered =
                        tokio::task::spawn_blocking(move || handler.handle(Some(&err), batch))
                            .await;
                    if let Err(e) = recovered {
                        error!("PULSE | Error handler failed for {count} {}: {e}", R::CATEGORY);
                    }
                }
            }
            drop(flight);
        });
    }

    /// Waits for every flush registered before this call.
    pub(crate) async fn join(&self) {
        let issued = self.in_flight.issued();
        self.in_flight.join(issued).await;
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.in_flight.outstanding()
    }
}
