// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Pulse
//!
//! Collects two kinds of operational records inside a service and persists
//! them to a [`Store`] without slowing the producers down:
//! - **Beats**: lines written to a [`BeatWriter`], such as log output
//! - **Hits**: one per HTTP request passing through a [`HitLayer`]
//!
//! ## Pipeline
//!
//! ```text
//!  BeatWriter ─┐                                         ┌─> Store::insert
//!              ├─> per-category buffer ──(> 256)──> flush ┤
//!  HitLayer  ──┘                                         └─> ErrorHandler (on failure)
//!
//!  Pulse::beats / Pulse::hits ──> flush barrier ──> Store::range_query
//! ```
//!
//! Pushing only appends to an in-memory buffer; once a buffer holds more than
//! [`BUFFER_SIZE`] records the whole buffer is flushed in a background task.
//! Queries first wait for every flush started before them, so they always see
//! what was pushed earlier.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod buffer;
pub mod config;
pub mod constants;
pub mod error;
mod flusher;
pub mod middleware;
mod pulse;
mod query;
pub mod record;
pub mod recovery;
pub mod registry;
pub mod store;
pub mod writer;

pub use config::Config;
pub use constants::{BUFFER_SIZE, TIME_FORMAT};
pub use error::{PulseError, StoreError};
pub use middleware::{HitLayer, HitService};
pub use pulse::Pulse;
pub use record::{Batch, Beat, Category, Hit, Record};
pub use recovery::{BackupHandler, ErrorHandler};
pub use store::{MemoryStore, Store};
pub use writer::{default_level, prefix_level, BeatWriter, LevelClassifier};
