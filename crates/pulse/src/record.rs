// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Beats, Hits, and the batch type that carries either of them.
//!
//! Beats and Hits are unrelated types. They travel through the same generic
//! buffer, flush, and query code by implementing [`Record`], and only meet in
//! [`Batch`] at the store and error-handler boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::constants::{BEATS_COLLECTION, HITS_COLLECTION, TIME_FORMAT};

/// The two kinds of telemetry handled by a [`crate::Pulse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Beats,
    Hits,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Beats, Category::Hits];

    /// Name of the store collection and backup file for this category.
    #[must_use]
    pub fn collection(self) -> &'static str {
        match self {
            Category::Beats => BEATS_COLLECTION,
            Category::Hits => HITS_COLLECTION,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Beats => write!(f, "beats"),
            Category::Hits => write!(f, "hits"),
        }
    }
}

/// One application log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beat {
    /// Assigned by the store on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Uuid>,
    at: DateTime<Utc>,
    level: String,
    body: String,
}

impl Beat {
    pub fn new(at: DateTime<Utc>, level: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: None,
            at,
            level: level.into(),
            body: body.into(),
        }
    }

    /// Returns a copy of this Beat carrying the id given by a store.
    #[must_use]
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl fmt::Display for Beat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.at.format(TIME_FORMAT),
            self.level,
            self.body
        )
    }
}

/// One served HTTP request.
///
/// Built with [`Hit::new`] and the `with_*` methods before it is handed to a
/// [`crate::Pulse`]; it is not changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Uuid>,
    at: DateTime<Utc>,
    method: String,
    path: String,
    status: u16,
    duration: Duration,
    remote_addr: String,
    referer: String,
    user_agent: String,
}

impl Hit {
    pub fn new(at: DateTime<Utc>, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: None,
            at,
            method: method.into(),
            path: path.into(),
            status: 200,
            duration: Duration::ZERO,
            remote_addr: String::new(),
            referer: String::new(),
            user_agent: String::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    #[must_use]
    pub fn with_remote_addr(mut self, remote_addr: impl Into<String>) -> Self {
        self.remote_addr = remote_addr.into();
        self
    }

    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn referer(&self) -> &str {
        &self.referer
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl fmt::Display for Hit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {:?} {} {} {}",
            self.at.format(TIME_FORMAT),
            self.method,
            self.path,
            self.status,
            self.duration,
            self.remote_addr,
            self.referer,
            self.user_agent
        )
    }
}

/// Records of a single category, as inserted into or read from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batch {
    Beats(Vec<Beat>),
    Hits(Vec<Hit>),
}

impl Batch {
    pub fn category(&self) -> Category {
        match self {
            Batch::Beats(_) => Category::Beats,
            Batch::Hits(_) => Category::Hits,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Batch::Beats(beats) => beats.len(),
            Batch::Hits(hits) => hits.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An empty batch of the given category.
    pub fn empty(category: Category) -> Self {
        match category {
            Category::Beats => Batch::Beats(Vec::new()),
            Category::Hits => Batch::Hits(Vec::new()),
        }
    }
}

/// Glue that lets Beats and Hits share the buffer, flush, and query logic.
pub trait Record: Clone + fmt::Debug + Send + Sync + 'static {
    const CATEGORY: Category;

    fn timestamp(&self) -> DateTime<Utc>;

    fn into_batch(records: Vec<Self>) -> Batch;

    /// Unwraps a batch of this category, handing back any other batch unchanged.
    fn from_batch(batch: Batch) -> Result<Vec<Self>, Batch>;
}

impl Record for Beat {
    const CATEGORY: Category = Category::Beats;

    fn timestamp(&self) -> DateTime<Utc> {
        self.at
    }

    fn into_batch(records: Vec<Self>) -> Batch {
        Batch::Beats(records)
    }

    fn from_batch(batch: Batch) -> Result<Vec<Self>, Batch> {
        match batch {
            Batch::Beats(beats) => Ok(beats),
            other => Err(other),
        }
    }
}

impl Record for Hit {
    const CATEGORY: Category = Category::Hits;

    fn timestamp(&self) -> DateTime<Utc> {
        self.at
    }

    fn into_batch(records: Vec<Self>) -> Batch {
        Batch::Hits(records)
    }

    fn from_batch(batch: Batch) -> Result<Vec<Self>, Batch> {
        match batch {
            Batch::Hits(hits) => Ok(hits),
            other => Err(other),
        }
    }
}
