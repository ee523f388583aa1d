// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns written lines into Beats.
//!
//! A [`BeatWriter`] can stand wherever a `std::io::Write` is expected, and as
//! a [`MakeWriter`] it lets a `tracing_subscriber::fmt` layer record every
//! event as a Beat.

use chrono::Utc;
use std::io;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

use crate::pulse::Pulse;
use crate::record::Beat;

/// Derives a Beat's level from the written line, terminator excluded.
pub type LevelClassifier = Arc<dyn Fn(&[u8]) -> String + Send + Sync>;

/// Classifier used when none is configured. Every Beat gets an empty level.
pub fn default_level(_line: &[u8]) -> String {
    String::new()
}

/// Classifier reading a conventional level token at the start of the line.
///
/// `ERROR`, `WARN`/`WARNING`, `INFO`, `DEBUG` and `TRACE` are recognized in
/// any case, optionally wrapped in brackets or followed by a colon, so
/// `[warn] disk almost full` and `INFO: ready` both classify. Anything else
/// gets an empty level.
pub fn prefix_level(line: &[u8]) -> String {
    let line = String::from_utf8_lossy(line);
    let token = line
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_start_matches('[')
        .trim_end_matches([']', ':']);

    match token.to_ascii_uppercase().as_str() {
        "ERROR" => "ERROR",
        "WARN" | "WARNING" => "WARN",
        "INFO" => "INFO",
        "DEBUG" => "DEBUG",
        "TRACE" => "TRACE",
        _ => "",
    }
    .to_string()
}

/// Writer recording each written chunk as one Beat.
#[derive(Clone, Debug)]
pub struct BeatWriter {
    pulse: Pulse,
}

impl BeatWriter {
    pub fn new(pulse: Pulse) -> Self {
        Self { pulse }
    }

    /// Records `chunk` as a Beat and returns its length without the line
    /// terminator.
    ///
    /// One trailing `\n` or `\r\n` is trimmed. An empty chunk records nothing.
    pub fn push_line(&self, chunk: &[u8]) -> usize {
        let now = Utc::now();
        if chunk.is_empty() {
            return 0;
        }

        let line = trim_terminator(chunk);
        let level = (self.pulse.inner.level_classifier)(line);
        let body = String::from_utf8_lossy(line).into_owned();
        self.pulse.push_beat(Beat::new(now, level, body));
        line.len()
    }
}

fn trim_terminator(chunk: &[u8]) -> &[u8] {
    match chunk {
        [line @ .., b'\r', b'\n'] | [line @ .., b'\n'] => line,
        line => line,
    }
}

impl io::Write for BeatWriter {
    /// Always consumes the whole buffer, terminator included.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.push_line(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for BeatWriter {
    type Writer = BeatWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
