// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Number of buffered records per category above which the whole buffer is flushed.
pub const BUFFER_SIZE: usize = 1 << 8;

/// Collection holding Beats, also the stem of the Beats backup file.
pub const BEATS_COLLECTION: &str = "pulse_beats";

/// Collection holding Hits, also the stem of the Hits backup file.
pub const HITS_COLLECTION: &str = "pulse_hits";

/// Extension of the backup files written by the default error handler.
pub const BACKUP_FILE_EXTENSION: &str = "log";

/// Layout of timestamps in the textual form of Beats and Hits.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f %z";

/// Level given to the Beat recorded for a failed flush.
pub const ERROR_LEVEL: &str = "ERROR";

/// Status recorded for a request whose response was abandoned before the
/// handler finished, such as a client disconnect or a timeout.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;
