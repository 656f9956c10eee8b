use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::routing_key::RoutingKey;

/// Failures of a partition run.
///
/// Public operations return [anyhow::Error]; the error kinds below are at the root of the
/// chain and can be recovered with `error.downcast_ref::<PartitionError>()`.
#[derive(Debug, Error)]
pub enum PartitionError {
    /// The input file is missing or unreadable. Fatal for the whole run.
    #[error("failed to open input file {}", .path.display())]
    InputOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading a range of the input failed. Only that range is abandoned.
    #[error("failed to read input file {} at offset {offset}", .path.display())]
    InputRead {
        path: PathBuf,
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// A line was offered to a queue that has no consumers left.
    #[error("routing queue is closed")]
    QueueClosed,

    /// The output file for a bucket could not be created or opened.
    #[error("failed to open sink for key {key} at {}", .path.display())]
    SinkOpen {
        key: RoutingKey,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Appending a line to an open sink failed.
    #[error("failed to write to sink for key {key}")]
    SinkWrite {
        key: RoutingKey,
        #[source]
        source: io::Error,
    },

    /// Lines were dropped because of sink failures and the run is configured to fail on them.
    #[error("{dropped} lines were dropped because of sink errors")]
    SinkErrors { dropped: u64 },

    /// A bucket file could not be read or rewritten during the sort pass.
    #[error("failed to sort bucket {}", .path.display())]
    BucketSort {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The run was cancelled before completion.
    #[error("partition was cancelled")]
    Cancelled,
}
