use crate::routing_key::RoutingKey;

/// Counters of a completed partition run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartitionSummary {
    ranges: usize,
    lines_produced: u64,
    lines_written: u64,
    lines_dropped: u64,
    buckets_sorted: Vec<RoutingKey>,
    buckets_failed: Vec<RoutingKey>,
}

impl PartitionSummary {
    pub(crate) fn new(
        ranges: usize,
        lines_produced: u64,
        lines_written: u64,
        lines_dropped: u64,
        mut buckets_sorted: Vec<RoutingKey>,
        mut buckets_failed: Vec<RoutingKey>,
    ) -> PartitionSummary {
        buckets_sorted.sort();
        buckets_failed.sort();
        PartitionSummary {
            ranges,
            lines_produced,
            lines_written,
            lines_dropped,
            buckets_sorted,
            buckets_failed,
        }
    }

    /// Number of byte ranges the input was split into.
    pub fn ranges(&self) -> usize {
        self.ranges
    }

    /// Non-empty lines read from the input and queued for routing.
    pub fn lines_produced(&self) -> u64 {
        self.lines_produced
    }

    /// Lines appended to bucket files.
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Lines lost because their bucket file could not be opened or written.
    pub fn lines_dropped(&self) -> u64 {
        self.lines_dropped
    }

    /// Keys whose bucket file was sorted, in key order.
    pub fn buckets_sorted(&self) -> &Vec<RoutingKey> {
        &self.buckets_sorted
    }

    /// Keys whose bucket file could not be sorted and was left as written.
    pub fn buckets_failed(&self) -> &Vec<RoutingKey> {
        &self.buckets_failed
    }
}

/// How a partition run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartitionOutcome {
    /// The input file has no bytes; nothing was written.
    EmptyInput,
    /// Every stage ran. Partial failures are reported in the summary.
    Completed(PartitionSummary),
}
