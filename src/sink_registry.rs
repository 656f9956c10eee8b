use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::PartitionError;
use crate::routing_key::RoutingKey;

/// Opens the output sink of a bucket. Called at most once per key by [SinkRegistry].
pub trait SinkFactory {
    type Sink: Write;

    fn open(&self, key: RoutingKey) -> std::io::Result<Self::Sink>;

    /// Where the sink of `key` lives, for diagnostics.
    fn location(&self, key: RoutingKey) -> PathBuf;
}

/// Opens `<output_dir>/<key file name>` in append mode, creating the directory on demand.
pub struct FileSinkFactory {
    output_dir: PathBuf,
}

impl FileSinkFactory {
    pub fn new(output_dir: PathBuf) -> FileSinkFactory {
        FileSinkFactory {
            output_dir,
        }
    }
}

impl SinkFactory for FileSinkFactory {
    type Sink = BufWriter<File>;

    fn open(&self, key: RoutingKey) -> std::io::Result<Self::Sink> {
        std::fs::create_dir_all(&self.output_dir)?;
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(key.bucket_path(&self.output_dir))?;
        Ok(BufWriter::new(file))
    }

    fn location(&self, key: RoutingKey) -> PathBuf {
        key.bucket_path(&self.output_dir)
    }
}

/// Result of routing a single line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    Written(RoutingKey),
    Dropped(RoutingKey),
    /// Empty lines have no key and are ignored.
    Skipped,
}

/// Keys of the sinks released by [SinkRegistry::close_all], in key order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClosedSinks {
    /// Every line routed to these keys reached its sink.
    pub complete: Vec<RoutingKey>,
    /// A write or flush failed; the bucket may hold a partial line and is not sorted.
    pub failed: Vec<RoutingKey>,
}

/// Lines accepted by a sink since its last successful flush. A buffered sink may still lose
/// them, so they only count as written once a flush succeeds.
const FLUSH_LINES: u64 = 1024;

enum SinkSlot<S> {
    Open {
        sink: S,
        unflushed: u64,
    },
    /// Open failed, nothing was written.
    Failed,
    /// A write or flush failed after the sink was opened.
    Broken,
}

struct SinkTable<S> {
    slots: BTreeMap<RoutingKey, SinkSlot<S>>,
    closed: bool,
}

/// Owner of every open bucket sink.
///
/// A single lock covers both creating a sink and appending to it; with at most 256 keys
/// per-key locking is not worth its cost. A sink whose open failed is remembered, so a
/// key is opened at most once and its lines are dropped.
///
/// Sinks are flushed every `FLUSH_LINES` lines. When a write or flush fails, every line not
/// yet confirmed by a flush moves from `written` to `dropped` and the key is broken: later
/// lines are dropped and [SinkRegistry::close_all] reports it as failed.
pub struct SinkRegistry<F: SinkFactory> {
    factory: F,
    endl: u8,
    table: Mutex<SinkTable<F::Sink>>,
    written: AtomicU64,
    dropped: AtomicU64,
}

impl<F: SinkFactory> SinkRegistry<F> {
    pub fn new(factory: F, endl: u8) -> SinkRegistry<F> {
        SinkRegistry {
            factory,
            endl,
            table: Mutex::new(SinkTable {
                slots: BTreeMap::new(),
                closed: false,
            }),
            written: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Append `line` and a terminator to the sink of its key, opening the sink on first use.
    pub fn route(&self, line: &[u8]) -> RouteOutcome {
        let key = match RoutingKey::from_line(line) {
            Some(key) => key,
            None => return RouteOutcome::Skipped,
        };

        let mut table = self.lock();
        if table.closed {
            log::warn!("Dropping line for key {}, sinks are already closed", key);
            return self.drop_lines(key, 1);
        }

        let slot = table.slots.entry(key).or_insert_with(|| match self.factory.open(key) {
            Ok(sink) => {
                log::debug!("Opened sink for key {} at {}", key, self.factory.location(key).display());
                SinkSlot::Open {
                    sink,
                    unflushed: 0,
                }
            }
            Err(source) => {
                let error = PartitionError::SinkOpen {
                    key,
                    path: self.factory.location(key),
                    source,
                };
                log::error!("{:#}", anyhow::Error::new(error));
                SinkSlot::Failed
            }
        });

        let (sink, unflushed) = match slot {
            SinkSlot::Open { sink, unflushed } => (sink, unflushed),
            SinkSlot::Failed | SinkSlot::Broken => {
                log::warn!("Dropping line for key {}, its sink is unavailable", key);
                return self.drop_lines(key, 1);
            }
        };

        let mut result = sink.write_all(line).and_then(|_| sink.write_all(&[self.endl]));
        if result.is_ok() {
            *unflushed += 1;
            self.written.fetch_add(1, Ordering::Relaxed);
            if *unflushed >= FLUSH_LINES {
                result = sink.flush();
                if result.is_ok() {
                    *unflushed = 0;
                }
            }
            if result.is_ok() {
                return RouteOutcome::Written(key);
            }
        } else {
            // the current line never counted as written
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }

        let lost = *unflushed;
        if let Err(source) = result {
            let error = PartitionError::SinkWrite { key, source };
            log::error!("{:#}", anyhow::Error::new(error));
        }
        *slot = SinkSlot::Broken;
        self.unconfirm(lost);
        RouteOutcome::Dropped(key)
    }

    /// Flush and close every sink. Later calls return nothing and later routed lines are
    /// dropped.
    pub fn close_all(&self) -> ClosedSinks {
        let slots = {
            let mut table = self.lock();
            table.closed = true;
            std::mem::take(&mut table.slots)
        };

        let mut closed = ClosedSinks::default();
        for (key, slot) in slots {
            match slot {
                SinkSlot::Open { mut sink, unflushed } => match sink.flush() {
                    Ok(()) => closed.complete.push(key),
                    Err(source) => {
                        let error = PartitionError::SinkWrite { key, source };
                        log::error!(
                            "{:#}, {} lines lost at {}",
                            anyhow::Error::new(error),
                            unflushed,
                            self.factory.location(key).display()
                        );
                        self.unconfirm(unflushed);
                        closed.failed.push(key);
                    }
                },
                SinkSlot::Broken => closed.failed.push(key),
                SinkSlot::Failed => {}
            }
        }
        closed
    }

    /// Lines appended so far.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Lines lost to sink failures so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn drop_lines(&self, key: RoutingKey, lines: u64) -> RouteOutcome {
        self.dropped.fetch_add(lines, Ordering::Relaxed);
        RouteOutcome::Dropped(key)
    }

    /// Move lines counted as written but never flushed to the dropped count.
    fn unconfirm(&self, lines: u64) {
        self.written.fetch_sub(lines, Ordering::Relaxed);
        self.dropped.fetch_add(lines, Ordering::Relaxed);
    }

    fn lock(&self) -> MutexGuard<'_, SinkTable<F::Sink>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
