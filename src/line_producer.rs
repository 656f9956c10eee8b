use std::cmp::max;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use anyhow::anyhow;
use command_executor::command::Command;

use crate::chunk_plan::ByteRange;
use crate::config::Config;
use crate::error::PartitionError;
use crate::routing_queue::LineSender;

/// Stream the lines starting inside `range` into the routing queue.
///
/// A range that does not start at 0 begins one byte early and skips through the next
/// terminator: that skips the tail of a line owned by the previous range, and only the
/// terminator itself when `range.start()` is the first byte of a line. Lines are read while
/// the position is before `range.end()`, so the last line is read to its end even when it
/// crosses the boundary. Every line belongs to the range holding its first byte.
///
/// Returns the number of lines enqueued.
pub(crate) fn produce(config: &Config, range: &ByteRange, sender: &LineSender) -> Result<u64, PartitionError> {
    let path = config.input();
    let file = File::open(path).map_err(|source| PartitionError::InputOpen {
        path: path.clone(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let read_error = |offset: u64, source: std::io::Error| PartitionError::InputRead {
        path: path.clone(),
        offset,
        source,
    };

    let endl = config.endl();
    let mut pos = range.start();
    if pos != 0 {
        pos -= 1;
        reader.seek(SeekFrom::Start(pos)).map_err(|e| read_error(pos, e))?;
        let mut partial = Vec::new();
        let skipped = reader.read_until(endl, &mut partial).map_err(|e| read_error(pos, e))?;
        pos += skipped as u64;
    }

    let mut emitted = 0;
    let mut line_capacity = 64;
    while pos < range.end() {
        if config.is_cancelled() {
            log::debug!("Cancelled reading range {}..{} at offset {}", range.start(), range.end(), pos);
            break;
        }

        let mut line = Vec::with_capacity(line_capacity);
        let bytes = reader.read_until(endl, &mut line).map_err(|e| read_error(pos, e))?;
        if bytes == 0 {
            break;
        }
        pos += bytes as u64;
        line_capacity = max(line.len(), line_capacity);

        if line.last() == Some(&endl) {
            line.pop();
        }
        if config.trim_cr() && line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.is_empty() {
            continue;
        }
        if let Some(r) = config.ignore_lines() {
            if r.is_match(&line) {
                continue;
            }
        }

        sender.enqueue(line)?;
        emitted += 1;
    }
    Ok(emitted)
}

/// Runs [produce] for one range on the reading pool. Failures stay inside the command:
/// they are logged and only the lines of this range are affected.
///
/// The queue handle is released as soon as the range is done, the queue can only drain
/// once every handle is gone.
pub(crate) struct ProduceCommand {
    range: ByteRange,
    sender: Mutex<Option<LineSender>>,
    config: Arc<Config>,
    produced: Arc<AtomicU64>,
}

impl ProduceCommand {
    pub(crate) fn new(range: ByteRange, sender: LineSender, config: Arc<Config>, produced: Arc<AtomicU64>) -> ProduceCommand {
        ProduceCommand {
            range,
            sender: Mutex::new(Some(sender)),
            config,
            produced,
        }
    }
}

impl Command for ProduceCommand {
    fn execute(&self) -> Result<(), anyhow::Error> {
        log::debug!(
            "Start reading range {}..{}, {} bytes, thread: {}",
            self.range.start(),
            self.range.end(),
            self.range.length(),
            thread::current().name().unwrap_or("unnamed")
        );
        let sender = match self.sender.lock().unwrap_or_else(PoisonError::into_inner).take() {
            Some(sender) => sender,
            None => return Err(anyhow!("range {}..{} was already read", self.range.start(), self.range.end())),
        };
        match produce(&self.config, &self.range, &sender) {
            Ok(lines) => {
                self.produced.fetch_add(lines, Ordering::Relaxed);
                log::debug!("Finish reading range {}..{}, lines: {}", self.range.start(), self.range.end(), lines);
            }
            Err(e) => {
                log::error!("{:#}", anyhow::Error::new(e));
            }
        }
        Ok(())
    }
}
