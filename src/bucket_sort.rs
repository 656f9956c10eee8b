use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use anyhow::Context;
use command_executor::command::Command;
use tempfile::Builder;

use crate::error::PartitionError;
use crate::routing_key::RoutingKey;

fn split_lines(content: &[u8], endl: u8) -> Vec<&[u8]> {
    let content = content.strip_suffix(&[endl]).unwrap_or(content);
    if content.is_empty() {
        Vec::new()
    } else {
        content.split(|b| *b == endl).collect()
    }
}

/// Sort the lines of a bucket file by byte order and rewrite it.
///
/// The sorted lines go to a temporary file next to the bucket which then replaces it, so a
/// failure leaves the bucket as it was. Returns the number of lines.
pub(crate) fn sort_bucket(path: &Path, endl: u8) -> Result<usize, PartitionError> {
    let sort_error = |source: std::io::Error| PartitionError::BucketSort {
        path: path.to_path_buf(),
        source,
    };

    let content = fs::read(path).map_err(sort_error)?;
    let mut lines = split_lines(&content, endl);
    lines.sort_unstable();

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path).map_err(sort_error)?.permissions();
    let mut sorted = Builder::new()
        .prefix(".sorting-")
        .tempfile_in(dir)
        .map_err(sort_error)?;
    {
        let mut writer = BufWriter::new(sorted.as_file_mut());
        for line in &lines {
            writer.write_all(line).map_err(sort_error)?;
            writer.write_all(&[endl]).map_err(sort_error)?;
        }
        writer.flush().map_err(sort_error)?;
    }
    fs::set_permissions(sorted.path(), permissions).map_err(sort_error)?;
    sorted.persist(path).map_err(|e| sort_error(e.error))?;
    Ok(lines.len())
}

/// Verify that every line of a bucket has the bucket's key and that the lines are in
/// byte order.
pub(crate) fn check_bucket(path: &Path, key: RoutingKey, endl: u8) -> Result<bool, anyhow::Error> {
    let content = fs::read(path).with_context(|| format!("path: {}", path.display()))?;
    let lines = split_lines(&content, endl);
    let mut previous: Option<&[u8]> = None;
    for line in lines {
        if RoutingKey::from_line(line) != Some(key) {
            log::info!("Line with a foreign key in {}", path.display());
            return Ok(false);
        }
        if let Some(previous_line) = previous {
            if previous_line > line {
                log::info!("Unsorted lines in {}", path.display());
                return Ok(false);
            }
        }
        previous = Some(line);
    }
    Ok(true)
}

#[derive(Default)]
pub(crate) struct SortResults {
    pub(crate) sorted: Vec<RoutingKey>,
    pub(crate) failed: Vec<RoutingKey>,
}

/// Sorts one bucket on the sorting pool and records the outcome.
pub(crate) struct SortBucketCommand {
    key: RoutingKey,
    path: PathBuf,
    endl: u8,
    results: Arc<Mutex<SortResults>>,
}

impl SortBucketCommand {
    pub(crate) fn new(key: RoutingKey, path: PathBuf, endl: u8, results: Arc<Mutex<SortResults>>) -> SortBucketCommand {
        SortBucketCommand {
            key,
            path,
            endl,
            results,
        }
    }
}

impl Command for SortBucketCommand {
    fn execute(&self) -> Result<(), anyhow::Error> {
        let outcome = sort_bucket(&self.path, self.endl);
        let mut results = self.results.lock().unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Ok(lines) => {
                log::debug!(
                    "Sorted bucket {}, lines: {}, thread: {}",
                    self.path.display(),
                    lines,
                    thread::current().name().unwrap_or("unnamed")
                );
                results.sorted.push(self.key);
            }
            Err(e) => {
                log::error!("{:#}", anyhow::Error::new(e));
                results.failed.push(self.key);
            }
        }
        Ok(())
    }
}
