use std::cmp::{max, min};
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, Context};
use command_executor::shutdown_mode::ShutdownMode;
use command_executor::thread_pool::ThreadPool;
use command_executor::thread_pool_builder::ThreadPoolBuilder;
use regex::bytes::Regex;
use rlimit::{getrlimit, setrlimit, Resource};

use crate::bucket_sort::{check_bucket, SortBucketCommand, SortResults};
use crate::bucket_writer::RouteCommand;
use crate::chunk_plan::plan;
use crate::config::Config;
use crate::error::PartitionError;
use crate::line_producer::ProduceCommand;
use crate::routing_key::RoutingKey;
use crate::routing_queue::RoutingQueue;
use crate::sink_registry::{FileSinkFactory, SinkRegistry};
use crate::summary::{PartitionOutcome, PartitionSummary};

/// Partition the lines of a text file into one file per initial letter and sort each file.
///
/// Every non-empty line of the input is appended to `<output_dir>/<key>.txt` where the key
/// is the line's first byte, ASCII lowercased. Once all lines are routed each bucket file is
/// sorted by byte order, so `Apple` sorts before `apple` in `a.txt`.
///
/// # Examples
/// ```
/// use std::path::PathBuf;
/// use text_file_partition::partition::Partition;
/// use text_file_partition::summary::PartitionOutcome;
///
/// fn partition(input: PathBuf, output: PathBuf) -> Result<(), anyhow::Error> {
///     let mut partition = Partition::new(input, output);
///     // number of byte ranges read concurrently. The default of zero uses all cores.
///     partition.with_tasks(4);
///     // number of threads appending lines to the bucket files
///     partition.with_consumers(4);
///     match partition.run()? {
///         PartitionOutcome::EmptyInput => log::info!("nothing to do"),
///         PartitionOutcome::Completed(summary) => {
///             log::info!("wrote {} lines", summary.lines_written())
///         }
///     }
///     Ok(())
/// }
/// ```
pub struct Partition {
    input: PathBuf,
    output_dir: PathBuf,
    tasks: usize,
    consumers: usize,
    queue_size: usize,
    endl: u8,
    trim_cr: bool,
    ignore_lines: Option<Regex>,
    fail_on_sink_error: bool,
    cancelled: Arc<AtomicBool>,
}

impl Partition {
    /// Create a default Partition definition.
    ///
    /// * the input is split into one range per CPU core
    /// * 4 consumer threads write the bucket files
    /// * at most 4096 lines wait in the routing queue
    /// * lines end with '\n' and a trailing '\r' is kept
    /// * no lines are ignored except empty ones
    /// * lines whose bucket file cannot be opened are dropped and reported
    pub fn new(input: PathBuf, output_dir: PathBuf) -> Partition {
        Partition {
            input,
            output_dir,
            tasks: 0,
            consumers: 4,
            queue_size: 4096,
            endl: b'\n',
            trim_cr: false,
            ignore_lines: None,
            fail_on_sink_error: false,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the number of byte ranges and of reading and sorting threads. The default is zero
    /// which will result in using all system cores
    pub fn with_tasks(&mut self, tasks: usize) {
        self.tasks = tasks;
    }

    /// Set the number of threads routing lines into bucket files. The default is 4
    pub fn with_consumers(&mut self, consumers: usize) {
        self.consumers = consumers;
    }

    /// Set the capacity of the routing queue in lines. Readers block while it is full
    pub fn with_queue_size(&mut self, queue_size: usize) {
        self.queue_size = queue_size;
    }

    /// Set line ending byte - not supporting CRLF, see [Partition::with_trim_cr]
    pub fn with_endl(&mut self, endl: u8) {
        self.endl = endl;
    }

    /// Remove a '\r' preceding the line ending
    pub fn with_trim_cr(&mut self, trim_cr: bool) {
        self.trim_cr = trim_cr;
    }

    /// Specify which lines to ignore. Each line matching the regex will not appear in the
    /// output.
    pub fn with_ignore_lines(&mut self, r: Regex) {
        self.ignore_lines = Some(r);
    }

    /// Fail the run, before sorting, when lines were dropped because a bucket file could not
    /// be opened or written. The default is to report and continue
    pub fn with_fail_on_sink_error(&mut self, fail_on_sink_error: bool) {
        self.fail_on_sink_error = fail_on_sink_error;
    }

    /// Share a cancellation flag. Raising it stops reading, discards the queued lines and
    /// skips the sort pass; the run then fails with [PartitionError::Cancelled]
    pub fn with_cancellation(&mut self, cancelled: Arc<AtomicBool>) {
        self.cancelled = cancelled;
    }

    /// Partition and sort the input file
    pub fn run(&self) -> Result<PartitionOutcome, anyhow::Error> {
        let config = Arc::new(self.create_config());
        let file_size = Self::input_size(&config)?;
        if file_size == 0 {
            log::info!("Input {} is empty, nothing to partition", config.input().display());
            return Ok(PartitionOutcome::EmptyInput);
        }

        let (current_soft, current_hard) = Self::get_rlimits()?;
        log::info!("Current rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        let new_soft = min(max((config.files() + 256) as u64, current_soft), current_hard);
        log::info!("Set new rlimit NOFILE, soft: {}, hard: {}", new_soft, current_hard);
        Self::set_rlimits(new_soft, current_hard)?;
        let result = Self::internal_partition(&config, file_size);
        log::info!("Restore rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        Self::set_rlimits(current_soft, current_hard)?;
        result
    }

    /// Verify an output directory: every bucket file holds only lines of its own key, in
    /// byte order. Files that are not bucket files are ignored
    pub fn check(&self) -> Result<bool, anyhow::Error> {
        let entries = std::fs::read_dir(&self.output_dir)
            .with_context(|| anyhow!("path: {}", self.output_dir.display()))?;
        let mut buckets = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let key = entry.file_name().to_str().and_then(RoutingKey::from_file_name);
            if let Some(key) = key {
                buckets.push((key, entry.path()));
            }
        }
        buckets.sort();

        for (key, path) in buckets {
            if !check_bucket(&path, key, self.endl)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn input_size(config: &Config) -> Result<u64, anyhow::Error> {
        let input_error = |source: std::io::Error| PartitionError::InputOpen {
            path: config.input().clone(),
            source,
        };
        let file = File::open(config.input()).map_err(input_error)?;
        let metadata = file.metadata().map_err(input_error)?;
        if metadata.is_dir() {
            return Err(input_error(std::io::Error::new(std::io::ErrorKind::InvalidInput, "is a directory")).into());
        }
        Ok(metadata.len())
    }

    fn get_rlimits() -> Result<(u64, u64), anyhow::Error> {
        getrlimit(Resource::NOFILE).with_context(|| "getrlimit")
    }

    fn set_rlimits(soft: u64, hard: u64) -> Result<(), anyhow::Error> {
        setrlimit(Resource::NOFILE, soft, hard)
            .with_context(|| format!("set rlimit NOFILE, soft: {}, hard: {}", soft, hard))?;
        Ok(())
    }

    fn create_config(&self) -> Config {
        let mut tasks = self.tasks;
        if self.tasks == 0 {
            tasks = num_cpus::get();
        }

        Config::new(
            self.input.clone(),
            self.output_dir.clone(),
            tasks,
            max(self.consumers, 1),
            max(self.queue_size, 1),
            self.endl,
            self.trim_cr,
            self.ignore_lines.clone(),
            self.fail_on_sink_error,
            self.cancelled.clone(),
        )
    }

    fn build_pool(name: &str, tasks: usize, config: &Config) -> Result<ThreadPool, anyhow::Error> {
        let mut thread_pool_builder = ThreadPoolBuilder::new();
        let thread_pool = thread_pool_builder
            .with_name(name.to_string())
            .with_tasks(tasks)
            .with_queue_size(config.pool_queue_size())
            .with_shutdown_mode(ShutdownMode::CompletePending)
            .build()?;
        Ok(thread_pool)
    }

    fn internal_partition(config: &Arc<Config>, file_size: u64) -> Result<PartitionOutcome, anyhow::Error> {
        log::info!("Start partitioning {}, {} bytes", config.input().display(), file_size);
        let ranges = plan(file_size, config.tasks());
        let produced = Arc::new(AtomicU64::new(0));
        let registry = Arc::new(SinkRegistry::new(
            FileSinkFactory::new(config.output_dir().clone()),
            config.endl(),
        ));
        let mut queue = RoutingQueue::bounded(config.queue_size());

        let mut routing_pool = Self::build_pool("routing", config.consumers(), config)?;
        for _ in 0..config.consumers() {
            let route_command = Box::new(RouteCommand::new(queue.consumer(), registry.clone(), config.clone()));
            routing_pool.submit(route_command);
        }

        let mut reading_pool = Self::build_pool("reading", config.tasks(), config)?;
        for range in &ranges {
            let produce_command = Box::new(ProduceCommand::new(*range, queue.producer()?, config.clone(), produced.clone()));
            reading_pool.submit(produce_command);
        }

        log::info!("Shutting down reading pool");
        reading_pool.shutdown();
        reading_pool.join()?;
        log::info!("Finish reading, {} lines waiting for routing", queue.pending());
        queue.close();

        log::info!("Shutting down routing pool");
        routing_pool.shutdown();
        routing_pool.join()?;

        let closed = registry.close_all();
        log::info!(
            "Finish routing, ranges: {}, lines: {}, written: {}, dropped: {}, buckets: {}, failed buckets: {}",
            ranges.len(),
            produced.load(Ordering::Relaxed),
            registry.written(),
            registry.dropped(),
            closed.complete.len(),
            closed.failed.len()
        );

        if config.is_cancelled() {
            return Err(PartitionError::Cancelled.into());
        }
        if config.fail_on_sink_error() && registry.dropped() > 0 {
            return Err(PartitionError::SinkErrors { dropped: registry.dropped() }.into());
        }

        let mut results = Self::sort_buckets(&closed.complete, config)?;
        results.failed.extend(closed.failed);
        let summary = PartitionSummary::new(
            ranges.len(),
            produced.load(Ordering::Relaxed),
            registry.written(),
            registry.dropped(),
            results.sorted,
            results.failed,
        );
        log::info!(
            "Finish partitioning, sorted buckets: {}, failed buckets: {}",
            summary.buckets_sorted().len(),
            summary.buckets_failed().len()
        );
        Ok(PartitionOutcome::Completed(summary))
    }

    fn sort_buckets(keys: &[RoutingKey], config: &Config) -> Result<SortResults, anyhow::Error> {
        log::info!("Start sorting {} buckets", keys.len());
        let results = Arc::new(Mutex::new(SortResults::default()));
        let mut sorting_pool = Self::build_pool("sorting", config.tasks(), config)?;
        for key in keys {
            let sort_command = Box::new(SortBucketCommand::new(
                *key,
                key.bucket_path(config.output_dir()),
                config.endl(),
                results.clone(),
            ));
            sorting_pool.submit(sort_command);
        }
        log::info!("Shutting down sorting pool");
        sorting_pool.shutdown();
        sorting_pool.join()?;

        let mut results_guard = results.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(std::mem::take(&mut *results_guard))
    }
}
