use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use regex::bytes::Regex;

#[derive(Clone)]
pub(crate) struct Config {
    input: PathBuf,
    output_dir: PathBuf,
    tasks: usize,
    consumers: usize,
    queue_size: usize,
    pool_queue_size: usize,
    endl: u8,
    trim_cr: bool,
    ignore_lines: Option<Regex>,
    fail_on_sink_error: bool,
    files: usize,
    cancelled: Arc<AtomicBool>,
}

impl Config {
    pub(crate) fn new(
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
    ) -> Config {
        let pool_queue_size = 4096;
        // one sink per possible key
        let files = 256;
        Config {
            input,
            output_dir,
            tasks,
            consumers,
            queue_size,
            pool_queue_size,
            endl,
            trim_cr,
            ignore_lines,
            fail_on_sink_error,
            files,
            cancelled,
        }
    }

    pub(crate) fn input(&self) -> &PathBuf {
        &self.input
    }

    pub(crate) fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    pub(crate) fn tasks(&self) -> usize {
        self.tasks
    }

    pub(crate) fn consumers(&self) -> usize {
        self.consumers
    }

    pub(crate) fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub(crate) fn pool_queue_size(&self) -> usize {
        self.pool_queue_size
    }

    pub(crate) fn endl(&self) -> u8 {
        self.endl
    }

    pub(crate) fn trim_cr(&self) -> bool {
        self.trim_cr
    }

    pub(crate) fn ignore_lines(&self) -> &Option<Regex> {
        &self.ignore_lines
    }

    pub(crate) fn fail_on_sink_error(&self) -> bool {
        self.fail_on_sink_error
    }

    pub(crate) fn files(&self) -> usize {
        self.files
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn cancel_for_test(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use crate::config::Config;

    pub(crate) fn test_config(input: PathBuf, output_dir: PathBuf) -> Config {
        Config::new(
            input,
            output_dir,
            2,
            2,
            16,
            b'\n',
            false,
            None,
            false,
            Arc::new(AtomicBool::new(false)),
        )
    }
}
