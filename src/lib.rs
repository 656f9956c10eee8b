//! This crate partitions the lines of a text file into one file per initial letter and sorts
//! each of these files.
//!
//! Every non-empty line of the input goes to the bucket file named after its first byte,
//! ASCII lowercased: `Apple` and `avocado` both land in `a.txt`. The input is split into byte
//! ranges that are read concurrently; lines flow through a bounded queue to a pool of writer
//! threads that share one registry of open bucket files. Once every line is written the
//! bucket files are sorted by byte order, each one in memory.
//!
//! # Examples
//! ```
//! use std::path::PathBuf;
//! use text_file_partition::partition::Partition;
//!
//! fn partition(input: PathBuf, output: PathBuf) -> Result<(), anyhow::Error> {
//!     let mut partition = Partition::new(input, output);
//!
//!     // set number of byte ranges read concurrently. The default is to use all available
//!     // cores.
//!     partition.with_tasks(2);
//!
//!     // strip the '\r' of CRLF line endings before routing.
//!     partition.with_trim_cr(true);
//!
//!     partition.run()?;
//!     Ok(())
//! }
//! ```
//!

pub(crate) mod bucket_sort;
pub(crate) mod bucket_writer;
pub(crate) mod config;
pub(crate) mod line_producer;

pub mod chunk_plan;
pub mod error;
pub mod partition;
pub mod routing_key;
pub mod routing_queue;
pub mod sink_registry;
pub mod summary;
