use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use text_file_partition::error::PartitionError;
use text_file_partition::partition::Partition;
use text_file_partition::routing_key::RoutingKey;
use text_file_partition::summary::PartitionOutcome;

mod common;

const WORDS: &[u8] = b"apple\nBanana\nbread\ncherry\nblueberry\navocado\n";

#[test]
fn test_unwritable_bucket_drops_its_lines() -> Result<(), anyhow::Error> {
    let (scratch, input, output) = common::prepare_input(WORDS)?;
    // a directory in place of b.txt cannot be opened for appending
    fs::create_dir_all(output.join("b.txt"))?;

    let mut partition = Partition::new(input, output.clone());
    partition.with_tasks(3);
    let summary = match partition.run()? {
        PartitionOutcome::Completed(summary) => summary,
        PartitionOutcome::EmptyInput => panic!("Expected a completed run"),
    };

    assert_eq!(summary.lines_produced(), 6);
    assert_eq!(summary.lines_written(), 3);
    assert_eq!(summary.lines_dropped(), 3);
    assert_eq!(summary.buckets_sorted(), &vec![RoutingKey::new(b'a'), RoutingKey::new(b'c')]);
    assert_eq!(common::read_lines(output.join("a.txt"))?, vec!["apple", "avocado"]);
    assert_eq!(common::read_lines(output.join("c.txt"))?, vec!["cherry"]);
    fs::remove_dir_all(scratch)?;
    Ok(())
}

#[test]
fn test_unwritable_bucket_fails_strict_run() -> Result<(), anyhow::Error> {
    let (scratch, input, output) = common::prepare_input(WORDS)?;
    fs::create_dir_all(output.join("b.txt"))?;

    let mut partition = Partition::new(input, output.clone());
    partition.with_fail_on_sink_error(true);
    let error = partition.run().unwrap_err();
    assert!(matches!(
        error.downcast_ref::<PartitionError>(),
        Some(PartitionError::SinkErrors { dropped: 3 })
    ));
    fs::remove_dir_all(scratch)?;
    Ok(())
}

#[test]
fn test_output_dir_is_a_file() -> Result<(), anyhow::Error> {
    let (scratch, input, output) = common::prepare_input(WORDS)?;
    fs::write(&output, "not a directory")?;

    let partition = Partition::new(input, output.clone());
    let summary = match partition.run()? {
        PartitionOutcome::Completed(summary) => summary,
        PartitionOutcome::EmptyInput => panic!("Expected a completed run"),
    };
    assert_eq!(summary.lines_written(), 0);
    assert_eq!(summary.lines_dropped(), 6);
    assert!(summary.buckets_sorted().is_empty());
    assert_eq!(fs::read_to_string(&output)?, "not a directory");
    fs::remove_dir_all(scratch)?;
    Ok(())
}

#[test]
fn test_cancelled_run() -> Result<(), anyhow::Error> {
    let (scratch, input, output) = common::prepare_input(WORDS)?;
    let mut partition = Partition::new(input, output.clone());
    partition.with_cancellation(Arc::new(AtomicBool::new(true)));

    let error = partition.run().unwrap_err();
    assert!(matches!(error.downcast_ref::<PartitionError>(), Some(PartitionError::Cancelled)));
    assert!(!output.exists());
    fs::remove_dir_all(scratch)?;
    Ok(())
}

#[test]
fn test_check_detects_tampering() -> Result<(), anyhow::Error> {
    let (scratch, input, output) = common::prepare_input(WORDS)?;
    let partition = Partition::new(input, output.clone());
    partition.run()?;
    assert!(partition.check()?);

    fs::write(output.join("notes.md"), "ignored\n")?;
    assert!(partition.check()?);

    fs::write(output.join("b.txt"), "bread\nBanana\n")?;
    assert!(!partition.check()?);

    fs::write(output.join("b.txt"), "Banana\ncherry\n")?;
    assert!(!partition.check()?);
    fs::remove_dir_all(scratch)?;
    Ok(())
}

#[test]
fn test_check_missing_output() {
    common::setup();
    let scratch = common::temp_file_name("./target/partition-results/");
    let partition = Partition::new(scratch.join("input.txt"), scratch.join("output"));
    assert!(partition.check().is_err());
}

/// Links `a.txt` to `/dev/full`: opening succeeds, every write fails with no space left.
#[cfg(target_os = "linux")]
fn bucket_on_full_device(output: &std::path::Path) -> Result<bool, anyhow::Error> {
    if !std::path::Path::new("/dev/full").exists() {
        return Ok(false);
    }
    fs::create_dir_all(output)?;
    std::os::unix::fs::symlink("/dev/full", output.join("a.txt"))?;
    Ok(true)
}

#[cfg(target_os = "linux")]
#[test]
fn test_full_device_drops_buffered_lines() -> Result<(), anyhow::Error> {
    let (scratch, input, output) = common::prepare_input(WORDS)?;
    if bucket_on_full_device(&output)? {
        let mut partition = Partition::new(input, output.clone());
        partition.with_tasks(2);
        let summary = match partition.run()? {
            PartitionOutcome::Completed(summary) => summary,
            PartitionOutcome::EmptyInput => panic!("Expected a completed run"),
        };

        assert_eq!(summary.lines_produced(), 6);
        assert_eq!(summary.lines_written(), 4);
        assert_eq!(summary.lines_dropped(), 2);
        assert_eq!(summary.buckets_sorted(), &vec![RoutingKey::new(b'b'), RoutingKey::new(b'c')]);
        assert_eq!(summary.buckets_failed(), &vec![RoutingKey::new(b'a')]);
        assert_eq!(common::read_lines(output.join("b.txt"))?, vec!["Banana", "blueberry", "bread"]);
    }
    fs::remove_dir_all(scratch)?;
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn test_full_device_fails_strict_run() -> Result<(), anyhow::Error> {
    let (scratch, input, output) = common::prepare_input(WORDS)?;
    if bucket_on_full_device(&output)? {
        let mut partition = Partition::new(input, output.clone());
        partition.with_fail_on_sink_error(true);
        let error = partition.run().unwrap_err();
        assert!(matches!(
            error.downcast_ref::<PartitionError>(),
            Some(PartitionError::SinkErrors { dropped: 2 })
        ));
    }
    fs::remove_dir_all(scratch)?;
    Ok(())
}
