use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use data_encoding::HEXLOWER;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use text_file_partition::routing_key::RoutingKey;

pub fn setup() {
    let results_dir_path = PathBuf::from_str("./target/partition-results/").unwrap();

    if !results_dir_path.exists() {
        fs::create_dir_all(&results_dir_path).unwrap_or_else(|_|
            panic!("Failed to create results directory: {:?}", results_dir_path)
        );
    } else {
        println!("Results directory exists at {:?}", results_dir_path);
    }
}

#[allow(dead_code)]
pub fn temp_file_name(dir: &str) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

/// A fresh scratch directory holding `input.txt` with `content`, and the path of a not yet
/// existing output directory next to it.
pub fn prepare_input(content: &[u8]) -> Result<(PathBuf, PathBuf, PathBuf), anyhow::Error> {
    setup();
    let scratch = temp_file_name("./target/partition-results/");
    fs::create_dir_all(&scratch)?;
    let input = scratch.join("input.txt");
    fs::write(&input, content)?;
    let output = scratch.join("output");
    Ok((scratch, input, output))
}

#[allow(dead_code)]
pub fn read_lines(path: PathBuf) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().map(|x| x.unwrap()).collect();
    Ok(lines)
}

/// Every bucket file of `output` with its key and lines.
#[allow(dead_code)]
pub fn read_buckets(output: &Path) -> Result<Vec<(RoutingKey, Vec<String>)>, anyhow::Error> {
    let mut buckets = Vec::new();
    for entry in fs::read_dir(output)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let key = RoutingKey::from_file_name(&name)
            .unwrap_or_else(|| panic!("Unexpected file in output: {}", name));
        buckets.push((key, read_lines(entry.path())?));
    }
    buckets.sort();
    Ok(buckets)
}

/// Reproducible random lines of 1 to 24 letters of either case, digits, blanks and a few
/// punctuation characters.
#[allow(dead_code)]
pub fn random_lines(count: usize, seed: u64) -> Vec<String> {
    let alphabet = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789#_- ";
    let mut rng = StdRng::seed_from_u64(seed);
    let mut lines = Vec::with_capacity(count);
    for _ in 0..count {
        let len = rng.gen_range(1..25);
        let line: String = (0..len)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
            .collect();
        lines.push(line);
    }
    lines
}
