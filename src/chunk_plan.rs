/// A half open byte range `[start, end)` of the input file assigned to one producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> ByteRange {
        ByteRange {
            start,
            end,
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn length(&self) -> u64 {
        self.end - self.start
    }
}

/// Split `file_size` bytes into `workers` consecutive ranges.
///
/// All ranges but the last have `file_size / workers` bytes; the last one absorbs the
/// remainder so the ranges cover `[0, file_size)` exactly. An empty file has no ranges.
/// A worker count of zero is treated as one.
pub fn plan(file_size: u64, workers: usize) -> Vec<ByteRange> {
    if file_size == 0 {
        return Vec::new();
    }
    let workers = workers.max(1) as u64;
    let chunk = file_size / workers;
    (0..workers)
        .map(|i| {
            let start = i * chunk;
            let end = if i == workers - 1 { file_size } else { start + chunk };
            ByteRange::new(start, end)
        })
        .collect()
}
