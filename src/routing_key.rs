use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const BUCKET_EXTENSION: &str = ".txt";
const SAFE_PUNCTUATION: &[u8] = b"!#$%&'()+,-;=@[]^_`{}~";

/// The key selecting the bucket of a line: its first byte, ASCII lowercased.
///
/// Upper and lower case variants of a letter share a bucket. Bytes outside of ASCII are
/// used as they are.
///
/// # Examples
/// ```
/// use text_file_partition::routing_key::RoutingKey;
///
/// let key = RoutingKey::from_line(b"Apple").unwrap();
/// assert_eq!(key.byte(), b'a');
/// assert_eq!(key.file_name(), "a.txt");
/// assert!(RoutingKey::from_line(b"").is_none());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutingKey(u8);

impl RoutingKey {
    /// Create a key from a raw byte, lowercasing ASCII letters.
    pub fn new(byte: u8) -> RoutingKey {
        RoutingKey(byte.to_ascii_lowercase())
    }

    /// The key of a line, None for an empty line.
    pub fn from_line(line: &[u8]) -> Option<RoutingKey> {
        line.first().map(|b| RoutingKey::new(*b))
    }

    /// Recover the key from a bucket file name produced by [RoutingKey::file_name].
    pub fn from_file_name(name: &str) -> Option<RoutingKey> {
        let stem = name.strip_suffix(BUCKET_EXTENSION)?;
        let bytes = stem.as_bytes();
        if bytes.len() == 1 && Self::is_plain(bytes[0]) {
            Some(RoutingKey(bytes[0]))
        } else if let Some(hex) = stem.strip_prefix("0x") {
            if hex.len() != 2 {
                return None;
            }
            let byte = u8::from_str_radix(hex, 16).ok()?;
            if Self::is_plain(byte) || byte.is_ascii_uppercase() {
                None
            } else {
                Some(RoutingKey(byte))
            }
        } else {
            None
        }
    }

    pub fn byte(&self) -> u8 {
        self.0
    }

    /// Name of the bucket file, `<key>.txt` for keys that are safe in a file name and
    /// `0x<hh>.txt` for everything else.
    pub fn file_name(&self) -> String {
        if Self::is_plain(self.0) {
            format!("{}{}", self.0 as char, BUCKET_EXTENSION)
        } else {
            format!("0x{:02x}{}", self.0, BUCKET_EXTENSION)
        }
    }

    pub fn bucket_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(self.file_name())
    }

    fn is_plain(byte: u8) -> bool {
        byte.is_ascii_lowercase() || byte.is_ascii_digit() || SAFE_PUNCTUATION.contains(&byte)
    }
}

impl Display for RoutingKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.is_ascii_graphic() {
            write!(f, "'{}'", self.0 as char)
        } else {
            write!(f, "0x{:02x}", self.0)
        }
    }
}
