//! Line iteration over dump files, buffered or memory-mapped.
//!
//! LDAP exports taken from large domains can run to hundreds of megabytes;
//! files at or above the threshold are memory-mapped and scanned for line
//! boundaries with `memchr` instead of being pulled through a reader.
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use memmap2::Mmap;

pub const DEFAULT_MMAP_THRESHOLD_BYTES: u64 = 16 * 1024 * 1024; // 16 MiB

pub type LineIter = Box<dyn Iterator<Item = io::Result<String>> + Send + 'static>;

/// Open a dump file for line iteration. Files whose size is at or above
/// `mmap_threshold_bytes` are memory-mapped; pass `u64::MAX` to force the
/// buffered path.
pub fn dump_lines<P: AsRef<Path>>(path: P, mmap_threshold_bytes: u64) -> Result<LineIter> {
    let path = path.as_ref();
    let meta = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    if meta.is_file() && meta.len() >= mmap_threshold_bytes {
        let mmap =
            unsafe { Mmap::map(&file) }.with_context(|| format!("mmap {}", path.display()))?;
        Ok(Box::new(MappedLines { mmap, pos: 0 }))
    } else {
        Ok(Box::new(BufReader::new(file).lines()))
    }
}

struct MappedLines {
    mmap: Mmap,
    pos: usize,
}

impl Iterator for MappedLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let data: &[u8] = &self.mmap;
        if self.pos >= data.len() {
            return None;
        }
        let start = self.pos;
        match memchr::memchr(b'\n', &data[start..]) {
            Some(off) => {
                self.pos = start + off + 1;
                Some(Ok(decode_line(&data[start..start + off])))
            }
            None => {
                self.pos = data.len();
                Some(Ok(decode_line(&data[start..])))
            }
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    // CRLF exports are common; drop the trailing '\r'.
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
