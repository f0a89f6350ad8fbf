//! Fixed-width, range-addressable partitions of a genome sequence.
//!
//! A genome's residues are written as contiguous files named `<start>-<stop>`
//! (1-based, inclusive) under a per-genome directory, so later lookups only
//! ever touch the one or few bins a range falls into.

use std::fmt;
use std::fs;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::error::CuratorError;

pub const DEFAULT_BIN_WIDTH: u64 = 85_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct BinRange {
    pub start: u64,
    pub stop: u64,
}

impl BinRange {
    pub fn width(&self) -> u64 {
        self.stop - self.start + 1
    }

    pub fn contains(&self, position: u64) -> bool {
        position >= self.start && position <= self.stop
    }

    pub fn covers(&self, start: u64, stop: u64) -> bool {
        start >= self.start && stop <= self.stop
    }
}

impl fmt::Display for BinRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.stop)
    }
}

impl FromStr for BinRange {
    type Err = CuratorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || CuratorError::Format(format!("bin name '{value}'"));
        let (start, stop) = value.split_once('-').ok_or_else(invalid)?;
        let start: u64 = start.parse().map_err(|_| invalid())?;
        let stop: u64 = stop.parse().map_err(|_| invalid())?;
        if start == 0 || start > stop {
            return Err(invalid());
        }
        Ok(Self { start, stop })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceBin {
    pub range: BinRange,
    pub path: Utf8PathBuf,
}

#[derive(Debug, Clone)]
pub struct SequenceBinStore {
    dir: Utf8PathBuf,
    bins: Vec<SequenceBin>,
    length: u64,
}

impl SequenceBinStore {
    /// Splits an in-memory sequence into bins of `width` under `dir`.
    pub fn partition(dir: &Utf8Path, width: u64, sequence: &str) -> Result<Self, CuratorError> {
        let mut writer = BinWriter::create(dir, width, false)?;
        writer.push(sequence)?;
        let (store, _) = writer.finish()?;
        Ok(store)
    }

    /// Re-opens bins previously written to `dir`.
    pub fn open(dir: &Utf8Path) -> Result<Self, CuratorError> {
        let entries = fs::read_dir(dir.as_std_path())
            .map_err(|err| CuratorError::Filesystem(format!("read {dir}: {err}")))?;
        let mut bins = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| CuratorError::Filesystem(err.to_string()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            bins.push(SequenceBin {
                range: name.parse()?,
                path: dir.join(name),
            });
        }
        bins.sort_by_key(|bin| bin.range);

        let mut expected = 1u64;
        for bin in &bins {
            if bin.range.start != expected {
                return Err(CuratorError::Format(format!(
                    "bins in {dir} are not contiguous at {}",
                    bin.range
                )));
            }
            expected = bin.range.stop + 1;
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            bins,
            length: expected - 1,
        })
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    pub fn bins(&self) -> &[SequenceBin] {
        &self.bins
    }

    /// Total number of residues across all bins.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn index_of(&self, position: u64) -> Option<usize> {
        let idx = self.bins.partition_point(|bin| bin.range.stop < position);
        self.bins
            .get(idx)
            .filter(|bin| bin.range.contains(position))
            .map(|_| idx)
    }

    pub fn remove(self) -> Result<(), CuratorError> {
        if self.dir.as_std_path().exists() {
            fs::remove_dir_all(self.dir.as_std_path())
                .map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }
}

/// Streams residues into bins, holding at most one bin in memory unless the
/// whole sequence is retained.
pub struct BinWriter {
    dir: Utf8PathBuf,
    width: u64,
    pending: String,
    next_start: u64,
    bins: Vec<SequenceBin>,
    whole: Option<String>,
}

impl BinWriter {
    /// Prepares an empty `dir`, removing bins left by an earlier run.
    pub fn create(dir: &Utf8Path, width: u64, retain_whole: bool) -> Result<Self, CuratorError> {
        if width == 0 {
            return Err(CuratorError::InvalidConfig("bin width must be positive".to_string()));
        }
        if dir.as_std_path().exists() {
            fs::remove_dir_all(dir.as_std_path())
                .map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        }
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            width,
            pending: String::new(),
            next_start: 1,
            bins: Vec::new(),
            whole: retain_whole.then(String::new),
        })
    }

    pub fn push(&mut self, residues: &str) -> Result<(), CuratorError> {
        if !residues.is_ascii() {
            return Err(CuratorError::Format(format!(
                "non-ASCII residues in bin starting at {}",
                self.next_start
            )));
        }
        if let Some(whole) = self.whole.as_mut() {
            whole.push_str(residues);
        }
        self.pending.push_str(residues);
        let width = self.width as usize;
        while self.pending.len() >= width {
            let rest = self.pending.split_off(width);
            let full = std::mem::replace(&mut self.pending, rest);
            self.write_bin(&full)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<(SequenceBinStore, Option<String>), CuratorError> {
        if !self.pending.is_empty() {
            let last = std::mem::take(&mut self.pending);
            self.write_bin(&last)?;
        }
        let store = SequenceBinStore {
            dir: self.dir,
            bins: self.bins,
            length: self.next_start - 1,
        };
        Ok((store, self.whole))
    }

    fn write_bin(&mut self, content: &str) -> Result<(), CuratorError> {
        let range = BinRange {
            start: self.next_start,
            stop: self.next_start + content.len() as u64 - 1,
        };
        let path = self.dir.join(range.to_string());
        fs::write(path.as_std_path(), content.as_bytes())
            .map_err(|err| CuratorError::Filesystem(format!("write {path}: {err}")))?;
        tracing::debug!(bin = %range, "wrote sequence bin");
        self.next_start = range.stop + 1;
        self.bins.push(SequenceBin { range, path });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_partition_the_sequence() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().join("NC_1")).unwrap();
        let store = SequenceBinStore::partition(&dir, 4, "acgtacgtac").unwrap();

        let names: Vec<String> = store.bins().iter().map(|bin| bin.range.to_string()).collect();
        assert_eq!(names, vec!["1-4", "5-8", "9-10"]);
        assert_eq!(store.length(), 10);
        assert_eq!(store.index_of(5), Some(1));
        assert_eq!(store.index_of(11), None);

        let reopened = SequenceBinStore::open(&dir).unwrap();
        assert_eq!(reopened.bins(), store.bins());
    }

    #[test]
    fn streamed_chunks_match_single_push() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().join("NC_2")).unwrap();
        let mut writer = BinWriter::create(&dir, 3, true).unwrap();
        for chunk in ["ac", "gtac", "g"] {
            writer.push(chunk).unwrap();
        }
        let (store, whole) = writer.finish().unwrap();
        assert_eq!(whole.as_deref(), Some("acgtacg"));
        assert_eq!(store.bins().len(), 3);
        assert_eq!(
            fs::read_to_string(store.bins()[1].path.as_std_path()).unwrap(),
            "tac"
        );
    }

    #[test]
    fn non_ascii_residues_are_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().join("NC_3")).unwrap();
        let err = SequenceBinStore::partition(&dir, 3, "aa\u{e9}t").unwrap_err();
        assert!(matches!(err, CuratorError::Format(_)));
    }

    #[test]
    fn bin_names_must_be_ranges() {
        assert!("10-2".parse::<BinRange>().is_err());
        assert!("abc".parse::<BinRange>().is_err());
        assert_eq!(
            "85001-170000".parse::<BinRange>().unwrap().width(),
            85_000
        );
    }
}
