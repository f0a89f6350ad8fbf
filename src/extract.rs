//! Range extraction over a [`SequenceBinStore`].
//!
//! A range inside one bin is cut from that bin alone. A range that crosses
//! bin boundaries is cut from the concatenation of every bin it touches, with
//! offsets normalized to the first of them.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::bins::{SequenceBin, SequenceBinStore};
use crate::error::CuratorError;
use crate::genome::Genome;
use crate::process::{require_tool, run_capture};

/// Reads a slice of one bin file.
pub trait BinReader {
    /// `from` and `to` are 1-based, inclusive offsets into the bin.
    fn read_span(&self, bin: &SequenceBin, from: u64, to: u64) -> Result<String, CuratorError>;
}

/// Seeks into the bin file in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileBinReader;

impl BinReader for FileBinReader {
    fn read_span(&self, bin: &SequenceBin, from: u64, to: u64) -> Result<String, CuratorError> {
        let mut file = File::open(bin.path.as_std_path())
            .map_err(|err| CuratorError::Filesystem(format!("open {}: {err}", bin.path)))?;
        file.seek(SeekFrom::Start(from - 1))
            .map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        let mut buffer = vec![0u8; (to - from + 1) as usize];
        file.read_exact(&mut buffer)
            .map_err(|err| CuratorError::Filesystem(format!("read {}: {err}", bin.path)))?;
        String::from_utf8(buffer)
            .map_err(|err| CuratorError::Format(format!("bin {}: {err}", bin.path)))
    }
}

/// Delegates slicing to `cut -b`.
#[derive(Debug, Clone)]
pub struct CutBinReader {
    program: PathBuf,
}

impl CutBinReader {
    pub fn new() -> Result<Self, CuratorError> {
        Ok(Self {
            program: require_tool("cut")?,
        })
    }
}

impl BinReader for CutBinReader {
    fn read_span(&self, bin: &SequenceBin, from: u64, to: u64) -> Result<String, CuratorError> {
        let args = vec![
            "-b".to_string(),
            format!("{from}-{to}"),
            bin.path.to_string(),
        ];
        run_capture(&self.program, &args)
    }
}

pub struct SequenceExtractor<'a, B> {
    store: &'a SequenceBinStore,
    reader: B,
}

impl<'a, B: BinReader> SequenceExtractor<'a, B> {
    pub fn new(store: &'a SequenceBinStore, reader: B) -> Self {
        Self { store, reader }
    }

    /// Returns the residues at genome positions `start..=stop` (1-based).
    pub fn extract(&self, start: u64, stop: u64) -> Result<String, CuratorError> {
        let length = self.store.length();
        if start == 0 || start > stop || stop > length {
            return Err(CuratorError::OutOfRange {
                start,
                stop,
                length,
            });
        }
        let first = self
            .store
            .index_of(start)
            .ok_or(CuratorError::MissingBin(start))?;
        let last = self
            .store
            .index_of(stop)
            .ok_or(CuratorError::MissingBin(stop))?;
        let bins = &self.store.bins()[first..=last];
        let offset = bins[0].range.start - 1;

        if first == last {
            return self.reader.read_span(&bins[0], start - offset, stop - offset);
        }

        tracing::debug!(start, stop, bins = bins.len(), "range spans several bins");
        let mut joined = String::new();
        for bin in bins {
            joined.push_str(&self.reader.read_span(bin, 1, bin.range.width())?);
        }
        let from = (start - offset - 1) as usize;
        let to = (stop - offset) as usize;
        joined
            .get(from..to)
            .map(str::to_string)
            .ok_or(CuratorError::OutOfRange {
                start,
                stop,
                length,
            })
    }

    /// Fills every CDS range of `genome`, returning how many were resolved.
    pub fn resolve(&self, genome: &mut Genome) -> Result<usize, CuratorError> {
        let mut resolved = 0;
        for range in genome.ranges_mut() {
            range.sequence = Some(self.extract(range.start, range.stop)?);
            resolved += 1;
        }
        Ok(resolved)
    }
}
