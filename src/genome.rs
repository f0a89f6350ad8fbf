//! Genome aggregate built by the flat-file parser and consumed by persistence.

use serde::Serialize;

use crate::domain::{Accession, CdsType};

/// 1-based inclusive range on the genome axis. `sequence` is filled once the
/// range has been cut out of the sequence bins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NtRange {
    pub start: u64,
    pub stop: u64,
    pub sequence: Option<String>,
}

impl NtRange {
    pub fn new(start: u64, stop: u64) -> Self {
        Self {
            start,
            stop,
            sequence: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cds {
    pub gene: Option<String>,
    pub locus_tag: Option<String>,
    pub product: Option<String>,
    pub protein_id: Option<String>,
    pub cross_ref: Option<String>,
    pub translation: Option<String>,
    pub cds_type: CdsType,
    pub ranges: Vec<NtRange>,
}

impl Cds {
    pub fn new(cds_type: CdsType, ranges: Vec<NtRange>) -> Self {
        Self {
            gene: None,
            locus_tag: None,
            product: None,
            protein_id: None,
            cross_ref: None,
            translation: None,
            cds_type,
            ranges,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.ranges.iter().all(|range| range.sequence.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Genome {
    pub accession: Accession,
    pub organism: String,
    pub sequence: Option<String>,
    cds: Vec<Cds>,
}

impl Genome {
    pub fn new(accession: Accession) -> Self {
        Self {
            accession,
            organism: String::new(),
            sequence: None,
            cds: Vec::new(),
        }
    }

    pub fn push_cds(&mut self, cds: Cds) {
        self.cds.push(cds);
    }

    /// The CDS currently receiving qualifiers: always the last one appended.
    pub fn current_cds_mut(&mut self) -> Option<&mut Cds> {
        self.cds.last_mut()
    }

    pub fn cds(&self) -> &[Cds] {
        &self.cds
    }

    pub fn ranges_mut(&mut self) -> impl Iterator<Item = &mut NtRange> {
        self.cds.iter_mut().flat_map(|cds| cds.ranges.iter_mut())
    }

    pub fn range_count(&self) -> usize {
        self.cds.iter().map(|cds| cds.ranges.len()).sum()
    }

    pub fn is_resolved(&self) -> bool {
        self.cds.iter().all(Cds::is_resolved)
    }
}
