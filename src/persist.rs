//! Persistence of resolved genomes.
//!
//! [`PersistenceSink`] is the insert-only boundary to the relational store.
//! [`persist_genome`] writes one genome row by row and keeps going when a row
//! fails; there is no transaction and no retry.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::domain::CdsType;
use crate::error::CuratorError;
use crate::genome::Genome;

pub type RowId = u64;

#[derive(Debug, Clone, Serialize)]
pub struct GenomeRow<'a> {
    pub accession: &'a str,
    pub organism: &'a str,
    pub nt_sequence: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CdsRow<'a> {
    pub genome_accession: &'a str,
    pub gene: Option<&'a str>,
    pub locus_tag: Option<&'a str>,
    pub product: Option<&'a str>,
    pub protein_id: Option<&'a str>,
    pub cross_ref: Option<&'a str>,
    pub translation: Option<&'a str>,
    pub cds_type: CdsType,
}

#[derive(Debug, Clone, Serialize)]
pub struct NtRangeRow<'a> {
    pub cds_id: RowId,
    pub start: u64,
    pub stop: u64,
    pub sequence: Option<&'a str>,
}

pub trait PersistenceSink {
    /// Inserts the organism unless a row with the same name exists.
    fn insert_organism(&mut self, name: &str) -> Result<(), CuratorError>;
    fn insert_genome(&mut self, row: &GenomeRow<'_>) -> Result<(), CuratorError>;
    fn insert_cds(&mut self, row: &CdsRow<'_>) -> Result<RowId, CuratorError>;
    fn insert_nt_range(&mut self, row: &NtRangeRow<'_>) -> Result<(), CuratorError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub inserted: usize,
    pub failed: usize,
}

impl PersistReport {
    fn record<T>(&mut self, result: Result<T, CuratorError>, what: &str) -> Option<T> {
        match result {
            Ok(value) => {
                self.inserted += 1;
                Some(value)
            }
            Err(err) => {
                tracing::warn!(row = what, error = %err, "insert failed");
                self.failed += 1;
                None
            }
        }
    }
}

/// Organism, genome, then every CDS followed by its ranges. A failed CDS
/// insert skips (and counts as failed) that CDS's ranges.
pub fn persist_genome(sink: &mut dyn PersistenceSink, genome: &Genome) -> PersistReport {
    let mut report = PersistReport::default();
    let accession = genome.accession.as_str();

    report.record(sink.insert_organism(&genome.organism), "organism");
    report.record(
        sink.insert_genome(&GenomeRow {
            accession,
            organism: &genome.organism,
            nt_sequence: genome.sequence.as_deref(),
        }),
        "genome",
    );

    for cds in genome.cds() {
        let row = CdsRow {
            genome_accession: accession,
            gene: cds.gene.as_deref(),
            locus_tag: cds.locus_tag.as_deref(),
            product: cds.product.as_deref(),
            protein_id: cds.protein_id.as_deref(),
            cross_ref: cds.cross_ref.as_deref(),
            translation: cds.translation.as_deref(),
            cds_type: cds.cds_type,
        };
        let Some(cds_id) = report.record(sink.insert_cds(&row), "cds") else {
            report.failed += cds.ranges.len();
            continue;
        };
        for range in &cds.ranges {
            let row = NtRangeRow {
                cds_id,
                start: range.start,
                stop: range.stop,
                sequence: range.sequence.as_deref(),
            };
            report.record(sink.insert_nt_range(&row), "nt_range");
        }
    }

    tracing::debug!(
        accession,
        inserted = report.inserted,
        failed = report.failed,
        "persisted genome"
    );
    report
}

/// Appends rows as JSON lines, one file per relation.
pub struct JsonLinesSink {
    dir: Utf8PathBuf,
    organism: BufWriter<File>,
    genome: BufWriter<File>,
    cds: BufWriter<File>,
    nt_range: BufWriter<File>,
    organisms: HashSet<String>,
    next_cds_id: RowId,
}

#[derive(Serialize)]
struct OrganismRow<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct Keyed<'a, T> {
    id: RowId,
    #[serde(flatten)]
    row: &'a T,
}

impl JsonLinesSink {
    pub fn create(dir: &Utf8Path) -> Result<Self, CuratorError> {
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| CuratorError::Filesystem(format!("create {dir}: {err}")))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            organism: open_relation(dir, "organism")?,
            genome: open_relation(dir, "genome")?,
            cds: open_relation(dir, "cds")?,
            nt_range: open_relation(dir, "nt_range")?,
            organisms: HashSet::new(),
            next_cds_id: 1,
        })
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    pub fn flush(&mut self) -> Result<(), CuratorError> {
        for writer in [
            &mut self.organism,
            &mut self.genome,
            &mut self.cds,
            &mut self.nt_range,
        ] {
            writer
                .flush()
                .map_err(|err| CuratorError::Persistence(err.to_string()))?;
        }
        Ok(())
    }
}

fn open_relation(dir: &Utf8Path, relation: &str) -> Result<BufWriter<File>, CuratorError> {
    let path = dir.join(format!("{relation}.jsonl"));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_std_path())
        .map_err(|err| CuratorError::Filesystem(format!("open {path}: {err}")))?;
    Ok(BufWriter::new(file))
}

fn write_row<T: Serialize>(writer: &mut BufWriter<File>, row: &T) -> Result<(), CuratorError> {
    serde_json::to_writer(&mut *writer, row)
        .map_err(|err| CuratorError::Persistence(err.to_string()))?;
    writer
        .write_all(b"\n")
        .map_err(|err| CuratorError::Persistence(err.to_string()))
}

impl PersistenceSink for JsonLinesSink {
    fn insert_organism(&mut self, name: &str) -> Result<(), CuratorError> {
        if self.organisms.contains(name) {
            return Ok(());
        }
        write_row(&mut self.organism, &OrganismRow { name })?;
        self.organisms.insert(name.to_string());
        Ok(())
    }

    fn insert_genome(&mut self, row: &GenomeRow<'_>) -> Result<(), CuratorError> {
        write_row(&mut self.genome, row)
    }

    fn insert_cds(&mut self, row: &CdsRow<'_>) -> Result<RowId, CuratorError> {
        let id = self.next_cds_id;
        write_row(&mut self.cds, &Keyed { id, row })?;
        self.next_cds_id += 1;
        Ok(id)
    }

    fn insert_nt_range(&mut self, row: &NtRangeRow<'_>) -> Result<(), CuratorError> {
        write_row(&mut self.nt_range, row)
    }
}

impl Drop for JsonLinesSink {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            tracing::warn!(error = %err, "failed to flush export rows");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Accession;
    use crate::genome::{Cds, NtRange};

    #[test]
    fn organisms_are_inserted_once() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let mut sink = JsonLinesSink::create(&dir).unwrap();

        let acc: Accession = "NC_1".parse().unwrap();
        let mut genome = Genome::new(acc);
        genome.organism = "Escherichia coli".to_string();
        let mut cds = Cds::new(CdsType::Default, vec![NtRange::new(1, 3)]);
        cds.ranges[0].sequence = Some("atg".to_string());
        genome.push_cds(cds);

        let first = persist_genome(&mut sink, &genome);
        persist_genome(&mut sink, &genome);
        sink.flush().unwrap();

        assert_eq!(first, PersistReport { inserted: 4, failed: 0 });
        let organisms = fs::read_to_string(temp.path().join("organism.jsonl")).unwrap();
        assert_eq!(organisms.lines().count(), 1);
        let cds_rows = fs::read_to_string(temp.path().join("cds.jsonl")).unwrap();
        assert!(cds_rows.lines().nth(1).unwrap().starts_with("{\"id\":2,"));
    }
}
