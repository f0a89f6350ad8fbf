//! Accession selection from NCBI organism reports.
//!
//! Reports are tab-separated with `#` comment lines. Column positions differ
//! per organism kind; see [`ReportLayout`].

use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;
use std::path::Path;

use chrono::NaiveDate;

use crate::domain::{Accession, OrganismKind, TaxId};
use crate::error::CuratorError;

const DATE_FORMAT: &str = "%Y/%m/%d";

/// Zero-based column positions of one report variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLayout {
    pub taxid: usize,
    pub replicons: usize,
    pub modified: Option<usize>,
    pub strain: Option<usize>,
}

impl ReportLayout {
    pub fn for_kind(kind: OrganismKind) -> Self {
        match kind {
            OrganismKind::Prokaryote => Self {
                taxid: 1,
                replicons: 8,
                modified: Some(14),
                strain: Some(22),
            },
            OrganismKind::Eukaryote | OrganismKind::Virus => Self {
                taxid: 1,
                replicons: 9,
                modified: None,
                strain: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RepliconKind {
    Chromosome,
    Plasmid,
    Unlabelled,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replicon {
    pub kind: RepliconKind,
    pub accession: Accession,
}

/// Splits a replicon column such as
/// `chromosome:NC_000913.3/U00096.3; plasmid F:NC_002483.1`.
///
/// Tokens whose accession does not start with `prefix` are dropped.
pub fn parse_replicons(field: &str, prefix: &str) -> Vec<Replicon> {
    let field = field.trim();
    if field.is_empty() || field == "-" {
        return Vec::new();
    }
    let mut replicons = Vec::new();
    for token in field.split(';').map(str::trim).filter(|token| !token.is_empty()) {
        let (kind, value) = match token.rsplit_once(':') {
            Some((label, value)) => (label_kind(label), value),
            None => (RepliconKind::Unlabelled, token),
        };
        match Accession::from_versioned(value) {
            Ok(accession) if accession.as_str().starts_with(prefix) => {
                replicons.push(Replicon { kind, accession });
            }
            Ok(_) => {}
            Err(_) => tracing::debug!(token, "skipping unparsable replicon"),
        }
    }
    replicons
}

fn label_kind(label: &str) -> RepliconKind {
    let label = label.trim().to_ascii_lowercase();
    if label.starts_with("chromosome") {
        RepliconKind::Chromosome
    } else if label.starts_with("plasmid") {
        RepliconKind::Plasmid
    } else {
        RepliconKind::Other
    }
}

/// One accepted accession of a prokaryote row. Chromosomes and plasmids are
/// ranked separately, one representative each per (taxon, strain).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessionRecord {
    pub accession: Accession,
    pub kind: RepliconKind,
    pub taxid: TaxId,
    pub strain: String,
    pub modified: NaiveDate,
}

pub struct AccessionResolver {
    kind: OrganismKind,
    layout: ReportLayout,
    taxa: BTreeSet<TaxId>,
    prefix: String,
    include_plasmids: bool,
}

impl AccessionResolver {
    pub fn new(kind: OrganismKind, taxa: BTreeSet<TaxId>, prefix: impl Into<String>) -> Self {
        Self {
            kind,
            layout: ReportLayout::for_kind(kind),
            taxa,
            prefix: prefix.into(),
            include_plasmids: false,
        }
    }

    pub fn with_plasmids(mut self, include: bool) -> Self {
        self.include_plasmids = include;
        self
    }

    pub fn resolve_file(&self, path: &Path) -> Result<BTreeSet<Accession>, CuratorError> {
        let file = std::fs::File::open(path)
            .map_err(|err| CuratorError::Filesystem(format!("open {}: {err}", path.display())))?;
        self.resolve(std::io::BufReader::new(file))
    }

    pub fn resolve<R: BufRead>(&self, reader: R) -> Result<BTreeSet<Accession>, CuratorError> {
        let mut latest: BTreeMap<RecordKey, AccessionRecord> = BTreeMap::new();
        let mut per_taxon: BTreeMap<TaxId, BTreeSet<Accession>> = BTreeMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|err| CuratorError::Filesystem(err.to_string()))?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let row_number = idx + 1;
            let columns: Vec<&str> = line.split('\t').collect();
            let taxid: TaxId = column(&columns, self.layout.taxid, row_number)?
                .parse()
                .map_err(|err| row_error(row_number, err))?;
            if !self.taxa.contains(&taxid) {
                continue;
            }
            let replicons = parse_replicons(
                column(&columns, self.layout.replicons, row_number)?,
                &self.prefix,
            );
            let accepted: Vec<Replicon> = replicons
                .into_iter()
                .filter(|replicon| self.accepts(replicon.kind))
                .collect();
            if accepted.is_empty() {
                continue;
            }

            if self.kind == OrganismKind::Prokaryote {
                for record in self.prokaryote_records(&columns, row_number, taxid, accepted)? {
                    keep_latest(&mut latest, record);
                }
            } else {
                per_taxon
                    .entry(taxid)
                    .or_default()
                    .extend(accepted.into_iter().map(|replicon| replicon.accession));
            }
        }

        let mut resolved: BTreeSet<Accession> = per_taxon.into_values().flatten().collect();
        resolved.extend(latest.into_values().map(|record| record.accession));
        tracing::info!(kind = %self.kind, count = resolved.len(), "resolved accessions");
        Ok(resolved)
    }

    fn accepts(&self, kind: RepliconKind) -> bool {
        match self.kind {
            OrganismKind::Prokaryote => {
                kind == RepliconKind::Chromosome
                    || (self.include_plasmids && kind == RepliconKind::Plasmid)
            }
            OrganismKind::Eukaryote => kind == RepliconKind::Chromosome,
            OrganismKind::Virus => true,
        }
    }

    fn prokaryote_records(
        &self,
        columns: &[&str],
        row_number: usize,
        taxid: TaxId,
        replicons: Vec<Replicon>,
    ) -> Result<Vec<AccessionRecord>, CuratorError> {
        let modified = match self.layout.modified {
            Some(idx) => {
                let raw = column(columns, idx, row_number)?;
                NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
                    .map_err(|err| row_error(row_number, format!("date '{raw}': {err}")))?
            }
            None => NaiveDate::MIN,
        };
        let strain = match self.layout.strain {
            Some(idx) => columns.get(idx).map(|value| value.trim()).unwrap_or_default(),
            None => "",
        };
        Ok(replicons
            .into_iter()
            .map(|replicon| AccessionRecord {
                accession: replicon.accession,
                kind: replicon.kind,
                taxid,
                strain: strain.to_string(),
                modified,
            })
            .collect())
    }
}

type RecordKey = (TaxId, String, RepliconKind);

/// Replaces the record kept for its key only when strictly newer, so the
/// first accession seen wins ties.
fn keep_latest(latest: &mut BTreeMap<RecordKey, AccessionRecord>, record: AccessionRecord) {
    let key = (record.taxid, record.strain.clone(), record.kind);
    let newer = latest
        .get(&key)
        .is_none_or(|kept| record.modified > kept.modified);
    if newer {
        latest.insert(key, record);
    }
}

fn column<'a>(columns: &[&'a str], idx: usize, row_number: usize) -> Result<&'a str, CuratorError> {
    columns.get(idx).copied().ok_or_else(|| {
        CuratorError::Format(format!(
            "report row {row_number} has {} columns, expected more than {idx}",
            columns.len()
        ))
    })
}

fn row_error(row_number: usize, err: impl std::fmt::Display) -> CuratorError {
    CuratorError::Format(format!("report row {row_number}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replicon_tokens_keep_labels_and_prefix() {
        let replicons = parse_replicons(
            "chromosome:NC_000913.3/U00096.3; plasmid F:NC_002483.1; chromosome II:CP0001.1",
            "N",
        );
        assert_eq!(replicons.len(), 2);
        assert_eq!(replicons[0].kind, RepliconKind::Chromosome);
        assert_eq!(replicons[0].accession.as_str(), "NC_000913");
        assert_eq!(replicons[1].kind, RepliconKind::Plasmid);
    }

    #[test]
    fn dash_means_no_replicons() {
        assert!(parse_replicons("-", "N").is_empty());
        let segments = parse_replicons("NC_001802.1/AF033819.3", "N");
        assert_eq!(segments[0].kind, RepliconKind::Unlabelled);
    }
}
