//! GenBank flat-file record scanner.
//!
//! One record is scanned line by line through an explicit [`ScanState`]. Each
//! line is classified into a [`LineKind`], and [`step`] maps the pair to the
//! next state plus an [`Action`] that the parser applies to the [`Genome`]
//! under construction. Scanning stops at `ORIGIN` (or `//` for a record
//! without sequence); the residues after `ORIGIN` are then available through
//! [`FlatFileRecordParser::residues`].

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::domain::Accession;
use crate::error::CuratorError;
use crate::genome::{Cds, Genome};
use crate::location::parse_location_lines;

const QUALIFIER_INDENT: &str = "                     ";
const FEATURE_INDENT: &str = "     ";
const SUBSTRAIN_JOINER: &str = " substr. ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrganismState {
    #[default]
    Unnamed,
    Continuing,
    /// Name read; strain qualifiers may still refine it.
    Named,
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CdsState {
    #[default]
    Outside,
    Qualifiers,
    ProductContinuing,
    TranslationContinuing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanState {
    pub organism: OrganismState,
    pub strain_seen: bool,
    pub cds: CdsState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Qualifier {
        key: &'a str,
        value: &'a str,
        closed: bool,
    },
    Feature {
        key: &'a str,
        location: &'a str,
    },
    Terminator {
        has_sequence: bool,
    },
    Other(&'a str),
}

pub fn classify(line: &str) -> LineKind<'_> {
    if line.starts_with("ORIGIN") {
        return LineKind::Terminator { has_sequence: true };
    }
    if line.starts_with("//") {
        return LineKind::Terminator {
            has_sequence: false,
        };
    }
    if let Some(body) = line.strip_prefix(QUALIFIER_INDENT) {
        if let Some(qualifier) = body.trim_end().strip_prefix('/') {
            let (key, raw) = qualifier.split_once('=').unwrap_or((qualifier, ""));
            return LineKind::Qualifier {
                key,
                value: raw,
                closed: is_closed(raw),
            };
        }
        return LineKind::Other(line);
    }
    if let Some(body) = line.strip_prefix(FEATURE_INDENT) {
        if body.starts_with(|ch: char| !ch.is_whitespace()) {
            let (key, location) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
            return LineKind::Feature {
                key,
                location: location.trim(),
            };
        }
    }
    LineKind::Other(line)
}

fn is_closed(raw: &str) -> bool {
    match raw.strip_prefix('"') {
        Some(rest) => rest.ends_with('"'),
        None => true,
    }
}

/// Value of a `/key="value"` qualifier with every quote removed.
pub fn qualifier_text(raw: &str) -> String {
    raw.replace('"', "")
}

fn continuation_text(line: &str) -> (String, bool) {
    let trimmed = line.trim();
    (trimmed.replace('"', ""), trimmed.ends_with('"'))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdsField {
    Gene,
    LocusTag,
    Product,
    ProteinId,
    CrossRef,
    Translation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<'a> {
    SetOrganism(String),
    AppendOrganism(String),
    MergeOrganism {
        qualifier: String,
        joiner: &'static str,
    },
    OpenCds(&'a str),
    SetField(CdsField, String),
    AppendProduct(String),
    AppendTranslation(String),
    Stop {
        has_sequence: bool,
    },
    None,
}

/// Transition table: first matching rule wins.
pub fn step<'a>(state: ScanState, line: LineKind<'a>) -> (ScanState, Action<'a>) {
    let mut next = state;
    let open = state.organism != OrganismState::Finalized;

    match line {
        LineKind::Qualifier { key: "organism", value, closed } if open => {
            next.organism = if closed {
                OrganismState::Named
            } else {
                OrganismState::Continuing
            };
            (next, Action::SetOrganism(qualifier_text(value)))
        }
        LineKind::Other(text) if state.organism == OrganismState::Continuing => {
            let (text, closed) = continuation_text(text);
            if closed {
                next.organism = OrganismState::Named;
            }
            (next, Action::AppendOrganism(text))
        }
        LineKind::Qualifier { key, value, .. }
            if open
                && (key == "strain"
                    || key == "sub_strain"
                    || (key == "isolate" && !state.strain_seen)) =>
        {
            if key == "strain" {
                next.strain_seen = true;
            }
            let joiner = if key == "sub_strain" {
                SUBSTRAIN_JOINER
            } else {
                " "
            };
            let qualifier = qualifier_text(value);
            (next, Action::MergeOrganism { qualifier, joiner })
        }
        LineKind::Qualifier { key: "db_xref", .. } if open => {
            next.organism = OrganismState::Finalized;
            (next, Action::None)
        }
        LineKind::Feature {
            key: "CDS",
            location,
        } => {
            next.cds = CdsState::Qualifiers;
            (next, Action::OpenCds(location))
        }
        LineKind::Other(text) if state.cds == CdsState::ProductContinuing => {
            let (text, closed) = continuation_text(text);
            if closed {
                next.cds = CdsState::Qualifiers;
            }
            (next, Action::AppendProduct(text))
        }
        LineKind::Other(text) if state.cds == CdsState::TranslationContinuing => {
            let (text, closed) = continuation_text(text);
            if closed {
                next.cds = CdsState::Qualifiers;
            }
            (next, Action::AppendTranslation(text))
        }
        LineKind::Qualifier { key, value, closed } if state.cds != CdsState::Outside => {
            next.cds = CdsState::Qualifiers;
            let field = match key {
                "gene" => CdsField::Gene,
                "locus_tag" => CdsField::LocusTag,
                "protein_id" => CdsField::ProteinId,
                "product" => {
                    if !closed {
                        next.cds = CdsState::ProductContinuing;
                    }
                    CdsField::Product
                }
                "translation" => {
                    if !closed {
                        next.cds = CdsState::TranslationContinuing;
                    }
                    CdsField::Translation
                }
                "db_xref" => match value.trim_matches('"').strip_prefix("GOA:") {
                    Some(ac) => return (next, Action::SetField(CdsField::CrossRef, ac.to_string())),
                    None => return (next, Action::None),
                },
                _ => return (next, Action::None),
            };
            (next, Action::SetField(field, qualifier_text(value)))
        }
        LineKind::Feature { key, .. } if key != "source" => {
            next.cds = CdsState::Outside;
            next.organism = OrganismState::Finalized;
            (next, Action::None)
        }
        LineKind::Terminator { has_sequence } => {
            next.cds = CdsState::Outside;
            (next, Action::Stop { has_sequence })
        }
        _ => (next, Action::None),
    }
}

/// Folds a strain-like qualifier into the organism name.
///
/// The qualifier replaces the name when it already contains it, is dropped
/// when one of its words already occurs in the name, and is appended with
/// `joiner` otherwise.
pub fn merge_organism(current: &str, qualifier: &str, joiner: &str) -> String {
    if qualifier.contains(current) {
        qualifier.to_string()
    } else if qualifier
        .split_whitespace()
        .any(|token| current.contains(token))
    {
        current.to_string()
    } else {
        format!("{current}{joiner}{qualifier}")
    }
}

#[derive(Debug, Clone)]
pub struct ParsedRecord {
    pub genome: Genome,
    /// 1-based line number at which scanning stopped.
    pub origin_line: usize,
    pub has_sequence: bool,
}

pub struct FlatFileRecordParser<R> {
    lines: Lines<R>,
    line_number: usize,
    in_sequence: bool,
}

impl<R: BufRead> FlatFileRecordParser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
            in_sequence: false,
        }
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Scans the header and feature table of one record.
    pub fn parse_record(&mut self, accession: Accession) -> Result<ParsedRecord, CuratorError> {
        let mut genome = Genome::new(accession);
        let mut state = ScanState::default();

        while let Some(line) = self.lines.next() {
            let line = line.map_err(|err| CuratorError::Filesystem(err.to_string()))?;
            self.line_number += 1;

            let (next, action) = step(state, classify(&line));
            state = next;
            match action {
                Action::SetOrganism(name) => genome.organism = name,
                Action::AppendOrganism(text) => {
                    genome.organism = format!("{} {text}", genome.organism);
                }
                Action::MergeOrganism { qualifier, joiner } => {
                    genome.organism = merge_organism(&genome.organism, &qualifier, joiner);
                }
                Action::OpenCds(location) => {
                    let (location, consumed) = parse_location_lines(location, &mut self.lines)
                        .map_err(|err| match err {
                            CuratorError::Format(msg) => CuratorError::Format(format!(
                                "{} line {}: {msg}",
                                genome.accession, self.line_number
                            )),
                            other => other,
                        })?;
                    self.line_number += consumed;
                    genome.push_cds(Cds::new(location.cds_type, location.ranges()));
                }
                Action::SetField(field, value) => {
                    if let Some(cds) = genome.current_cds_mut() {
                        set_field(cds, field, value);
                    }
                }
                Action::AppendProduct(text) => {
                    if let Some(cds) = genome.current_cds_mut() {
                        let product = cds.product.get_or_insert_with(String::new);
                        product.push(' ');
                        product.push_str(&text);
                    }
                }
                Action::AppendTranslation(text) => {
                    if let Some(cds) = genome.current_cds_mut() {
                        cds.translation.get_or_insert_with(String::new).push_str(&text);
                    }
                }
                Action::Stop { has_sequence } => {
                    self.in_sequence = has_sequence;
                    return Ok(ParsedRecord {
                        genome,
                        origin_line: self.line_number,
                        has_sequence,
                    });
                }
                Action::None => {}
            }
        }

        Err(CuratorError::Format(format!(
            "{}: record ended without ORIGIN or // after {} lines",
            genome.accession, self.line_number
        )))
    }

    /// Residue chunks (one per sequence line) following `ORIGIN`, up to `//`.
    pub fn residues(&mut self) -> Residues<'_, R> {
        Residues { parser: self }
    }
}

fn set_field(cds: &mut Cds, field: CdsField, value: String) {
    let slot = match field {
        CdsField::Gene => &mut cds.gene,
        CdsField::LocusTag => &mut cds.locus_tag,
        CdsField::Product => &mut cds.product,
        CdsField::ProteinId => &mut cds.protein_id,
        CdsField::CrossRef => &mut cds.cross_ref,
        CdsField::Translation => &mut cds.translation,
    };
    *slot = Some(value);
}

pub struct Residues<'a, R> {
    parser: &'a mut FlatFileRecordParser<R>,
}

impl<R: BufRead> Iterator for Residues<'_, R> {
    type Item = Result<String, CuratorError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.parser.in_sequence {
            let line = match self.parser.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(err)) => return Some(Err(CuratorError::Filesystem(err.to_string()))),
                None => {
                    self.parser.in_sequence = false;
                    return None;
                }
            };
            self.parser.line_number += 1;
            if line.starts_with("//") {
                self.parser.in_sequence = false;
                return None;
            }
            let chunk: String = line.split_whitespace().skip(1).collect();
            if !chunk.is_ascii() {
                self.parser.in_sequence = false;
                return Some(Err(CuratorError::Format(format!(
                    "non-ASCII residue on line {}",
                    self.parser.line_number
                ))));
            }
            if !chunk.is_empty() {
                return Some(Ok(chunk));
            }
        }
        None
    }
}

/// Opens a flat file, decoding gzip when the name ends in `.gz`.
pub fn open_flat_file(path: &Path) -> Result<Box<dyn BufRead>, CuratorError> {
    let file = File::open(path)
        .map_err(|err| CuratorError::Filesystem(format!("open {}: {err}", path.display())))?;
    let is_gz = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if is_gz {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}
