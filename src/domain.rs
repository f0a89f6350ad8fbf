use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CuratorError;

const GENOME_REPORTS_URL: &str = "https://ftp.ncbi.nlm.nih.gov/genomes/GENOME_REPORTS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganismKind {
    Prokaryote,
    Eukaryote,
    Virus,
}

impl OrganismKind {
    pub fn report_file_name(&self) -> &'static str {
        match self {
            OrganismKind::Prokaryote => "prokaryotes.txt",
            OrganismKind::Eukaryote => "eukaryotes.txt",
            OrganismKind::Virus => "viruses.txt",
        }
    }

    pub fn report_url(&self) -> String {
        format!("{GENOME_REPORTS_URL}/{}", self.report_file_name())
    }

    /// Eukaryotic genomes are only ever streamed into bins; the other kinds
    /// also keep the full nucleotide sequence on the genome row.
    pub fn retains_whole_sequence(&self) -> bool {
        !matches!(self, OrganismKind::Eukaryote)
    }
}

impl fmt::Display for OrganismKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrganismKind::Prokaryote => write!(f, "prokaryote"),
            OrganismKind::Eukaryote => write!(f, "eukaryote"),
            OrganismKind::Virus => write!(f, "virus"),
        }
    }
}

impl FromStr for OrganismKind {
    type Err = CuratorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "p" | "prokaryote" | "prokaryotes" => Ok(OrganismKind::Prokaryote),
            "e" | "eukaryote" | "eukaryotes" => Ok(OrganismKind::Eukaryote),
            "v" | "virus" | "viruses" => Ok(OrganismKind::Virus),
            _ => Err(CuratorError::InvalidKind(value.to_string())),
        }
    }
}

/// Unversioned sequence accession, e.g. `NC_000913`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Accession(String);

impl Accession {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses `AC.version` (optionally followed by a `/alias`) and drops the
    /// version suffix.
    pub fn from_versioned(value: &str) -> Result<Self, CuratorError> {
        let primary = value.trim().split('/').next().unwrap_or_default();
        let unversioned = primary.split('.').next().unwrap_or_default();
        unversioned
            .parse()
            .map_err(|_| CuratorError::InvalidAccession(value.to_string()))
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Accession {
    type Err = CuratorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = !normalized.is_empty()
            && normalized.starts_with(|ch: char| ch.is_ascii_alphabetic())
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        if !is_valid {
            return Err(CuratorError::InvalidAccession(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaxId(pub u32);

impl fmt::Display for TaxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaxId {
    type Err = CuratorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse()
            .map(TaxId)
            .map_err(|err| CuratorError::Format(format!("taxon id '{value}': {err}")))
    }
}

/// Orientation label of a coding-sequence location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CdsType {
    Default,
    Join,
    Complement,
    ComplementJoin,
}

impl CdsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CdsType::Default => "default",
            CdsType::Join => "join",
            CdsType::Complement => "complement",
            CdsType::ComplementJoin => "complement_join",
        }
    }

    pub fn is_joined(&self) -> bool {
        matches!(self, CdsType::Join | CdsType::ComplementJoin)
    }
}

impl fmt::Display for CdsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
