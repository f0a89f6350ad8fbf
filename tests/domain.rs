use assert_matches::assert_matches;

use genbank_curator::domain::{Accession, CdsType, OrganismKind, TaxId};
use genbank_curator::error::CuratorError;

#[test]
fn accession_strips_version() {
    let acc = Accession::from_versioned("NC_000913.3").unwrap();
    assert_eq!(acc.as_str(), "NC_000913");
    assert_eq!(acc.to_string(), "NC_000913");
}

#[test]
fn accession_rejects_empty() {
    assert_matches!("".parse::<Accession>(), Err(CuratorError::InvalidAccession(_)));
    assert_matches!(
        Accession::from_versioned(".3"),
        Err(CuratorError::InvalidAccession(_))
    );
}

#[test]
fn taxid_must_be_numeric() {
    assert_eq!("83333".parse::<TaxId>().unwrap(), TaxId(83333));
    assert_matches!("K12".parse::<TaxId>(), Err(CuratorError::Format(_)));
}

#[test]
fn organism_kind_reports() {
    assert_eq!(
        OrganismKind::Prokaryote.report_url(),
        "https://ftp.ncbi.nlm.nih.gov/genomes/GENOME_REPORTS/prokaryotes.txt"
    );
    assert_eq!("viruses".parse::<OrganismKind>().unwrap(), OrganismKind::Virus);
    assert_matches!("x".parse::<OrganismKind>(), Err(CuratorError::InvalidKind(_)));
}

#[test]
fn cds_type_labels() {
    assert_eq!(CdsType::ComplementJoin.as_str(), "complement_join");
    assert_eq!(
        serde_json::to_string(&CdsType::Complement).unwrap(),
        "\"complement\""
    );
    assert!(CdsType::Join.is_joined());
    assert!(!CdsType::Complement.is_joined());
}
