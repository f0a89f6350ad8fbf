use std::time::Duration;

use assert_matches::assert_matches;

use genbank_curator::config::{Config, ConfigLoader, ExtractorKind, FetchStrategy};
use genbank_curator::directive::DEFAULT_URL_TEMPLATE;
use genbank_curator::domain::{OrganismKind, TaxId};
use genbank_curator::error::CuratorError;

fn parse(json: &str) -> Result<genbank_curator::config::ResolvedConfig, CuratorError> {
    let config: Config = serde_json::from_str(json).unwrap();
    ConfigLoader::resolve_config(config)
}

#[test]
fn full_config_resolves() {
    let resolved = parse(
        r#"{
            "kind": "eukaryote",
            "taxon_ids": [3702, "9606"],
            "data_dir": "/srv/genbank",
            "bin_width": 50000,
            "keep_bins": true,
            "extractor": "cut",
            "fetch": {
                "strategy": "http",
                "max_rounds": null,
                "backoff_ms": 500
            }
        }"#,
    )
    .unwrap();

    assert_eq!(resolved.kind, OrganismKind::Eukaryote);
    assert_eq!(
        resolved.taxon_ids.into_iter().collect::<Vec<_>>(),
        vec![TaxId(3702), TaxId(9606)]
    );
    assert_eq!(resolved.data_dir.unwrap().as_str(), "/srv/genbank");
    assert_eq!(resolved.bin_width, 50_000);
    assert!(resolved.keep_bins);
    assert_eq!(resolved.extractor, ExtractorKind::Cut);
    assert_eq!(resolved.fetch.strategy, FetchStrategy::Http);
    assert_eq!(resolved.fetch.policy.max_rounds, None);
    assert_eq!(resolved.fetch.policy.backoff, Duration::from_millis(500));
    assert_eq!(resolved.fetch.url_template, DEFAULT_URL_TEMPLATE);
    assert_eq!(resolved.fetch.program, "wget");
}

#[test]
fn kind_is_required() {
    assert_matches!(
        parse(r#"{ "taxon_ids": [1] }"#),
        Err(CuratorError::InvalidConfig(_))
    );
}

#[test]
fn unknown_kind_is_rejected() {
    assert_matches!(
        parse(r#"{ "kind": "fungus", "taxon_ids": [1] }"#),
        Err(CuratorError::InvalidKind(_))
    );
}

#[test]
fn taxon_ids_are_required() {
    assert_matches!(
        parse(r#"{ "kind": "virus" }"#),
        Err(CuratorError::InvalidConfig(_))
    );
}

#[test]
fn template_needs_placeholder() {
    assert_matches!(
        parse(r#"{ "kind": "V", "taxon_ids": [1], "fetch": { "url_template": "https://x/y" } }"#),
        Err(CuratorError::InvalidConfig(msg)) if msg.contains("{accession}")
    );
}

#[test]
fn zero_width_bins_are_rejected() {
    assert_matches!(
        parse(r#"{ "kind": "V", "taxon_ids": [1], "bin_width": 0 }"#),
        Err(CuratorError::InvalidConfig(_))
    );
}

#[test]
fn explicit_missing_file_is_a_read_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    assert_matches!(
        ConfigLoader::resolve(Some(path.to_str().unwrap())),
        Err(CuratorError::ConfigRead(_))
    );
}

#[test]
fn malformed_json_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("gbcur.json");
    std::fs::write(&path, "{ kind: ").unwrap();
    assert_matches!(
        ConfigLoader::resolve(Some(path.to_str().unwrap())),
        Err(CuratorError::ConfigParse(_))
    );
}
