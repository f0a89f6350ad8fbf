use camino::{Utf8Path, Utf8PathBuf};

use genbank_curator::domain::{Accession, OrganismKind};
use genbank_curator::store::{Store, file_stem};

#[test]
fn layout_paths() {
    let store = Store::new_with_root(Utf8PathBuf::from("/srv/gb"));
    let acc: Accession = "NC_003070".parse().unwrap();

    assert!(store.report_path(OrganismKind::Eukaryote).ends_with("genbank/eukaryotes.txt"));
    assert!(store.genomes_dir().ends_with("genbank/genomes"));
    assert!(store.seqbins_dir(&acc).ends_with("seqbins/NC_003070"));
    assert!(store.directive_path().ends_with("fetch_genomes.sh"));
    assert!(store.retry_directive_path().ends_with("fetch_genomes_retry.sh"));
    assert!(store.export_dir().starts_with(store.root()));
}

#[test]
fn default_root_is_under_cache() {
    let store = Store::new().unwrap();
    assert!(store.root().ends_with(".cache/genbank-curator"));
}

#[test]
fn atomic_write_replaces_content() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("nested/fetch.sh")).unwrap();
    Store::write_bytes_atomic(&path, b"first").unwrap();
    Store::write_bytes_atomic(&path, b"second").unwrap();
    assert_eq!(std::fs::read_to_string(path.as_std_path()).unwrap(), "second");
    assert_eq!(Store::list_files(path.parent().unwrap()).unwrap(), vec![path.clone()]);
}

#[test]
fn listing_skips_hidden_and_directories() {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    std::fs::write(dir.join("NC_2.txt").as_std_path(), b"").unwrap();
    std::fs::write(dir.join("NC_1.txt").as_std_path(), b"").unwrap();
    std::fs::write(dir.join(".NC_3.txt").as_std_path(), b"").unwrap();
    std::fs::create_dir(dir.join("NC_4").as_std_path()).unwrap();

    let files = Store::list_files(&dir).unwrap();
    let names: Vec<&str> = files.iter().filter_map(|path| file_stem(path)).collect();
    assert_eq!(names, vec!["NC_1", "NC_2"]);
    assert!(Store::list_files(Utf8Path::new("/nonexistent/gbcur")).unwrap().is_empty());
}
