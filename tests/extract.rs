use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use genbank_curator::bins::{DEFAULT_BIN_WIDTH, SequenceBinStore};
use genbank_curator::error::CuratorError;
use genbank_curator::extract::{BinReader, CutBinReader, FileBinReader, SequenceExtractor};
use genbank_curator::process::find_in_path;

fn genome(length: usize) -> String {
    (0..length)
        .map(|i| b"acgt"[(i * 7 + i / 13) % 4] as char)
        .collect()
}

fn partition(sequence: &str, width: u64) -> (tempfile::TempDir, SequenceBinStore) {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().join("NC_000001")).unwrap();
    let store = SequenceBinStore::partition(&dir, width, sequence).unwrap();
    (temp, store)
}

fn direct(sequence: &str, start: u64, stop: u64) -> &str {
    &sequence[(start - 1) as usize..stop as usize]
}

#[test]
fn bins_cover_genome_contiguously() {
    let sequence = genome(200_000);
    let (_temp, store) = partition(&sequence, DEFAULT_BIN_WIDTH);
    let names: Vec<String> = store
        .bins()
        .iter()
        .map(|bin| bin.path.file_name().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["1-85000", "85001-170000", "170001-200000"]);
    assert_eq!(store.length(), 200_000);
}

#[test]
fn boundary_and_inner_ranges_match_direct_cut() {
    let sequence = genome(200_000);
    let (_temp, store) = partition(&sequence, DEFAULT_BIN_WIDTH);
    let extractor = SequenceExtractor::new(&store, FileBinReader);

    for (start, stop) in [
        (84_999, 85_002),
        (10, 20),
        (85_000, 85_000),
        (85_001, 85_001),
        (169_990, 170_010),
        (199_990, 200_000),
    ] {
        assert_eq!(
            extractor.extract(start, stop).unwrap(),
            direct(&sequence, start, stop),
            "range {start}..{stop}"
        );
    }
}

#[test]
fn range_over_three_bins() {
    let sequence = genome(200_000);
    let (_temp, store) = partition(&sequence, DEFAULT_BIN_WIDTH);
    let extractor = SequenceExtractor::new(&store, FileBinReader);
    assert_eq!(extractor.extract(1, 200_000).unwrap(), sequence);
    assert_eq!(
        extractor.extract(80_000, 175_000).unwrap(),
        direct(&sequence, 80_000, 175_000)
    );
}

#[test]
fn reopened_store_extracts_the_same() {
    let sequence = genome(1_000);
    let (_temp, store) = partition(&sequence, 300);
    let reopened = SequenceBinStore::open(store.dir()).unwrap();
    let extractor = SequenceExtractor::new(&reopened, FileBinReader);
    assert_eq!(extractor.extract(295, 610).unwrap(), direct(&sequence, 295, 610));
}

#[test]
fn out_of_range_requests_fail() {
    let sequence = genome(1_000);
    let (_temp, store) = partition(&sequence, 300);
    let extractor = SequenceExtractor::new(&store, FileBinReader);
    assert_matches!(
        extractor.extract(990, 1_001),
        Err(CuratorError::OutOfRange {
            length: 1_000,
            ..
        })
    );
    assert_matches!(extractor.extract(20, 10), Err(CuratorError::OutOfRange { .. }));
}

#[test]
fn cut_reader_agrees_with_file_reader() {
    if find_in_path("cut").is_none() {
        return;
    }
    let sequence = genome(1_000);
    let (_temp, store) = partition(&sequence, 300);
    let cut = CutBinReader::new().unwrap();
    let bin = &store.bins()[1];
    assert_eq!(
        cut.read_span(bin, 5, 40).unwrap(),
        FileBinReader.read_span(bin, 5, 40).unwrap()
    );

    let extractor = SequenceExtractor::new(&store, cut);
    assert_eq!(extractor.extract(290, 320).unwrap(), direct(&sequence, 290, 320));
}
