use std::io;

use assert_matches::assert_matches;

use genbank_curator::domain::CdsType;
use genbank_curator::error::CuratorError;
use genbank_curator::location::{parse_location, parse_location_lines};

fn wrapped(lines: &[&str]) -> std::vec::IntoIter<io::Result<String>> {
    lines
        .iter()
        .map(|line| Ok(line.to_string()))
        .collect::<Vec<_>>()
        .into_iter()
}

#[test]
fn join_keeps_textual_order() {
    let loc = parse_location("join(100..200,300..400)").unwrap();
    assert_eq!(loc.cds_type, CdsType::Join);
    assert_eq!(loc.spans, vec![(100, 200), (300, 400)]);
}

#[test]
fn complement_join_is_labelled() {
    let loc = parse_location("complement(join(100..200,300..400))").unwrap();
    assert_eq!(loc.cds_type, CdsType::ComplementJoin);
    assert_eq!(loc.spans, vec![(100, 200), (300, 400)]);
}

#[test]
fn wrapped_expression_matches_single_line() {
    let mut lines = wrapped(&[
        "                     20..30,",
        "                     40..50)",
        "                     /gene=\"next\"",
    ]);
    let (multi, consumed) = parse_location_lines("join(1..10,", &mut lines).unwrap();
    let single = parse_location("join(1..10,20..30,40..50)").unwrap();

    assert_eq!(multi, single);
    assert_eq!(consumed, 2);
    assert_eq!(lines.next().unwrap().unwrap().trim(), "/gene=\"next\"");
}

#[test]
fn single_line_consumes_nothing() {
    let mut lines = wrapped(&["                     /gene=\"x\""]);
    let (loc, consumed) = parse_location_lines("complement(5..9)", &mut lines).unwrap();
    assert_eq!(consumed, 0);
    assert_eq!(loc.cds_type, CdsType::Complement);
}

#[test]
fn order_reads_as_join() {
    let loc = parse_location("order(1..5,8..9)").unwrap();
    assert_eq!(loc.cds_type, CdsType::Join);
}

#[test]
fn single_base_position() {
    let loc = parse_location("join(7,10..12)").unwrap();
    assert_eq!(loc.spans, vec![(7, 7), (10, 12)]);
}

#[test]
fn join_of_one_local_range_collapses() {
    let loc = parse_location("join(NC_2.1:1..5,10..20)").unwrap();
    assert_eq!(loc.cds_type, CdsType::Default);
    assert_eq!(loc.spans, vec![(10, 20)]);
}

#[test]
fn remote_only_location_fails() {
    assert_matches!(
        parse_location("NC_2.1:1..5"),
        Err(CuratorError::Format(_))
    );
}
