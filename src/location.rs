//! Feature location expressions.
//!
//! Handles `start..stop`, `join(...)`, `complement(...)` and
//! `complement(join(...))`, including expressions wrapped over several lines
//! (a line that still ends in `,` continues on the next one). Partiality
//! markers `<` and `>` are dropped. Ranges are returned in textual order;
//! complement never reverses them.

use std::io;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::CdsType;
use crate::error::CuratorError;
use crate::genome::NtRange;

static RANGE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(?:\.\.(\d+))?$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub cds_type: CdsType,
    pub spans: Vec<(u64, u64)>,
}

impl Location {
    pub fn ranges(&self) -> Vec<NtRange> {
        self.spans
            .iter()
            .map(|&(start, stop)| NtRange::new(start, stop))
            .collect()
    }
}

/// Parses a location that may continue over further lines.
///
/// Returns the location and the number of extra lines pulled from `lines`.
pub fn parse_location_lines<I>(
    first: &str,
    lines: &mut I,
) -> Result<(Location, usize), CuratorError>
where
    I: Iterator<Item = io::Result<String>>,
{
    let mut text = first.trim().to_string();
    let mut consumed = 0usize;
    while text.ends_with(',') {
        let next = lines
            .next()
            .ok_or_else(|| CuratorError::Format(format!("unterminated location '{text}'")))?
            .map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        consumed += 1;
        text.push_str(next.trim());
    }
    Ok((parse_location(&text)?, consumed))
}

pub fn parse_location(text: &str) -> Result<Location, CuratorError> {
    let compact: String = text
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '<' && *ch != '>')
        .collect();

    let mut cds_type = if compact.starts_with("complement(join(")
        || compact.starts_with("complement(order(")
    {
        CdsType::ComplementJoin
    } else if compact.starts_with("complement(") {
        CdsType::Complement
    } else if compact.starts_with("join(") || compact.starts_with("order(") {
        CdsType::Join
    } else {
        CdsType::Default
    };

    let inner = compact
        .replace("complement(", "")
        .replace("join(", "")
        .replace("order(", "");
    // join(complement(a..b),complement(c..d)) is the reverse strand as a whole
    if cds_type == CdsType::Join {
        let parts = compact.matches(',').count() + 1;
        if compact.matches("complement(").count() == parts {
            cds_type = CdsType::ComplementJoin;
        }
    }

    let mut spans = Vec::new();
    for token in inner.replace(')', "").split(',') {
        if token.is_empty() {
            continue;
        }
        if token.contains(':') || token.contains('^') {
            tracing::warn!(token, "skipping non-local location token");
            continue;
        }
        let caps = RANGE_TOKEN.captures(token).ok_or_else(|| {
            CuratorError::Format(format!("location token '{token}' in '{text}'"))
        })?;
        let start = parse_coordinate(&caps[1])?;
        let stop = match caps.get(2) {
            Some(stop) => parse_coordinate(stop.as_str())?,
            None => start,
        };
        if start > stop {
            return Err(CuratorError::Format(format!(
                "location range {start}..{stop} is reversed"
            )));
        }
        spans.push((start, stop));
    }

    match (cds_type, spans.len()) {
        (_, 0) => {
            return Err(CuratorError::Format(format!(
                "location '{}' has no local range",
                text.trim()
            )));
        }
        (CdsType::Join, 1) => cds_type = CdsType::Default,
        (CdsType::ComplementJoin, 1) => cds_type = CdsType::Complement,
        (CdsType::Default | CdsType::Complement, n) if n > 1 => {
            return Err(CuratorError::Format(format!(
                "location '{}' lists {n} ranges without join",
                text.trim()
            )));
        }
        _ => {}
    }

    Ok(Location { cds_type, spans })
}

fn parse_coordinate(value: &str) -> Result<u64, CuratorError> {
    value
        .parse()
        .map_err(|err| CuratorError::Format(format!("coordinate '{value}': {err}")))
}
