//! Retry-until-complete download reconciliation.
//!
//! Each round writes and runs a directive, lists which accessions now have a
//! file in the target directory, and re-requests exactly the missing ones.

use std::collections::BTreeSet;
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::directive::{DirectiveRunner, DirectiveTemplate, FetchDirective};
use crate::domain::Accession;
use crate::error::CuratorError;
use crate::store::{Store, file_stem};

pub const DEFAULT_MAX_ROUNDS: u32 = 10;
pub const DEFAULT_BACKOFF_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries until every accession is present.
    pub max_rounds: Option<u32>,
    /// Round `n` waits `n * backoff` before the next round.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rounds: Some(DEFAULT_MAX_ROUNDS),
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, round: u32) -> Duration {
        self.backoff * round
    }

    /// True once `round` attempts have been made and no further one is allowed.
    pub fn exhausted(&self, round: u32) -> bool {
        self.max_rounds.is_some_and(|max| round >= max)
    }
}

/// `required − present`.
pub fn missing_accessions(
    required: &BTreeSet<Accession>,
    present: &BTreeSet<Accession>,
) -> BTreeSet<Accession> {
    required.difference(present).cloned().collect()
}

/// Accessions that have a file in `dir`, keyed by file stem.
pub fn present_accessions(dir: &Utf8Path) -> Result<BTreeSet<Accession>, CuratorError> {
    let mut present = BTreeSet::new();
    for path in Store::list_files(dir)? {
        match file_stem(&path).map(str::parse::<Accession>) {
            Some(Ok(accession)) => {
                present.insert(accession);
            }
            _ => tracing::debug!(path = %path, "ignoring file without accession stem"),
        }
    }
    Ok(present)
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    pub round: u32,
    pub requested: usize,
    pub missing: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub required: usize,
    pub rounds: Vec<RoundSummary>,
}

pub struct DownloadReconciler<'a, D: DirectiveRunner> {
    runner: &'a D,
    template: &'a DirectiveTemplate,
    policy: RetryPolicy,
    program: String,
    directive_path: Utf8PathBuf,
    retry_path: Utf8PathBuf,
}

impl<'a, D: DirectiveRunner> DownloadReconciler<'a, D> {
    pub fn new(
        runner: &'a D,
        template: &'a DirectiveTemplate,
        policy: RetryPolicy,
        program: impl Into<String>,
        directive_path: Utf8PathBuf,
        retry_path: Utf8PathBuf,
    ) -> Self {
        Self {
            runner,
            template,
            policy,
            program: program.into(),
            directive_path,
            retry_path,
        }
    }

    /// Runs rounds until every `required` accession is present in the
    /// template's target directory. Accessions already present are never
    /// requested.
    pub fn reconcile(
        &self,
        required: &BTreeSet<Accession>,
        sink: &dyn ProgressSink,
    ) -> Result<ReconcileReport, CuratorError> {
        let started = Instant::now();
        let mut rounds = Vec::new();
        let mut missing =
            missing_accessions(required, &present_accessions(&self.template.target_dir)?);
        let mut round = 1u32;

        while !missing.is_empty() {
            let directive = self.template.directive(&missing);
            let path = if round == 1 {
                &self.directive_path
            } else {
                &self.retry_path
            };
            self.execute(&directive, path)?;

            let present = present_accessions(&self.template.target_dir)?;
            missing = missing_accessions(required, &present);
            rounds.push(RoundSummary {
                round,
                requested: directive.len(),
                missing: missing.len(),
            });
            tracing::info!(
                round,
                requested = directive.len(),
                missing = missing.len(),
                "download round finished"
            );
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Download; round {round}: {} of {} present",
                    required.len() - missing.len(),
                    required.len()
                ),
                elapsed: Some(started.elapsed()),
            });

            if missing.is_empty() {
                break;
            }
            if self.policy.exhausted(round) {
                return Err(CuratorError::RetryLimit {
                    rounds: round,
                    missing: missing.len(),
                });
            }
            thread::sleep(self.policy.delay_after(round));
            round += 1;
        }

        Ok(ReconcileReport {
            required: required.len(),
            rounds,
        })
    }

    fn execute(&self, directive: &FetchDirective, path: &Utf8Path) -> Result<(), CuratorError> {
        Store::write_bytes_atomic(path, directive.render(&self.program).as_bytes())?;
        self.runner.run(directive, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: &[&str]) -> BTreeSet<Accession> {
        values.iter().map(|value| value.parse().unwrap()).collect()
    }

    #[test]
    fn missing_is_set_difference() {
        let required = set(&["NC_1", "NC_2", "NC_3"]);
        let present = set(&["NC_1", "NC_9"]);
        assert_eq!(missing_accessions(&required, &present), set(&["NC_2", "NC_3"]));
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy {
            max_rounds: None,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_after(3), Duration::from_millis(300));
        assert!(!policy.exhausted(1_000));
    }
}
