use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::accession::AccessionResolver;
use crate::bins::{BinWriter, SequenceBinStore};
use crate::config::{ExtractorKind, ResolvedConfig};
use crate::directive::{DirectiveRunner, DirectiveTemplate};
use crate::domain::{Accession, OrganismKind};
use crate::error::CuratorError;
use crate::extract::{CutBinReader, FileBinReader, SequenceExtractor};
use crate::genbank::{FlatFileRecordParser, open_flat_file};
use crate::genome::Genome;
use crate::persist::{PersistReport, PersistenceSink, persist_genome};
use crate::reconcile::{DownloadReconciler, ReconcileReport};
use crate::retrieve::Retriever;
use crate::store::{Store, file_stem};

#[derive(Debug, Clone, Serialize)]
pub struct ReportResult {
    pub kind: OrganismKind,
    pub url: String,
    pub path: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveResult {
    pub kind: OrganismKind,
    pub report: String,
    pub directive: String,
    pub accessions: Vec<Accession>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub resolved: ResolveResult,
    pub reconcile: ReconcileReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenomeResult {
    pub accession: Accession,
    pub organism: String,
    pub length: u64,
    pub cds: usize,
    pub ranges: usize,
    pub persisted: PersistReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub genomes: Vec<GenomeResult>,
    pub skipped: Vec<SkippedFile>,
    pub inserted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub download: DownloadResult,
    pub process: ProcessResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractResult {
    pub accession: Accession,
    pub start: u64,
    pub stop: u64,
    pub sequence: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<D: DirectiveRunner> {
    store: Store,
    config: ResolvedConfig,
    runner: D,
}

impl<D: DirectiveRunner> App<D> {
    pub fn new(store: Store, config: ResolvedConfig, runner: D) -> Self {
        Self {
            store,
            config,
            runner,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn template(&self) -> DirectiveTemplate {
        DirectiveTemplate {
            url_template: self.config.fetch.url_template.clone(),
            staging_dir: self.store.staging_dir(),
            target_dir: self.store.genomes_dir(),
        }
    }

    /// Downloads the organism report for the configured kind.
    pub fn fetch_report<T: Retriever>(
        &self,
        retriever: &T,
        sink: &dyn ProgressSink,
    ) -> Result<ReportResult, CuratorError> {
        let kind = self.config.kind;
        let url = kind.report_url();
        let path = self.store.report_path(kind);
        sink.event(ProgressEvent {
            message: format!("phase=Report; downloading {}", kind.report_file_name()),
            elapsed: None,
        });
        let started = Instant::now();
        let bytes = retriever.retrieve(&url, path.as_std_path())?;
        tracing::info!(url = %url, path = %path, bytes, "downloaded organism report");
        sink.event(ProgressEvent {
            message: format!("phase=Report; saved {path}"),
            elapsed: Some(started.elapsed()),
        });
        Ok(ReportResult {
            kind,
            url,
            path: path.to_string(),
            bytes,
        })
    }

    /// Selects accessions from the report and writes the initial directive.
    pub fn resolve(
        &self,
        report: Option<&Utf8Path>,
        sink: &dyn ProgressSink,
    ) -> Result<ResolveResult, CuratorError> {
        let kind = self.config.kind;
        let report = report
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| self.store.report_path(kind));
        if !report.as_std_path().exists() {
            return Err(CuratorError::Filesystem(format!(
                "organism report not found at {report}"
            )));
        }
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; scanning {report}"),
            elapsed: None,
        });

        let accessions = AccessionResolver::new(
            kind,
            self.config.taxon_ids.clone(),
            self.config.refseq_prefix.clone(),
        )
        .with_plasmids(self.config.include_plasmids)
        .resolve_file(report.as_std_path())?;

        let directive = self.template().directive(&accessions);
        let directive_path = self.store.directive_path();
        Store::write_bytes_atomic(
            &directive_path,
            directive.render(&self.config.fetch.program).as_bytes(),
        )?;

        Ok(ResolveResult {
            kind,
            report: report.to_string(),
            directive: directive_path.to_string(),
            accessions: accessions.into_iter().collect(),
        })
    }

    /// Resolves accessions, then reconciles the genome directory against them.
    pub fn download(
        &self,
        report: Option<&Utf8Path>,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadResult, CuratorError> {
        self.store.ensure_layout()?;
        let resolved = self.resolve(report, sink)?;
        let required: BTreeSet<Accession> = resolved.accessions.iter().cloned().collect();

        let template = self.template();
        let reconciler = DownloadReconciler::new(
            &self.runner,
            &template,
            self.config.fetch.policy,
            self.config.fetch.program.clone(),
            self.store.directive_path(),
            self.store.retry_directive_path(),
        );
        let reconcile = reconciler.reconcile(&required, sink)?;
        Ok(DownloadResult {
            resolved,
            reconcile,
        })
    }

    /// Parses, extracts and persists every genome file. Files that fail with
    /// a record-level error are skipped; other errors abort the run.
    pub fn process(
        &self,
        persist: &mut dyn PersistenceSink,
        sink: &dyn ProgressSink,
    ) -> Result<ProcessResult, CuratorError> {
        let files = Store::list_files(&self.store.genomes_dir())?;
        let started = Instant::now();
        let mut result = ProcessResult {
            genomes: Vec::new(),
            skipped: Vec::new(),
            inserted: 0,
            failed: 0,
        };

        for (idx, path) in files.iter().enumerate() {
            sink.event(ProgressEvent {
                message: format!("phase=Process; {} ({}/{})", path, idx + 1, files.len()),
                elapsed: Some(started.elapsed()),
            });
            match self.process_file(path, persist) {
                Ok(genome) => {
                    result.inserted += genome.persisted.inserted;
                    result.failed += genome.persisted.failed;
                    result.genomes.push(genome);
                }
                Err(err) if is_record_error(&err) => {
                    tracing::warn!(path = %path, error = %err, "skipping genome file");
                    result.skipped.push(SkippedFile {
                        path: path.to_string(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        Ok(result)
    }

    pub fn run(
        &self,
        report: Option<&Utf8Path>,
        persist: &mut dyn PersistenceSink,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, CuratorError> {
        let download = self.download(report, sink)?;
        let process = self.process(persist, sink)?;
        Ok(RunResult { download, process })
    }

    pub fn process_file(
        &self,
        path: &Utf8Path,
        persist: &mut dyn PersistenceSink,
    ) -> Result<GenomeResult, CuratorError> {
        let accession = accession_of(path)?;
        let bin_dir = self.store.seqbins_dir(&accession);
        let (mut genome, bins) = scan_and_bin(
            path,
            accession,
            &bin_dir,
            self.config.bin_width,
            self.config.kind.retains_whole_sequence(),
        )?;
        let length = bins.length();

        let resolved = resolve_ranges(&bins, self.config.extractor, &mut genome);
        let cleanup = if self.config.keep_bins {
            Ok(())
        } else {
            bins.remove()
        };
        resolved?;
        cleanup?;

        let persisted = persist_genome(persist, &genome);
        tracing::info!(
            accession = %genome.accession,
            cds = genome.cds().len(),
            inserted = persisted.inserted,
            failed = persisted.failed,
            "processed genome"
        );
        Ok(GenomeResult {
            cds: genome.cds().len(),
            ranges: genome.range_count(),
            accession: genome.accession,
            organism: genome.organism,
            length,
            persisted,
        })
    }
}

fn accession_of(path: &Utf8Path) -> Result<Accession, CuratorError> {
    file_stem(path)
        .ok_or_else(|| CuratorError::InvalidAccession(path.to_string()))?
        .parse()
}

/// Scans the first record of a flat file and streams its sequence into bins
/// under `bin_dir`.
fn scan_and_bin(
    path: &Utf8Path,
    accession: Accession,
    bin_dir: &Utf8Path,
    bin_width: u64,
    retain_sequence: bool,
) -> Result<(Genome, SequenceBinStore), CuratorError> {
    let reader = open_flat_file(path.as_std_path())?;
    let mut parser = FlatFileRecordParser::new(reader);
    let record = parser.parse_record(accession)?;
    let mut genome = record.genome;
    tracing::debug!(
        accession = %genome.accession,
        origin_line = record.origin_line,
        has_sequence = record.has_sequence,
        "scanned feature table"
    );

    let mut writer = BinWriter::create(bin_dir, bin_width, retain_sequence)?;
    for chunk in parser.residues() {
        writer.push(&chunk?)?;
    }
    let (bins, whole) = writer.finish()?;
    genome.sequence = whole;
    Ok((genome, bins))
}

fn resolve_ranges(
    bins: &SequenceBinStore,
    extractor: ExtractorKind,
    genome: &mut Genome,
) -> Result<usize, CuratorError> {
    match extractor {
        ExtractorKind::File => SequenceExtractor::new(bins, FileBinReader).resolve(genome),
        ExtractorKind::Cut => SequenceExtractor::new(bins, CutBinReader::new()?).resolve(genome),
    }
}

/// Cuts `start..=stop` out of the first record of a flat file.
pub fn extract_from_file(
    path: &Utf8Path,
    start: u64,
    stop: u64,
    bin_width: u64,
    extractor: ExtractorKind,
) -> Result<ExtractResult, CuratorError> {
    let accession = accession_of(path)?;
    let temp = tempfile::tempdir().map_err(|err| CuratorError::Filesystem(err.to_string()))?;
    let bin_dir = Utf8PathBuf::from_path_buf(temp.path().join(accession.as_str()))
        .map_err(|_| CuratorError::Filesystem("invalid UTF-8 temp path".to_string()))?;
    let (_, bins) = scan_and_bin(path, accession.clone(), &bin_dir, bin_width, false)?;

    let sequence = match extractor {
        ExtractorKind::File => SequenceExtractor::new(&bins, FileBinReader).extract(start, stop)?,
        ExtractorKind::Cut => {
            SequenceExtractor::new(&bins, CutBinReader::new()?).extract(start, stop)?
        }
    };
    Ok(ExtractResult {
        accession,
        start,
        stop,
        sequence,
    })
}

fn is_record_error(err: &CuratorError) -> bool {
    matches!(
        err,
        CuratorError::Format(_)
            | CuratorError::InvalidAccession(_)
            | CuratorError::OutOfRange { .. }
            | CuratorError::MissingBin(_)
    )
}
