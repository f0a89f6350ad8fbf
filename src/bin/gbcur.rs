use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use genbank_curator::app::App;
use genbank_curator::app::extract_from_file;
use genbank_curator::bins::DEFAULT_BIN_WIDTH;
use genbank_curator::config::{
    Config, ConfigLoader, ExtractorKind, FetchStrategy, ResolvedConfig, TaxonEntry,
};
use genbank_curator::directive::{DirectiveRunner, HttpRunner, ScriptRunner};
use genbank_curator::error::CuratorError;
use genbank_curator::output::{JsonOutput, LogProgress};
use genbank_curator::persist::JsonLinesSink;
use genbank_curator::retrieve::HttpRetriever;
use genbank_curator::store::Store;

#[derive(Parser)]
#[command(name = "gbcur")]
#[command(about = "Curate RefSeq GenBank genomes into organism, CDS and nucleotide-range records")]
#[command(version, author)]
struct Cli {
    /// Config file (default: gbcur.json in the current directory)
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// prokaryote, eukaryote or virus (P/E/V)
    #[arg(long, global = true)]
    kind: Option<String>,

    #[arg(long = "taxid", global = true)]
    taxids: Vec<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download the organism report for the configured kind")]
    Report,
    #[command(about = "Resolve accessions and write the fetch directive")]
    Resolve(ReportArgs),
    #[command(about = "Resolve accessions and download until every genome is present")]
    Download(ReportArgs),
    #[command(about = "Parse, extract and export every downloaded genome")]
    Process(ExportArgs),
    #[command(about = "Download, then process")]
    Run(RunArgs),
    #[command(about = "Print a nucleotide range of one flat file")]
    Extract(ExtractArgs),
}

#[derive(Args)]
struct ReportArgs {
    /// Organism report to read instead of the downloaded one
    #[arg(long)]
    report: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct ExportArgs {
    /// Directory receiving the JSON-lines rows
    #[arg(long)]
    export: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    report: Option<Utf8PathBuf>,

    #[arg(long)]
    export: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct ExtractArgs {
    file: Utf8PathBuf,
    start: u64,
    stop: u64,

    #[arg(long, default_value_t = DEFAULT_BIN_WIDTH)]
    bin_width: u64,

    /// Slice bins with `cut -b` instead of reading them in-process
    #[arg(long)]
    cut: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<CuratorError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CuratorError) -> u8 {
    match error {
        CuratorError::MissingConfig
        | CuratorError::ConfigRead(_)
        | CuratorError::ConfigParse(_)
        | CuratorError::InvalidConfig(_)
        | CuratorError::InvalidKind(_) => 2,
        CuratorError::Process(_)
        | CuratorError::MissingTool(_)
        | CuratorError::FetchHttp(_)
        | CuratorError::FetchStatus { .. } => 3,
        CuratorError::RetryLimit { .. } => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Extraction works on a single file and needs neither config nor store.
    if let Commands::Extract(args) = &cli.command {
        return run_extract(args);
    }

    let config = load_config(&cli)?;
    let store = match &config.data_dir {
        Some(dir) => Store::new_with_root(dir.clone()),
        None => Store::new()?,
    };

    match config.fetch.strategy {
        FetchStrategy::Script => {
            let app = App::new(store, config, ScriptRunner::new()?);
            dispatch(cli.command, app)
        }
        FetchStrategy::Http => {
            let app = App::new(store, config, HttpRunner::new(HttpRetriever::new()?));
            dispatch(cli.command, app)
        }
    }
}

fn load_config(cli: &Cli) -> Result<ResolvedConfig, CuratorError> {
    let mut config = match ConfigLoader::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(CuratorError::MissingConfig) if cli.kind.is_some() && !cli.taxids.is_empty() => {
            Config::default()
        }
        Err(err) => return Err(err),
    };
    if let Some(kind) = &cli.kind {
        config.kind = Some(kind.clone());
    }
    if !cli.taxids.is_empty() {
        config.taxon_ids = cli.taxids.iter().copied().map(TaxonEntry::Number).collect();
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    ConfigLoader::resolve_config(config)
}

fn dispatch<D: DirectiveRunner>(command: Commands, app: App<D>) -> miette::Result<()> {
    let sink = LogProgress;
    match command {
        Commands::Report => {
            let retriever = HttpRetriever::new()?;
            app.store().ensure_layout()?;
            let result = app.fetch_report(&retriever, &sink)?;
            JsonOutput::print_report(&result).into_diagnostic()
        }
        Commands::Resolve(args) => {
            let result = app.resolve(args.report.as_deref(), &sink)?;
            JsonOutput::print_resolve(&result).into_diagnostic()
        }
        Commands::Download(args) => {
            let result = app.download(args.report.as_deref(), &sink)?;
            JsonOutput::print_download(&result).into_diagnostic()
        }
        Commands::Process(args) => {
            let export = args.export.unwrap_or_else(|| app.store().export_dir());
            let mut rows = JsonLinesSink::create(&export)?;
            let result = app.process(&mut rows, &sink)?;
            rows.flush()?;
            JsonOutput::print_process(&result).into_diagnostic()
        }
        Commands::Run(args) => {
            let export = args.export.unwrap_or_else(|| app.store().export_dir());
            let mut rows = JsonLinesSink::create(&export)?;
            let result = app.run(args.report.as_deref(), &mut rows, &sink)?;
            rows.flush()?;
            JsonOutput::print_run(&result).into_diagnostic()
        }
        Commands::Extract(args) => run_extract(&args),
    }
}

fn run_extract(args: &ExtractArgs) -> miette::Result<()> {
    let extractor = if args.cut {
        ExtractorKind::Cut
    } else {
        ExtractorKind::File
    };
    let result = extract_from_file(&args.file, args.start, args.stop, args.bin_width, extractor)?;
    JsonOutput::print_extract(&result).into_diagnostic()
}
