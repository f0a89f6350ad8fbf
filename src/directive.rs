//! Fetch directives: per-accession retrieval plus rename instructions.
//!
//! A directive renders as a shell script with two lines per accession, one
//! retrieval call into a staging directory and one `mv` into the genome
//! directory keyed by accession. [`DirectiveRunner`] executes a directive
//! either by running that script or by retrieving the same URLs in-process.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::Accession;
use crate::error::CuratorError;
use crate::process::{require_tool, run_blocking};
use crate::retrieve::Retriever;

pub const DEFAULT_URL_TEMPLATE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi?db=nuccore&rettype=gbwithparts&retmode=text&id={accession}";
pub const ACCESSION_PLACEHOLDER: &str = "{accession}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveEntry {
    pub accession: Accession,
    pub url: String,
    pub staged: Utf8PathBuf,
    pub target: Utf8PathBuf,
}

/// Query template and directories shared by every directive of a run.
#[derive(Debug, Clone)]
pub struct DirectiveTemplate {
    pub url_template: String,
    pub staging_dir: Utf8PathBuf,
    pub target_dir: Utf8PathBuf,
}

impl DirectiveTemplate {
    pub fn url_for(&self, accession: &Accession) -> String {
        self.url_template
            .replace(ACCESSION_PLACEHOLDER, accession.as_str())
    }

    pub fn entry(&self, accession: &Accession) -> DirectiveEntry {
        let url = self.url_for(accession);
        let staged = self.staging_dir.join(url_file_name(&url));
        DirectiveEntry {
            accession: accession.clone(),
            staged,
            target: self.target_dir.join(format!("{accession}.txt")),
            url,
        }
    }

    pub fn directive<'a, I>(&self, accessions: I) -> FetchDirective
    where
        I: IntoIterator<Item = &'a Accession>,
    {
        let unique: BTreeSet<&Accession> = accessions.into_iter().collect();
        FetchDirective {
            entries: unique.into_iter().map(|acc| self.entry(acc)).collect(),
        }
    }
}

/// Last path segment of a URL, query string included, as `wget -P` names it.
pub fn url_file_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchDirective {
    entries: Vec<DirectiveEntry>,
}

impl FetchDirective {
    pub fn entries(&self) -> &[DirectiveEntry] {
        &self.entries
    }

    pub fn accessions(&self) -> BTreeSet<Accession> {
        self.entries
            .iter()
            .map(|entry| entry.accession.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self, program: &str) -> String {
        let mut script = String::from("#!/usr/bin/env bash\n");
        for entry in &self.entries {
            let staging = entry.staged.parent().unwrap_or(Utf8Path::new("."));
            let _ = writeln!(script, "{program} -q \"{}\" -P \"{staging}\"", entry.url);
            let _ = writeln!(script, "mv \"{}\" \"{}\"", entry.staged, entry.target);
        }
        script
    }
}

pub trait DirectiveRunner {
    /// Executes `directive`, whose rendered form has already been written to
    /// `script`. Failures of individual retrievals are not errors; the caller
    /// detects them by listing the target directory.
    fn run(&self, directive: &FetchDirective, script: &Utf8Path) -> Result<(), CuratorError>;
}

/// Runs the written directive with `bash`.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    shell: PathBuf,
}

impl ScriptRunner {
    pub fn new() -> Result<Self, CuratorError> {
        Ok(Self {
            shell: require_tool("bash")?,
        })
    }
}

impl DirectiveRunner for ScriptRunner {
    fn run(&self, directive: &FetchDirective, script: &Utf8Path) -> Result<(), CuratorError> {
        ensure_dirs(directive)?;
        tracing::info!(script = %script, entries = directive.len(), "running fetch directive");
        let status = run_blocking(&self.shell, &[script.to_string()])?;
        if !status.success() {
            tracing::warn!(
                script = %script,
                status = %status,
                "fetch directive exited with failure"
            );
        }
        Ok(())
    }
}

/// Retrieves each directive entry in-process and moves it into place.
pub struct HttpRunner<T: Retriever> {
    retriever: T,
}

impl<T: Retriever> HttpRunner<T> {
    pub fn new(retriever: T) -> Self {
        Self { retriever }
    }
}

impl<T: Retriever> DirectiveRunner for HttpRunner<T> {
    fn run(&self, directive: &FetchDirective, _script: &Utf8Path) -> Result<(), CuratorError> {
        ensure_dirs(directive)?;
        for entry in directive.entries() {
            let staged = entry.staging_path();
            if let Err(err) = self.retriever.retrieve(&entry.url, staged.as_std_path()) {
                tracing::warn!(accession = %entry.accession, error = %err, "retrieval failed");
                continue;
            }
            fs::rename(staged.as_std_path(), entry.target.as_std_path())
                .map_err(|err| CuratorError::Filesystem(err.to_string()))?;
            tracing::debug!(accession = %entry.accession, "retrieved");
        }
        Ok(())
    }
}

impl DirectiveEntry {
    /// Staging file named by accession; the in-process runner does not need
    /// the URL-derived name the script relies on.
    fn staging_path(&self) -> Utf8PathBuf {
        let dir = self.staged.parent().unwrap_or(Utf8Path::new("."));
        dir.join(format!("{}.part", self.accession))
    }
}

fn ensure_dirs(directive: &FetchDirective) -> Result<(), CuratorError> {
    let mut dirs = BTreeSet::new();
    for entry in directive.entries() {
        dirs.extend(entry.staged.parent());
        dirs.extend(entry.target.parent());
    }
    for dir in dirs {
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| CuratorError::Filesystem(format!("create {dir}: {err}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> DirectiveTemplate {
        DirectiveTemplate {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            staging_dir: Utf8PathBuf::from("/data/staging"),
            target_dir: Utf8PathBuf::from("/data/genomes"),
        }
    }

    #[test]
    fn renders_two_lines_per_accession() {
        let accs: Vec<Accession> = vec!["NC_2".parse().unwrap(), "NC_1".parse().unwrap()];
        let directive = template().directive(&accs);
        let script = directive.render("wget");
        let lines: Vec<&str> = script.lines().skip(1).collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "wget -q \"https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi?db=nuccore&rettype=gbwithparts&retmode=text&id=NC_1\" -P \"/data/staging\""
        );
        assert_eq!(
            lines[1],
            "mv \"/data/staging/efetch.fcgi?db=nuccore&rettype=gbwithparts&retmode=text&id=NC_1\" \"/data/genomes/NC_1.txt\""
        );
    }

    #[test]
    fn duplicate_accessions_collapse() {
        let acc: Accession = "NC_1".parse().unwrap();
        let directive = template().directive([&acc, &acc]);
        assert_eq!(directive.len(), 1);
    }
}
