use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use tempfile::Builder;

use crate::domain::{Accession, OrganismKind};
use crate::error::CuratorError;

/// On-disk layout under one data root:
///
/// ```text
/// genbank/<kind report>.txt
/// genbank/fetch_genomes.sh, genbank/fetch_genomes_retry.sh
/// genbank/staging/          raw retrieval output
/// genbank/genomes/<AC>.txt  flat files, one per accession
/// genbank/seqbins/<AC>/     sequence bins while a genome is processed
/// export/                   persisted rows
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, CuratorError> {
        let root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("genbank-curator"))
                    .ok()
            })
            .ok_or_else(|| {
                CuratorError::Filesystem("unable to resolve data directory".to_string())
            })?;
        Ok(Self { root })
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn genbank_dir(&self) -> Utf8PathBuf {
        self.root.join("genbank")
    }

    pub fn report_path(&self, kind: OrganismKind) -> Utf8PathBuf {
        self.genbank_dir().join(kind.report_file_name())
    }

    pub fn genomes_dir(&self) -> Utf8PathBuf {
        self.genbank_dir().join("genomes")
    }

    pub fn staging_dir(&self) -> Utf8PathBuf {
        self.genbank_dir().join("staging")
    }

    pub fn seqbins_dir(&self, accession: &Accession) -> Utf8PathBuf {
        self.genbank_dir().join("seqbins").join(accession.as_str())
    }

    pub fn directive_path(&self) -> Utf8PathBuf {
        self.genbank_dir().join("fetch_genomes.sh")
    }

    pub fn retry_directive_path(&self) -> Utf8PathBuf {
        self.genbank_dir().join("fetch_genomes_retry.sh")
    }

    pub fn export_dir(&self) -> Utf8PathBuf {
        self.root.join("export")
    }

    pub fn ensure_layout(&self) -> Result<(), CuratorError> {
        for dir in [self.genomes_dir(), self.staging_dir(), self.export_dir()] {
            fs::create_dir_all(dir.as_std_path())
                .map_err(|err| CuratorError::Filesystem(format!("create {dir}: {err}")))?;
        }
        Ok(())
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), CuratorError> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or(Utf8Path::new("."));
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        let mut tmp = Builder::new()
            .prefix(".gbcur-")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        tmp.write_all(content)
            .map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        tmp.persist(path.as_std_path())
            .map_err(|err| CuratorError::Filesystem(err.to_string()))?;
        Ok(())
    }

    /// Regular, non-hidden files of `dir`, sorted by name. A missing directory
    /// lists as empty.
    pub fn list_files(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, CuratorError> {
        if !dir.as_std_path().exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(dir.as_std_path())
            .map_err(|err| CuratorError::Filesystem(format!("read {dir}: {err}")))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| CuratorError::Filesystem(err.to_string()))?;
            let path = Utf8PathBuf::from_path_buf(entry.path())
                .map_err(|_| CuratorError::Filesystem("invalid UTF-8 path".to_string()))?;
            let hidden = path
                .file_name()
                .map(|name| name.starts_with('.'))
                .unwrap_or(true);
            if hidden || !path.as_std_path().is_file() {
                continue;
            }
            files.push(path);
        }
        files.sort();
        Ok(files)
    }
}

/// File name up to its first `.`; `NC_000913.txt.gz` has stem `NC_000913`.
pub fn file_stem(path: &Utf8Path) -> Option<&str> {
    let name = path.file_name()?;
    let stem = name.split('.').next().unwrap_or(name);
    (!stem.is_empty()).then_some(stem)
}
