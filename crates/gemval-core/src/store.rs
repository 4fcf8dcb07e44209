//! On-disk stores: per-repository result files and the repository index.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use gemval_provider::{split_repository, ProviderKind};

use crate::error::{GemvalError, Result};
use crate::record::PersistedRecord;

/// Write `value` as pretty JSON via a temp file renamed over `path`.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| GemvalError::io(&dir, e))?;

    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| GemvalError::io(&dir, e))?;
    tmp.write_all(&body).map_err(|e| GemvalError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| GemvalError::io(path, e.error))?;
    Ok(())
}

/// Read a file, `None` when it does not exist.
fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(GemvalError::io(path, e)),
    }
}

/// Result files, one per repository: `<dir>/<short-name>.json`.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<short-name>.json`; fails on a path without an owner.
    pub fn path_for(&self, owner_repo: &str) -> Result<PathBuf> {
        let (_, short_name) = split_repository(owner_repo)?;
        Ok(self.dir.join(format!("{short_name}.json")))
    }

    /// Load the record for `owner_repo`; an absent file is an empty record.
    pub fn load(&self, owner_repo: &str) -> Result<PersistedRecord> {
        let path = self.path_for(owner_repo)?;
        let Some(bytes) = read_optional(&path)? else {
            debug!(path = %path.display(), "no existing record");
            return Ok(PersistedRecord::default());
        };

        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| GemvalError::MalformedRecord {
                path: path.clone(),
                message: e.to_string(),
            })?;
        let (_, short_name) = split_repository(owner_repo)?;
        PersistedRecord::from_value(value, short_name).map_err(|e| GemvalError::MalformedRecord {
            path,
            message: e.to_string(),
        })
    }

    /// Rewrite the whole record.
    pub fn save(&self, owner_repo: &str, record: &PersistedRecord) -> Result<PathBuf> {
        let path = self.path_for(owner_repo)?;
        write_json_atomic(&path, &record.to_value()?)?;
        debug!(path = %path.display(), releases = record.releases.len(), "record written");
        Ok(path)
    }
}

/// `provider -> {owner/repo}` listing of every discovered repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RepositoryIndex {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl RepositoryIndex {
    /// Load from `path`; a missing file is an empty index.
    pub fn load(path: &Path) -> Result<Self> {
        match read_optional(path)? {
            Some(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| GemvalError::MalformedRecord {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }

    /// Union `repositories` into the provider's set. Returns how many were new.
    pub fn merge<I, S>(&mut self, provider: ProviderKind, repositories: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = self
            .entries
            .entry(provider.as_str().to_string())
            .or_default();
        repositories
            .into_iter()
            .map(Into::into)
            .filter(|repo: &String| set.insert(repo.clone()))
            .count()
    }

    /// Every `(provider, owner/repo)` pair, providers sorted then repositories.
    ///
    /// Provider keys that do not name a known provider are skipped.
    pub fn repositories(&self) -> Vec<(ProviderKind, String)> {
        self.entries
            .iter()
            .filter_map(|(provider, repos)| {
                provider.parse::<ProviderKind>().ok().map(|kind| (kind, repos))
            })
            .flat_map(|(kind, repos)| repos.iter().map(move |repo| (kind, repo.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
