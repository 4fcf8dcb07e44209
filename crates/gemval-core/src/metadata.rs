//! Repository metadata refresh and the avatar cache.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use url::Url;

use gemval_provider::ProviderClient;

use crate::error::{GemvalError, Result};
use crate::record::RepositoryMetadata;

const DEFAULT_AVATAR_EXTENSION: &str = ".png";

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid regex"))
}

/// Avatar images under one directory, named after the sanitized owner.
#[derive(Debug, Clone)]
pub struct AvatarCache {
    dir: PathBuf,
}

impl AvatarCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<sanitized owner><extension of the URL path>`, `.png` when the URL has none.
    pub fn filename_for(owner: &str, avatar_url: &str) -> String {
        let mut stem = unsafe_chars().replace_all(owner, "_").into_owned();
        if stem.is_empty() {
            stem.push_str("avatar");
        }
        format!("{stem}{}", url_extension(avatar_url))
    }

    /// Download `avatar_url` unless the file is already cached. Returns the filename.
    pub async fn ensure(
        &self,
        client: &dyn ProviderClient,
        owner: &str,
        avatar_url: &str,
    ) -> Result<String> {
        let filename = Self::filename_for(owner, avatar_url);
        let path = self.dir.join(&filename);
        if path.exists() {
            debug!(path = %path.display(), "avatar already cached");
            return Ok(filename);
        }

        let bytes = client.download(avatar_url).await?;
        fs::create_dir_all(&self.dir).map_err(|e| GemvalError::io(&self.dir, e))?;
        let mut tmp =
            NamedTempFile::new_in(&self.dir).map_err(|e| GemvalError::io(&self.dir, e))?;
        tmp.write_all(&bytes).map_err(|e| GemvalError::io(&path, e))?;
        tmp.persist(&path).map_err(|e| GemvalError::io(&path, e.error))?;
        info!(path = %path.display(), "avatar downloaded");
        Ok(filename)
    }
}

fn url_extension(avatar_url: &str) -> String {
    Url::parse(avatar_url)
        .ok()
        .and_then(|url| {
            let last = url.path_segments()?.next_back()?.to_string();
            let (_, ext) = last.rsplit_once('.')?;
            (!ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
                .then(|| format!(".{}", ext.to_ascii_lowercase()))
        })
        .unwrap_or_else(|| DEFAULT_AVATAR_EXTENSION.to_string())
}

/// Fresh metadata for `owner_repo`.
///
/// Counts and dates are always refetched. The avatar is downloaded only when
/// `cached_avatar` is `None`; otherwise the cached filename is carried forward.
pub async fn refresh_metadata(
    client: &dyn ProviderClient,
    owner_repo: &str,
    cached_avatar: Option<&str>,
    avatars: &AvatarCache,
) -> Result<RepositoryMetadata> {
    let info = client.fetch_repository_metadata(owner_repo).await?;

    let avatar = match (cached_avatar, info.owner.as_deref(), info.avatar_url.as_deref()) {
        (Some(cached), _, _) => Some(cached.to_string()),
        (None, owner, Some(url)) => {
            Some(avatars.ensure(client, owner.unwrap_or(""), url).await?)
        }
        (None, _, _) => None,
    };

    Ok(RepositoryMetadata {
        owner: info.owner,
        avatar,
        commits: Some(info.commit_count),
        contributors: Some(info.contributor_count),
        latest_commit_date: info.latest_commit_date,
    })
}
