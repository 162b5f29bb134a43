//! Media mirroring seam.
//!
//! The archive only drives mirroring through this trait; the actual
//! object-storage backends live with the media collaborator. The
//! built-in implementations cover local development (fetch to disk)
//! and running without any mirror at all.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use feedvault_wire::Entry;
use serde::Deserialize;
use snafu::{ResultExt as _, Snafu};
use tracing::debug;

use crate::LOG_TARGET;

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Directory mirrored blobs are written into.
    pub dir: PathBuf,
    /// Public prefix the mirrored names are served under.
    pub base_url: String,
}

#[derive(Debug, Snafu)]
pub enum MediaError {
    Fetch { source: reqwest::Error },
    Write { source: std::io::Error },
}

pub type MediaResult<T> = std::result::Result<T, MediaError>;

#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Mirror `url` and return the url it is now served from.
    async fn from_url(&self, url: &str) -> MediaResult<String>;
}

/// Mirror into a local directory.
pub struct LocalStorage {
    config: MediaConfig,
    client: reqwest::Client,
}

impl LocalStorage {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Stable object name for a source url.
    fn object_name(url: &str) -> String {
        data_encoding::BASE32_NOPAD
            .encode(url.as_bytes())
            .to_ascii_lowercase()
    }
}

#[async_trait]
impl MediaStorage for LocalStorage {
    async fn from_url(&self, url: &str) -> MediaResult<String> {
        let name = Self::object_name(url);
        let path = self.config.dir.join(&name);

        if !path.exists() {
            let bytes = self
                .client
                .get(url)
                .send()
                .await
                .context(FetchSnafu)?
                .bytes()
                .await
                .context(FetchSnafu)?;
            tokio::fs::create_dir_all(&self.config.dir)
                .await
                .context(WriteSnafu)?;
            tokio::fs::write(&path, &bytes).await.context(WriteSnafu)?;
        }

        Ok(format!("{}/{}", self.config.base_url.trim_end_matches('/'), name))
    }
}

/// No mirroring configured; every url stays as-is.
pub struct NullStorage;

#[async_trait]
impl MediaStorage for NullStorage {
    async fn from_url(&self, url: &str) -> MediaResult<String> {
        Ok(url.to_owned())
    }
}

/// Mirror everything an entry references. Fired per entry from the
/// archive stream and never awaited on the ingest path; individual
/// failures are skipped, upstream media rots all the time.
pub async fn mirror_entry(storage: Arc<dyn MediaStorage>, entry: Entry) {
    for thumb in &entry.thumbnails {
        for url in [&thumb.url, &thumb.link] {
            if url.is_empty() {
                continue;
            }
            if let Err(err) = storage.from_url(url).await {
                debug!(target: LOG_TARGET, err = %err, url = %url, "Mirror failed");
            }
        }
    }
    for file in &entry.files {
        if file.url.is_empty() {
            continue;
        }
        if let Err(err) = storage.from_url(&file.url).await {
            debug!(target: LOG_TARGET, err = %err, url = %file.url, "Mirror failed");
        }
    }
}
