use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chainlab_core::BlockHeader;
use tracing::{debug, info, warn};

use crate::{headers_from_records, HeaderRecord, HeaderSourceError};

/// A `blocks.json` file: a JSON list of [`HeaderRecord`]s.
#[derive(Clone, Debug)]
pub struct HeaderFile {
    path: PathBuf,
}

impl HeaderFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_records(&self) -> Result<Vec<HeaderRecord>, HeaderSourceError> {
        let text = fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                HeaderSourceError::NotFound(self.path.clone())
            } else {
                HeaderSourceError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;
        let records: Vec<HeaderRecord> =
            serde_json::from_str(&text).map_err(|source| HeaderSourceError::Json {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path.display(), count = records.len(), "header records read");
        Ok(records)
    }

    /// Read and validate every record. An empty list is an error.
    pub fn load_headers(&self) -> Result<Vec<BlockHeader>, HeaderSourceError> {
        let records = self.load_records()?;
        if records.is_empty() {
            return Err(HeaderSourceError::Empty(self.path.clone()));
        }
        let headers = headers_from_records(&records)?;
        info!(path = %self.path.display(), count = headers.len(), "headers loaded");
        Ok(headers)
    }

    /// Complete records keyed by height; the first record for a height wins.
    /// A missing or unreadable file is an empty cache.
    pub fn cached_by_height(&self) -> HashMap<u64, HeaderRecord> {
        let records = match self.load_records() {
            Ok(records) => records,
            Err(HeaderSourceError::NotFound(_)) => return HashMap::new(),
            Err(err) => {
                warn!(error = %err, "ignoring unreadable header cache");
                return HashMap::new();
            }
        };
        let mut cache = HashMap::new();
        for record in records.into_iter().filter(HeaderRecord::is_complete) {
            let Some(height) = record.height.and_then(|h| u64::try_from(h).ok()) else {
                continue;
            };
            cache.entry(height).or_insert(record);
        }
        cache
    }

    pub fn save_records(&self, records: &[HeaderRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, json).with_context(|| format!("writing {}", self.path.display()))?;
        info!(path = %self.path.display(), count = records.len(), "header file written");
        Ok(())
    }
}
