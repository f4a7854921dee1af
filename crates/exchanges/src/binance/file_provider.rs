//! Exchange metadata read from a saved `exchangeInfo` response

use crate::errors::{ExchangeError, Result};
use crate::traits::MetadataProvider;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Serves the document stored at `path`, as it was when loaded
#[derive(Debug, Clone)]
pub struct JsonFileMetadataProvider {
    path: PathBuf,
    document: Value,
}

impl JsonFileMetadataProvider {
    /// Read and parse the document up front.
    ///
    /// This is a blocking read, done before any async work starts so that
    /// fetches never touch the filesystem on the runtime thread.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| ExchangeError::ProviderError(format!("{}: {}", path.display(), e)))?;
        let document: Value = serde_json::from_str(&raw)?;
        if !document.is_object() {
            return Err(ExchangeError::InvalidResponse(format!(
                "{}: expected a JSON object",
                path.display()
            )));
        }
        debug!("Loaded {} bytes of exchange metadata from {}", raw.len(), path.display());
        Ok(Self { path, document })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait(?Send)]
impl MetadataProvider for JsonFileMetadataProvider {
    async fn fetch_exchange_metadata(&self) -> Result<Value> {
        Ok(self.document.clone())
    }
}
