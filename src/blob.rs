//! Local-disk blob sink
//!
//! Proofs are written under `{root}/{userId}/{shipmentId}/{uuid}.{ext}` and
//! served by the HTTP server under `/files`, so the URL handed out is
//! `{public_base}/files/{path}`.

use crate::runtime::{FileSink, StoreError};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

pub struct LocalFileSink {
    root: PathBuf,
    public_base: String,
}

impl LocalFileSink {
    pub fn new(root: impl Into<PathBuf>, public_base: &str) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }
}

/// Only plain relative segments may be used as a blob path
fn is_safe(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

#[async_trait]
impl FileSink for LocalFileSink {
    async fn store_file(
        &self,
        path: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<String, StoreError> {
        if !is_safe(path) {
            return Err(StoreError::Unavailable(format!("refusing blob path {path}")));
        }
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Unavailable(format!("create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|e| StoreError::Unavailable(format!("write {}: {e}", target.display())))?;

        tracing::debug!(path, mime, size = bytes.len(), "Blob stored");
        Ok(format!("{}/files/{path}", self.public_base))
    }
}
