//! Media upload (v1.1).

use crate::client::XClient;
use crate::error::{XError, XResult};
use crate::transport::Reply;
use crate::types::MediaUpload;
use std::path::Path;

pub struct MediaApi<'a> {
    client: &'a XClient,
}

impl<'a> MediaApi<'a> {
    pub(crate) fn new(client: &'a XClient) -> Self {
        Self { client }
    }

    /// Upload a local file and return its media id.
    pub async fn upload(&self, path: &Path) -> XResult<Reply<MediaUpload>> {
        let bytes = tokio::fs::read(path).await.map_err(|source| XError::Media {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("media")
            .to_string();

        tracing::info!(file = %path.display(), size = bytes.len(), "Uploading media");
        self.client.http.upload(&file_name, bytes).await
    }
}
