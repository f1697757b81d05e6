//! fal storage uploads and plain downloads.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::FalClient;
use crate::error::{ProviderError, ProviderResult};
use crate::http::{download_to_file, send_checked};
use crate::services::MediaStore;

#[derive(Debug, Deserialize)]
struct UploadTarget {
    upload_url: String,
    file_url: String,
}

#[async_trait]
impl MediaStore for FalClient {
    async fn upload(&self, path: &Path, content_type: &str) -> ProviderResult<String> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ProviderError::config(format!("not a file: {}", path.display())))?;
        let bytes = tokio::fs::read(path).await?;

        let initiate_url = format!(
            "{}/storage/upload/initiate",
            self.config().storage_url.trim_end_matches('/')
        );
        let target: UploadTarget = send_checked(
            "fal",
            "upload_initiate",
            self.authorized(self.http().post(&initiate_url)).json(&json!({
                "file_name": file_name,
                "content_type": content_type,
            })),
        )
        .await?
        .json()
        .await?;

        send_checked(
            "fal",
            "upload",
            self.http()
                .put(&target.upload_url)
                .header("Content-Type", content_type)
                .body(bytes),
        )
        .await?;

        debug!(path = %path.display(), url = %target.file_url, "Uploaded file");
        Ok(target.file_url)
    }

    async fn download(&self, url: &str, path: &Path) -> ProviderResult<()> {
        download_to_file(self.http(), url, path).await.map(|_| ())
    }
}
