//! Best-effort mirroring of the evaluation stores to remote object storage.
//!
//! Local persistence is the durability guarantee; an upload failure is
//! logged and never fails the batch.

use crate::error::{BenchError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Destination for mirrored store files.
#[async_trait]
pub trait ObjectMirror: Send + Sync {
    /// Upload the file at `local` as `object_name`.
    async fn upload(&self, local: &Path, object_name: &str) -> Result<()>;
}

/// Mirrors files by HTTP PUT to `{base_url}/{object_name}`.
pub struct HttpMirror {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpMirror {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            token,
        }
    }
}

#[async_trait]
impl ObjectMirror for HttpMirror {
    async fn upload(&self, local: &Path, object_name: &str) -> Result<()> {
        let bytes = std::fs::read(local).map_err(|e| BenchError::io(local, e))?;

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), object_name);
        let mut request = self.client.put(&url).body(bytes);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| BenchError::Network {
            provider: "mirror".to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BenchError::Api {
                provider: "mirror".to_string(),
                status: status.as_u16(),
                message: format!("upload of '{}' rejected", object_name),
            });
        }

        Ok(())
    }
}

/// Upload each file under its file name, logging failures instead of
/// propagating them.
pub async fn mirror_best_effort(mirror: &dyn ObjectMirror, paths: &[&Path]) {
    for path in paths {
        if !path.exists() {
            continue;
        }
        let object_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("evaluations");

        match mirror.upload(path, object_name).await {
            Ok(()) => tracing::info!(object = object_name, "mirrored evaluation store"),
            Err(err) => tracing::warn!(
                object = object_name,
                error = %err,
                "failed to mirror evaluation store; keeping local copy"
            ),
        }
    }
}
